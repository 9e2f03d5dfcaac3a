use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::error::{HubError, Result};
use crate::ip_alloc::next_free_host;
use crate::store::{OrgId, Store, StoreError, UserId};

/// Bounded retry count for the allocate-if-absent race (§4.8 step 2): two
/// actors racing for the same org each retry on `Conflict` before giving up.
const MAX_ALLOCATE_RETRIES: u32 = 5;

/// Allocate-if-absent semantics for `(user, org) -> virtual IP` (C8).
///
/// Returns the existing mapping if present (P2, allocation stability);
/// otherwise allocates the numerically smallest free host in the org's
/// subnet and persists it, retrying on a concurrent `Conflict` up to
/// [`MAX_ALLOCATE_RETRIES`] times.
pub async fn ensure_ip(store: &dyn Store, user_id: UserId, org_id: OrgId) -> Result<Ipv4Addr> {
    for _ in 0..=MAX_ALLOCATE_RETRIES {
        if let Some(ip) = store
            .get_mapping(user_id, org_id)
            .await
            .map_err(store_error)?
        {
            return Ok(ip);
        }

        let org = store
            .find_org_by_id(org_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| HubError::Persistence(format!("unknown org {org_id}")))?;

        let used: HashSet<Ipv4Addr> = store
            .list_used_ips(org_id)
            .await
            .map_err(store_error)?
            .into_iter()
            .collect();

        let candidate = next_free_host(&org.subnet, &used)
            .ok_or_else(|| HubError::Contract("no available IPs".to_string()))?;

        match store.insert_mapping(user_id, org_id, candidate).await {
            Ok(()) => return Ok(candidate),
            Err(StoreError::Conflict) => continue,
            Err(e) => return Err(store_error(e)),
        }
    }

    Err(HubError::Persistence(
        "virtual ip allocation did not converge after retries".to_string(),
    ))
}

fn store_error(e: StoreError) -> HubError {
    match e {
        StoreError::Conflict => HubError::Persistence("unexpected conflict".to_string()),
        StoreError::Unavailable(msg) => HubError::Persistence(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_store::MemoryStore;

    #[tokio::test]
    async fn allocates_then_is_stable() {
        let store = MemoryStore::new();
        store.seed_org(1, "org", "10.0.0.0/30").await;

        let first = ensure_ip(&store, 1, 1).await.unwrap();
        let second = ensure_ip(&store, 1, 1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "10.0.0.1".parse::<Ipv4Addr>().unwrap());
    }

    #[tokio::test]
    async fn distinct_users_get_distinct_ips() {
        let store = MemoryStore::new();
        store.seed_org(1, "org", "10.0.0.0/30").await;

        let a = ensure_ip(&store, 1, 1).await.unwrap();
        let b = ensure_ip(&store, 2, 1).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn subnet_exhaustion_fails() {
        // 192.168.0.0/30 has exactly two hosts.
        let store = MemoryStore::new();
        store.seed_org(1, "org", "192.168.0.0/30").await;

        ensure_ip(&store, 1, 1).await.unwrap();
        ensure_ip(&store, 2, 1).await.unwrap();
        let result = ensure_ip(&store, 3, 1).await;
        assert!(matches!(result, Err(HubError::Contract(_))));
    }
}
