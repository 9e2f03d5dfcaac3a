//! In-memory `Store` used by tests and the non-production `--store memory`
//! mode. Mirrors the tables the original persistence layer declares
//! (`user`, `organization`, `organization_user`, `virtual_ip_mapping`)
//! without a database underneath.

use async_trait::async_trait;
use hub_core::store::{OrgId, Organization, Store, StoreError, StoreResult, User, UserId};
use ipnetwork::Ipv4Network;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    orgs: HashMap<OrgId, Organization>,
    memberships: HashSet<(UserId, OrgId)>,
    mappings: HashMap<(UserId, OrgId), Ipv4Addr>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, id: UserId, email: &str, is_active: bool) {
        self.inner.lock().users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                is_active,
            },
        );
    }

    pub async fn seed_org(&self, id: OrgId, name: &str, subnet: &str) {
        let subnet: Ipv4Network = subnet.parse().expect("valid CIDR in test fixture");
        self.inner.lock().orgs.insert(
            id,
            Organization {
                id,
                name: name.to_string(),
                subnet,
            },
        );
    }

    pub async fn seed_membership(&self, user_id: UserId, org_id: OrgId) {
        self.inner.lock().memberships.insert((user_id, org_id));
    }

    pub async fn seed_mapping(&self, user_id: UserId, org_id: OrgId, ip: Ipv4Addr) {
        self.inner.lock().mappings.insert((user_id, org_id), ip);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn find_org_by_id(&self, id: OrgId) -> StoreResult<Option<Organization>> {
        Ok(self.inner.lock().orgs.get(&id).cloned())
    }

    async fn is_member(&self, user_id: UserId, org_id: OrgId) -> StoreResult<bool> {
        Ok(self.inner.lock().memberships.contains(&(user_id, org_id)))
    }

    async fn list_user_orgs(&self, user_id: UserId) -> StoreResult<Vec<Organization>> {
        let inner = self.inner.lock();
        let mut orgs: Vec<Organization> = inner
            .memberships
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, org_id)| inner.orgs.get(org_id).cloned())
            .collect();
        orgs.sort_by_key(|o| o.id);
        Ok(orgs)
    }

    async fn get_mapping(&self, user_id: UserId, org_id: OrgId) -> StoreResult<Option<Ipv4Addr>> {
        Ok(self.inner.lock().mappings.get(&(user_id, org_id)).copied())
    }

    async fn list_used_ips(&self, org_id: OrgId) -> StoreResult<Vec<Ipv4Addr>> {
        Ok(self
            .inner
            .lock()
            .mappings
            .iter()
            .filter(|((_, oid), _)| *oid == org_id)
            .map(|(_, ip)| *ip)
            .collect())
    }

    async fn insert_mapping(&self, user_id: UserId, org_id: OrgId, ip: Ipv4Addr) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        if inner.mappings.contains_key(&(user_id, org_id)) {
            return Err(StoreError::Conflict);
        }
        if inner
            .mappings
            .iter()
            .any(|((_, oid), used_ip)| *oid == org_id && *used_ip == ip)
        {
            return Err(StoreError::Conflict);
        }

        inner.mappings.insert((user_id, org_id), ip);
        Ok(())
    }
}
