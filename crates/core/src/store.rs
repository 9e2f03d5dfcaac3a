use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use thiserror::Error;

pub type UserId = i64;
pub type OrgId = i64;

/// A registered user. The core only reads this; the external registration
/// flow (email/OTP, out of scope here) is what creates rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_active: bool,
}

/// An administrative grouping with a CIDR subnet virtual IPs are drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub subnet: Ipv4Network,
}

/// Errors the persistence port can surface to the core.
#[derive(Error, Debug)]
pub enum StoreError {
    /// `(user_id, org_id)` already has a mapping, or `(org_id, virtual_ip)`
    /// is already taken by another user. The caller should refresh the used
    /// set and retry allocation.
    #[error("conflicting virtual-ip mapping")]
    Conflict,

    /// The store itself is unavailable (connection lost, query failed).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow capability surface the core needs from persistence (§4.2).
///
/// Implementations must provide read-your-writes within a single session
/// actor and enforce uniqueness of `(user_id, org_id)` and of
/// `(org_id, virtual_ip)`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_org_by_id(&self, id: OrgId) -> StoreResult<Option<Organization>>;

    async fn is_member(&self, user_id: UserId, org_id: OrgId) -> StoreResult<bool>;

    /// Deterministic order: by org id ascending.
    async fn list_user_orgs(&self, user_id: UserId) -> StoreResult<Vec<Organization>>;

    async fn get_mapping(
        &self,
        user_id: UserId,
        org_id: OrgId,
    ) -> StoreResult<Option<Ipv4Addr>>;

    async fn list_used_ips(&self, org_id: OrgId) -> StoreResult<Vec<Ipv4Addr>>;

    async fn insert_mapping(
        &self,
        user_id: UserId,
        org_id: OrgId,
        ip: Ipv4Addr,
    ) -> StoreResult<()>;
}
