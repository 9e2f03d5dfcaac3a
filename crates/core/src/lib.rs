//! Transport-agnostic signaling logic for a peer-to-peer overlay hub:
//! presence registry, subnet-scoped broadcast, virtual-IP allocation, and
//! heartbeat supervision. Everything here is driven by ports (`Store`,
//! `TokenVerifier`, `Clock`) so the binary crate owns sockets, config, and
//! wire transport while this crate stays unit-testable in isolation.

pub mod actor;
pub mod auth;
pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod heartbeat;
pub mod ip_alloc;
pub mod lifecycle;
pub mod message;
pub mod registry;
pub mod session;
pub mod store;
pub mod virtual_ip;

pub use actor::{authenticate, handle_register, RegisterOutcome};
pub use auth::{pick_token, AuthenticatedUser, TokenVerifier};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{HubError, Result};
pub use heartbeat::{HeartbeatConfig, HeartbeatTasks};
pub use lifecycle::teardown;
pub use message::{Discriminator, FirstFrameOutcome, PongMessage, RegisterRequest, ServerMessage};
pub use registry::Registry;
pub use session::{OutboundFrame, Session};
pub use store::{OrgId, Organization, Store, StoreError, StoreResult, User, UserId};
pub use virtual_ip::ensure_ip;
