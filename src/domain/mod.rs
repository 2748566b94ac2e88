//! Pure workflow entities and their invariants. Nothing in here touches a
//! store; persistence and authorization live behind the ports in [`ports`].

pub mod approval;
pub mod contract;
pub mod money;
pub mod ports;
pub mod roster;
pub mod ticket;
pub mod vendor;

use serde::{Deserialize, Serialize};

/// Identifier of an acting or referenced user. Users themselves are managed
/// by the surrounding application; the workflow core only needs their ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VendorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(pub u64);
