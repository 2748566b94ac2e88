use super::VendorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A supplier that contracts are signed with. Kept minimal: the workflow
/// only needs vendors as referents for contracts and tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    /// Unique short code, e.g. "VND-001".
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Vendor {
    pub fn new(id: VendorId, code: String, name: String) -> Self {
        Self {
            id,
            code,
            name,
            is_active: true,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
