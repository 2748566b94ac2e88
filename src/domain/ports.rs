//! Collaborator ports. Store implementations must honor the unique
//! constraints documented on each method — those constraints, surfaced as
//! [`PaymentError::Conflict`](crate::error::PaymentError::Conflict), are the
//! concurrency-safety mechanism of the workflow. Multi-row writes
//! (`replace`, `insert_snapshot`) are atomic: they either apply fully or
//! leave prior state untouched.

use super::approval::ApprovalStep;
use super::contract::Contract;
use super::roster::RosterEntry;
use super::ticket::Ticket;
use super::vendor::Vendor;
use super::{ContractId, TicketId, UserId, VendorId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait VendorStore: Send + Sync {
    async fn allocate_id(&self) -> Result<VendorId>;
    /// Fails with `Conflict` if the vendor code is taken.
    async fn insert(&self, vendor: Vendor) -> Result<()>;
    async fn get(&self, id: VendorId) -> Result<Option<Vendor>>;
    async fn by_code(&self, code: &str) -> Result<Option<Vendor>>;
}

#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn allocate_id(&self) -> Result<ContractId>;
    /// Fails with `Conflict` if the contract number is taken.
    async fn insert(&self, contract: Contract) -> Result<()>;
    async fn update(&self, contract: Contract) -> Result<()>;
    /// Soft-deleted contracts are not returned.
    async fn get(&self, id: ContractId) -> Result<Option<Contract>>;
    async fn by_number(&self, number: &str) -> Result<Option<Contract>>;
    /// All live contracts, ordered by number.
    async fn all(&self) -> Result<Vec<Contract>>;
    async fn soft_delete(&self, id: ContractId, now: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Roster of a contract, ordered by sequence number.
    async fn entries(&self, contract_id: ContractId) -> Result<Vec<RosterEntry>>;
    /// Atomically replaces the contract's roster. Fails with `Conflict` if
    /// the replacement violates (contract, user) or (contract, sequence_no)
    /// uniqueness, leaving the prior roster intact.
    async fn replace(&self, contract_id: ContractId, entries: Vec<RosterEntry>) -> Result<()>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn allocate_id(&self) -> Result<TicketId>;
    /// Fails with `Conflict` if the ticket number is taken.
    async fn insert(&self, ticket: Ticket) -> Result<()>;
    async fn update(&self, ticket: Ticket) -> Result<()>;
    /// Soft-deleted tickets are not returned.
    async fn get(&self, id: TicketId) -> Result<Option<Ticket>>;
    async fn by_number(&self, number: &str) -> Result<Option<Ticket>>;
    /// Live tickets of one contract.
    async fn for_contract(&self, contract_id: ContractId) -> Result<Vec<Ticket>>;
    /// All live tickets, ordered by number.
    async fn all(&self) -> Result<Vec<Ticket>>;
    /// Highest existing ticket number starting with `prefix`, used for
    /// number generation.
    async fn last_number_with_prefix(&self, prefix: &str) -> Result<Option<String>>;
    async fn soft_delete(&self, id: TicketId, now: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait StepStore: Send + Sync {
    /// Atomically inserts a ticket's full step snapshot. Fails with
    /// `Conflict` if any (ticket, approver) or (ticket, sequence_no) pair
    /// already exists; no step is inserted in that case.
    async fn insert_snapshot(&self, steps: Vec<ApprovalStep>) -> Result<()>;
    /// Steps of a ticket, ordered by sequence number.
    async fn for_ticket(&self, ticket_id: TicketId) -> Result<Vec<ApprovalStep>>;
    /// Updates a step, keyed by (ticket, approver).
    async fn update(&self, step: ApprovalStep) -> Result<()>;
}

/// Privilege predicates supplied by the surrounding authorization
/// subsystem. Stakeholdership is derived by the engine from contract and
/// roster data, not asked of this port.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_admin(&self, user: UserId) -> Result<bool>;
    /// Whether the user's privilege tier qualifies them as a contract
    /// approver.
    async fn is_eligible_approver(&self, user: UserId) -> Result<bool>;
}

/// The document collaborator: an opaque blob store from the workflow's
/// point of view. Only counts matter here; they drive the ticket's
/// informational document status.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn document_count(&self, ticket_id: TicketId) -> Result<usize>;
    /// Records an attachment and returns the new count.
    async fn attach(&self, ticket_id: TicketId, doc_type: &str) -> Result<usize>;
    /// Removes an attachment and returns the new count.
    async fn detach(&self, ticket_id: TicketId, doc_type: &str) -> Result<usize>;
}

pub type VendorStoreBox = Box<dyn VendorStore>;
pub type ContractStoreBox = Box<dyn ContractStore>;
pub type RosterStoreBox = Box<dyn RosterStore>;
pub type TicketStoreBox = Box<dyn TicketStore>;
pub type StepStoreBox = Box<dyn StepStore>;
pub type AuthorizerBox = Box<dyn Authorizer>;
pub type DocumentIndexBox = Box<dyn DocumentIndex>;
