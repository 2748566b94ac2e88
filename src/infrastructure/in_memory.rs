use crate::domain::approval::ApprovalStep;
use crate::domain::contract::Contract;
use crate::domain::ports::{ContractStore, RosterStore, StepStore, TicketStore, VendorStore};
use crate::domain::roster::RosterEntry;
use crate::domain::ticket::Ticket;
use crate::domain::vendor::Vendor;
use crate::domain::{ContractId, TicketId, VendorId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store implementing every workflow store port.
///
/// One `RwLock` guards the whole state, so each store method is atomic:
/// unique-constraint checks and the mutation they protect happen under a
/// single write guard, the in-process equivalent of a database transaction.
/// `Clone` shares the underlying state.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    vendors: HashMap<VendorId, Vendor>,
    contracts: HashMap<ContractId, Contract>,
    roster: HashMap<ContractId, Vec<RosterEntry>>,
    tickets: HashMap<TicketId, Ticket>,
    steps: HashMap<TicketId, Vec<ApprovalStep>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl VendorStore for InMemoryStore {
    async fn allocate_id(&self) -> Result<VendorId> {
        Ok(VendorId(self.state.write().await.next_id()))
    }

    async fn insert(&self, vendor: Vendor) -> Result<()> {
        let mut state = self.state.write().await;
        if state.vendors.values().any(|v| v.code == vendor.code) {
            return Err(PaymentError::Conflict(format!(
                "vendor code {} already exists",
                vendor.code
            )));
        }
        state.vendors.insert(vendor.id, vendor);
        Ok(())
    }

    async fn get(&self, id: VendorId) -> Result<Option<Vendor>> {
        let state = self.state.read().await;
        Ok(state.vendors.get(&id).filter(|v| !v.is_deleted()).cloned())
    }

    async fn by_code(&self, code: &str) -> Result<Option<Vendor>> {
        let state = self.state.read().await;
        Ok(state
            .vendors
            .values()
            .find(|v| v.code == code && !v.is_deleted())
            .cloned())
    }
}

#[async_trait]
impl ContractStore for InMemoryStore {
    async fn allocate_id(&self) -> Result<ContractId> {
        Ok(ContractId(self.state.write().await.next_id()))
    }

    async fn insert(&self, contract: Contract) -> Result<()> {
        let mut state = self.state.write().await;
        if state.contracts.values().any(|c| c.number == contract.number) {
            return Err(PaymentError::Conflict(format!(
                "contract number {} already exists",
                contract.number
            )));
        }
        state.contracts.insert(contract.id, contract);
        Ok(())
    }

    async fn update(&self, contract: Contract) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.contracts.contains_key(&contract.id) {
            return Err(PaymentError::NotFound(format!("contract {}", contract.id.0)));
        }
        state.contracts.insert(contract.id, contract);
        Ok(())
    }

    async fn get(&self, id: ContractId) -> Result<Option<Contract>> {
        let state = self.state.read().await;
        Ok(state
            .contracts
            .get(&id)
            .filter(|c| !c.is_deleted())
            .cloned())
    }

    async fn by_number(&self, number: &str) -> Result<Option<Contract>> {
        let state = self.state.read().await;
        Ok(state
            .contracts
            .values()
            .find(|c| c.number == number && !c.is_deleted())
            .cloned())
    }

    async fn all(&self) -> Result<Vec<Contract>> {
        let state = self.state.read().await;
        let mut contracts: Vec<Contract> = state
            .contracts
            .values()
            .filter(|c| !c.is_deleted())
            .cloned()
            .collect();
        contracts.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(contracts)
    }

    async fn soft_delete(&self, id: ContractId, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let contract = state
            .contracts
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("contract {}", id.0)))?;
        contract.deleted_at = Some(now);
        Ok(())
    }
}

#[async_trait]
impl RosterStore for InMemoryStore {
    async fn entries(&self, contract_id: ContractId) -> Result<Vec<RosterEntry>> {
        let state = self.state.read().await;
        let mut entries = state.roster.get(&contract_id).cloned().unwrap_or_default();
        entries.sort_by_key(|e| e.sequence_no);
        Ok(entries)
    }

    async fn replace(&self, contract_id: ContractId, entries: Vec<RosterEntry>) -> Result<()> {
        let mut users = std::collections::HashSet::new();
        let mut sequences = std::collections::HashSet::new();
        for entry in &entries {
            if entry.contract_id != contract_id {
                return Err(PaymentError::Conflict(format!(
                    "roster entry for foreign contract {}",
                    entry.contract_id.0
                )));
            }
            if !users.insert(entry.user_id) {
                return Err(PaymentError::Conflict(format!(
                    "duplicate roster entry for {}",
                    entry.user_id
                )));
            }
            if !sequences.insert(entry.sequence_no) {
                return Err(PaymentError::Conflict(format!(
                    "duplicate roster sequence {} on contract {}",
                    entry.sequence_no, contract_id.0
                )));
            }
        }

        let mut state = self.state.write().await;
        state.roster.insert(contract_id, entries);
        Ok(())
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    async fn allocate_id(&self) -> Result<TicketId> {
        Ok(TicketId(self.state.write().await.next_id()))
    }

    async fn insert(&self, ticket: Ticket) -> Result<()> {
        let mut state = self.state.write().await;
        // Soft-deleted rows keep their number reserved.
        if state.tickets.values().any(|t| t.number == ticket.number) {
            return Err(PaymentError::Conflict(format!(
                "ticket number {} already exists",
                ticket.number
            )));
        }
        state.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn update(&self, ticket: Ticket) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.tickets.contains_key(&ticket.id) {
            return Err(PaymentError::NotFound(format!("ticket {}", ticket.id.0)));
        }
        state.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn get(&self, id: TicketId) -> Result<Option<Ticket>> {
        let state = self.state.read().await;
        Ok(state.tickets.get(&id).filter(|t| !t.is_deleted()).cloned())
    }

    async fn by_number(&self, number: &str) -> Result<Option<Ticket>> {
        let state = self.state.read().await;
        Ok(state
            .tickets
            .values()
            .find(|t| t.number == number && !t.is_deleted())
            .cloned())
    }

    async fn for_contract(&self, contract_id: ContractId) -> Result<Vec<Ticket>> {
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.contract_id == contract_id && !t.is_deleted())
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(tickets)
    }

    async fn all(&self) -> Result<Vec<Ticket>> {
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(tickets)
    }

    async fn last_number_with_prefix(&self, prefix: &str) -> Result<Option<String>> {
        let state = self.state.read().await;
        // Includes soft-deleted rows so their numbers are never reissued.
        Ok(state
            .tickets
            .values()
            .filter(|t| t.number.starts_with(prefix))
            .map(|t| t.number.clone())
            .max())
    }

    async fn soft_delete(&self, id: TicketId, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let ticket = state
            .tickets
            .get_mut(&id)
            .ok_or_else(|| PaymentError::NotFound(format!("ticket {}", id.0)))?;
        ticket.deleted_at = Some(now);
        Ok(())
    }
}

#[async_trait]
impl StepStore for InMemoryStore {
    async fn insert_snapshot(&self, steps: Vec<ApprovalStep>) -> Result<()> {
        let Some(ticket_id) = steps.first().map(|s| s.ticket_id) else {
            return Ok(());
        };

        let mut approvers = std::collections::HashSet::new();
        let mut sequences = std::collections::HashSet::new();
        for step in &steps {
            if step.ticket_id != ticket_id {
                return Err(PaymentError::Conflict(
                    "step snapshot spans multiple tickets".to_string(),
                ));
            }
            if !approvers.insert(step.approver) || !sequences.insert(step.sequence_no) {
                return Err(PaymentError::Conflict(format!(
                    "duplicate approval step on ticket {}",
                    ticket_id.0
                )));
            }
        }

        let mut state = self.state.write().await;
        if state.steps.get(&ticket_id).is_some_and(|s| !s.is_empty()) {
            return Err(PaymentError::Conflict(format!(
                "approval steps already exist for ticket {}",
                ticket_id.0
            )));
        }
        state.steps.insert(ticket_id, steps);
        Ok(())
    }

    async fn for_ticket(&self, ticket_id: TicketId) -> Result<Vec<ApprovalStep>> {
        let state = self.state.read().await;
        let mut steps = state.steps.get(&ticket_id).cloned().unwrap_or_default();
        steps.sort_by_key(|s| s.sequence_no);
        Ok(steps)
    }

    async fn update(&self, step: ApprovalStep) -> Result<()> {
        let mut state = self.state.write().await;
        let steps = state
            .steps
            .get_mut(&step.ticket_id)
            .ok_or_else(|| PaymentError::NotFound(format!("steps for ticket {}", step.ticket_id.0)))?;
        let slot = steps
            .iter_mut()
            .find(|s| s.approver == step.approver)
            .ok_or_else(|| {
                PaymentError::NotFound(format!(
                    "approval step for {} on ticket {}",
                    step.approver, step.ticket_id.0
                ))
            })?;
        *slot = step;
        Ok(())
    }
}
