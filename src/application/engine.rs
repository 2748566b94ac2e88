use crate::domain::approval::{self, ApprovalStep};
use crate::domain::contract::{Contract, CooperationType};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{
    AuthorizerBox, ContractStoreBox, DocumentIndexBox, RosterStoreBox, StepStoreBox,
    TicketStoreBox, VendorStoreBox,
};
use crate::domain::roster::{self, ApproverInput, RosterEntry};
use crate::domain::ticket::{self, ApprovalStatus, Ticket};
use crate::domain::vendor::Vendor;
use crate::domain::{ContractId, TicketId, UserId, VendorId};
use crate::error::{PaymentError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Input for contract creation. Term fields are only consulted for
/// progress contracts.
#[derive(Debug, Clone)]
pub struct ContractDraft {
    pub number: String,
    pub date: NaiveDate,
    pub vendor_id: VendorId,
    pub amount: Decimal,
    pub cooperation_type: CooperationType,
    pub term_count: Option<u32>,
    pub term_percentages: Option<Vec<Decimal>>,
    pub assigned_master: Option<UserId>,
}

/// Input for ticket creation. A missing number is generated.
#[derive(Debug, Clone)]
pub struct TicketDraft {
    pub number: Option<String>,
    pub date: NaiveDate,
    pub contract_id: ContractId,
    pub amount: Option<Amount>,
    pub notes: Option<String>,
    pub replaces_ticket_id: Option<TicketId>,
}

/// The entry point for the payment-approval workflow.
///
/// Owns the storage and collaborator ports and executes each operation
/// synchronously to completion: one request, one sequence of awaited store
/// calls. Concurrency safety rests on the stores' unique constraints and
/// atomic multi-row writes, not on in-process locking here.
pub struct WorkflowEngine {
    vendors: VendorStoreBox,
    contracts: ContractStoreBox,
    roster: RosterStoreBox,
    tickets: TicketStoreBox,
    steps: StepStoreBox,
    authorizer: AuthorizerBox,
    documents: DocumentIndexBox,
}

impl WorkflowEngine {
    pub fn new(
        vendors: VendorStoreBox,
        contracts: ContractStoreBox,
        roster: RosterStoreBox,
        tickets: TicketStoreBox,
        steps: StepStoreBox,
        authorizer: AuthorizerBox,
        documents: DocumentIndexBox,
    ) -> Self {
        Self {
            vendors,
            contracts,
            roster,
            tickets,
            steps,
            authorizer,
            documents,
        }
    }

    // ─── Vendors ────────────────────────────────────────────────

    pub async fn create_vendor(&self, code: String, name: String) -> Result<Vendor> {
        if code.trim().is_empty() || name.trim().is_empty() {
            return Err(PaymentError::Validation(
                "Vendor code and name are required".to_string(),
            ));
        }
        let id = self.vendors.allocate_id().await?;
        let vendor = Vendor::new(id, code, name);
        self.vendors.insert(vendor.clone()).await?;
        debug!(vendor = %vendor.code, "vendor created");
        Ok(vendor)
    }

    pub async fn find_vendor_by_code(&self, code: &str) -> Result<Option<Vendor>> {
        self.vendors.by_code(code).await
    }

    // ─── Contracts ──────────────────────────────────────────────

    /// Creates a contract and auto-seeds its roster with the contract
    /// masters (creator first, then the assigned master if any).
    pub async fn create_contract(&self, actor: UserId, draft: ContractDraft) -> Result<Contract> {
        if self.vendors.get(draft.vendor_id).await?.is_none() {
            return Err(PaymentError::Validation(
                "Selected vendor does not exist".to_string(),
            ));
        }
        if self.contracts.by_number(&draft.number).await?.is_some() {
            return Err(PaymentError::Validation(format!(
                "Contract number {} is already taken",
                draft.number
            )));
        }

        let id = self.contracts.allocate_id().await?;
        let contract = Contract::new(
            id,
            draft.number,
            draft.date,
            draft.vendor_id,
            draft.amount,
            draft.cooperation_type,
            draft.term_count,
            draft.term_percentages,
            actor,
            draft.assigned_master,
        )?;
        self.contracts.insert(contract.clone()).await?;
        self.resync_masters(&contract).await?;
        info!(contract = %contract.number, "contract created");
        Ok(contract)
    }

    /// Sets or replaces the second contract master, then re-seeds the
    /// master block of the roster.
    pub async fn assign_master(
        &self,
        actor: UserId,
        contract_id: ContractId,
        user: UserId,
    ) -> Result<Contract> {
        let mut contract = self.require_contract(contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;

        contract.assigned_master = Some(user);
        contract.updated_by = Some(actor);
        self.contracts.update(contract.clone()).await?;
        self.resync_masters(&contract).await?;
        info!(contract = %contract.number, master = %user, "assigned master updated");
        Ok(contract)
    }

    /// Changes the contract amount and re-derives the payment cache so the
    /// balance reflects the new ceiling immediately.
    pub async fn update_amount(
        &self,
        actor: UserId,
        contract_id: ContractId,
        amount: Decimal,
    ) -> Result<Contract> {
        if amount < Decimal::ZERO {
            return Err(PaymentError::Validation(
                "Contract amount must be at least 0".to_string(),
            ));
        }
        let mut contract = self.require_contract(contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;

        let changed = contract.amount != amount;
        contract.amount = amount;
        contract.updated_by = Some(actor);
        self.contracts.update(contract.clone()).await?;
        if changed {
            contract = self.sync_payment_cache(contract_id).await?;
        }
        Ok(contract)
    }

    pub async fn delete_contract(&self, actor: UserId, contract_id: ContractId) -> Result<()> {
        let contract = self.require_contract(contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;
        self.contracts.soft_delete(contract_id, Utc::now()).await
    }

    // ─── Approver roster ────────────────────────────────────────

    /// Re-seeds the system-managed master entries. Idempotent; called after
    /// any change to the contract's creator or assigned-master fields.
    async fn resync_masters(&self, contract: &Contract) -> Result<()> {
        let existing = self.roster.entries(contract.id).await?;
        let planned = roster::plan_master_resync(contract, &existing);
        if planned != existing {
            self.roster.replace(contract.id, planned).await?;
        }
        Ok(())
    }

    /// Replaces the non-master approvers of a contract. Only contract
    /// masters may do this, and every submitted user must pass the
    /// authorization port's eligibility predicate.
    pub async fn sync_approvers(
        &self,
        actor: UserId,
        contract_id: ContractId,
        submitted: Vec<ApproverInput>,
    ) -> Result<Vec<RosterEntry>> {
        let contract = self.require_contract(contract_id).await?;
        if !contract.is_master(actor) {
            return Err(PaymentError::Authorization(
                "Only contract masters can manage approvers".to_string(),
            ));
        }
        for input in &submitted {
            if !self.authorizer.is_eligible_approver(input.user_id).await? {
                return Err(PaymentError::Validation(format!(
                    "{} does not have approver privileges",
                    input.user_id
                )));
            }
        }

        let current = self.roster.entries(contract_id).await?;
        let masters: Vec<RosterEntry> = current.into_iter().filter(|e| e.is_master).collect();
        let planned = roster::plan_approver_sync(contract_id, &masters, &submitted)?;
        self.roster.replace(contract_id, planned.clone()).await?;
        info!(
            contract = %contract.number,
            approvers = planned.len(),
            "approver roster replaced"
        );
        Ok(planned)
    }

    pub async fn roster_entries(&self, contract_id: ContractId) -> Result<Vec<RosterEntry>> {
        self.roster.entries(contract_id).await
    }

    // ─── Tickets ────────────────────────────────────────────────

    /// Creates a draft payment ticket. The vendor is denormalized from the
    /// contract; a `replaces_ticket_id` must point at a rejected ticket of
    /// the same contract.
    pub async fn create_ticket(&self, actor: UserId, draft: TicketDraft) -> Result<Ticket> {
        let contract = self.require_contract(draft.contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;

        if let Some(replaced_id) = draft.replaces_ticket_id {
            let replaced = self.require_ticket(replaced_id).await?;
            if replaced.contract_id != contract.id {
                return Err(PaymentError::Validation(
                    "Replaced ticket belongs to a different contract".to_string(),
                ));
            }
            if replaced.approval_status != ApprovalStatus::Rejected {
                return Err(PaymentError::BusinessRule(
                    "Only rejected tickets can be replaced".to_string(),
                ));
            }
        }

        let number = match draft.number {
            Some(number) if !number.trim().is_empty() => {
                if self.tickets.by_number(&number).await?.is_some() {
                    return Err(PaymentError::Validation(format!(
                        "Ticket number {number} is already taken"
                    )));
                }
                number
            }
            _ => {
                let prefix =
                    format!("{}-{}-", ticket::TICKET_NUMBER_PREFIX, draft.date.year());
                let last = self.tickets.last_number_with_prefix(&prefix).await?;
                ticket::generate_number(draft.date, last.as_deref())
            }
        };

        let id = self.tickets.allocate_id().await?;
        let ticket = Ticket::new(
            id,
            number,
            draft.date,
            contract.id,
            contract.vendor_id,
            draft.amount,
            draft.notes,
            draft.replaces_ticket_id,
            actor,
        );
        self.tickets.insert(ticket.clone()).await?;
        debug!(ticket = %ticket.number, contract = %contract.number, "ticket created");
        Ok(ticket)
    }

    /// Submits a draft ticket for approval: snapshots the roster into
    /// pending steps and moves the ticket to `pending`.
    ///
    /// Refused when the ticket is not a draft, has no positive amount, the
    /// roster is empty, or paying it (on top of the already-paid total and
    /// every other pending/approved ticket) would exceed the contract
    /// amount. A refused submit leaves the ticket untouched with no steps.
    pub async fn submit(&self, actor: UserId, ticket_id: TicketId) -> Result<Ticket> {
        let mut ticket = self.require_ticket(ticket_id).await?;
        let contract = self.require_contract(ticket.contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;

        if ticket.approval_status != ApprovalStatus::Draft {
            return Err(PaymentError::BusinessRule(
                "Only draft tickets can be submitted for approval".to_string(),
            ));
        }
        let amount = ticket.amount.ok_or_else(|| {
            PaymentError::BusinessRule(
                "Ticket must have a payment amount before submission".to_string(),
            )
        })?;
        let roster = self.roster.entries(contract.id).await?;
        if roster.is_empty() {
            return Err(PaymentError::BusinessRule(
                "The contract must have at least one approver configured".to_string(),
            ));
        }

        let reserved: Decimal = self
            .tickets
            .for_contract(contract.id)
            .await?
            .iter()
            .filter(|t| {
                t.id != ticket.id
                    && matches!(
                        t.approval_status,
                        ApprovalStatus::Pending | ApprovalStatus::Approved
                    )
            })
            .filter_map(|t| t.amount.map(|a| a.value()))
            .sum();
        if contract.payment_total_paid.0 + reserved + amount.value() > contract.amount {
            return Err(PaymentError::BusinessRule(
                "Total payments (including this ticket) would exceed the contract amount"
                    .to_string(),
            ));
        }

        let snapshot: Vec<ApprovalStep> = roster
            .iter()
            .map(|entry| ApprovalStep::pending(ticket.id, entry.user_id, entry.sequence_no))
            .collect();
        self.steps.insert_snapshot(snapshot).await?;

        ticket.mark_submitted(Utc::now());
        ticket.updated_by = Some(actor);
        self.tickets.update(ticket.clone()).await?;
        info!(ticket = %ticket.number, approvers = roster.len(), "ticket submitted");
        Ok(ticket)
    }

    /// Approves the caller's step. Strict FIFO: the caller's pending step
    /// must be the lowest-sequence pending step. When the last step
    /// approves, the ticket transitions to `approved`.
    pub async fn approve(
        &self,
        actor: UserId,
        ticket_id: TicketId,
        remarks: Option<String>,
    ) -> Result<Ticket> {
        let mut ticket = self.require_ticket(ticket_id).await?;
        self.ensure_awaiting_approval(&ticket)?;
        let steps = self.steps.for_ticket(ticket_id).await?;
        let mut step = self.own_turn_step(actor, &steps)?;

        step.approve(remarks, Utc::now());
        self.steps.update(step.clone()).await?;

        // Re-read rather than patching the local copy: another approver may
        // have raced us to the store.
        let steps = self.steps.for_ticket(ticket_id).await?;
        if approval::fully_approved(&steps) {
            ticket.mark_approved(Utc::now());
            ticket.updated_by = Some(actor);
            self.tickets.update(ticket.clone()).await?;
            info!(ticket = %ticket.number, "ticket fully approved");
        } else {
            debug!(ticket = %ticket.number, sequence = step.sequence_no, "step approved");
        }
        Ok(ticket)
    }

    /// Rejects the caller's step. Remarks are required; the rejection is
    /// immediately terminal for the ticket.
    pub async fn reject(
        &self,
        actor: UserId,
        ticket_id: TicketId,
        remarks: String,
    ) -> Result<Ticket> {
        let mut ticket = self.require_ticket(ticket_id).await?;
        self.ensure_awaiting_approval(&ticket)?;
        let steps = self.steps.for_ticket(ticket_id).await?;
        let mut step = self.own_turn_step(actor, &steps)?;

        if remarks.trim().is_empty() {
            return Err(PaymentError::BusinessRule(
                "Remarks are required when rejecting a ticket".to_string(),
            ));
        }

        step.reject(remarks, Utc::now());
        self.steps.update(step).await?;

        ticket.mark_rejected();
        ticket.updated_by = Some(actor);
        self.tickets.update(ticket.clone()).await?;
        info!(ticket = %ticket.number, "ticket rejected");
        Ok(ticket)
    }

    /// Marks an approved ticket as paid and re-derives the contract's
    /// payment cache. Contract masters only.
    pub async fn mark_paid(
        &self,
        actor: UserId,
        ticket_id: TicketId,
        reference_no: Option<String>,
    ) -> Result<Ticket> {
        let mut ticket = self.require_ticket(ticket_id).await?;
        let contract = self.require_contract(ticket.contract_id).await?;

        if ticket.approval_status != ApprovalStatus::Approved {
            return Err(PaymentError::BusinessRule(
                "Only approved tickets can be marked as paid".to_string(),
            ));
        }
        if !contract.is_master(actor) {
            return Err(PaymentError::Authorization(
                "Only contract masters can mark tickets as paid".to_string(),
            ));
        }

        ticket.mark_paid(reference_no, Utc::now());
        ticket.updated_by = Some(actor);
        self.tickets.update(ticket.clone()).await?;
        self.sync_payment_cache(contract.id).await?;
        info!(ticket = %ticket.number, "payment recorded");
        Ok(ticket)
    }

    pub async fn delete_ticket(&self, actor: UserId, ticket_id: TicketId) -> Result<()> {
        let ticket = self.require_ticket(ticket_id).await?;
        let contract = self.require_contract(ticket.contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;
        self.tickets.soft_delete(ticket_id, Utc::now()).await
    }

    // ─── Documents ──────────────────────────────────────────────

    /// Records a document attachment and refreshes the ticket's
    /// informational document status.
    pub async fn attach_document(
        &self,
        actor: UserId,
        ticket_id: TicketId,
        doc_type: &str,
    ) -> Result<Ticket> {
        let ticket = self.require_ticket(ticket_id).await?;
        let contract = self.require_contract(ticket.contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;

        let count = self.documents.attach(ticket_id, doc_type).await?;
        self.refresh_document_status(ticket, count).await
    }

    pub async fn detach_document(
        &self,
        actor: UserId,
        ticket_id: TicketId,
        doc_type: &str,
    ) -> Result<Ticket> {
        let ticket = self.require_ticket(ticket_id).await?;
        let contract = self.require_contract(ticket.contract_id).await?;
        self.ensure_stakeholder(actor, &contract).await?;

        let count = self.documents.detach(ticket_id, doc_type).await?;
        self.refresh_document_status(ticket, count).await
    }

    async fn refresh_document_status(&self, mut ticket: Ticket, count: usize) -> Result<Ticket> {
        ticket.refresh_document_status(count);
        self.tickets.update(ticket.clone()).await?;
        Ok(ticket)
    }

    // ─── Payment cache ──────────────────────────────────────────

    /// Re-derives `payment_total_paid` / `payment_balance` from the
    /// contract's paid tickets. Pure recomputation: safe to call
    /// redundantly, never accumulates drift.
    pub async fn sync_payment_cache(&self, contract_id: ContractId) -> Result<Contract> {
        let mut contract = self.require_contract(contract_id).await?;
        let total_paid: Decimal = self
            .tickets
            .for_contract(contract_id)
            .await?
            .iter()
            .filter(|t| t.approval_status == ApprovalStatus::Paid)
            .filter_map(|t| t.amount.map(|a| a.value()))
            .sum();
        contract.apply_payment_totals(Balance::new(total_paid), Utc::now());
        self.contracts.update(contract.clone()).await?;
        debug!(
            contract = %contract.number,
            total_paid = %total_paid,
            balance = %contract.payment_balance.0,
            "payment cache synced"
        );
        Ok(contract)
    }

    // ─── Queries for reporting ──────────────────────────────────

    pub async fn contracts(&self) -> Result<Vec<Contract>> {
        self.contracts.all().await
    }

    pub async fn tickets(&self) -> Result<Vec<Ticket>> {
        self.tickets.all().await
    }

    pub async fn find_contract_by_number(&self, number: &str) -> Result<Option<Contract>> {
        self.contracts.by_number(number).await
    }

    pub async fn find_ticket_by_number(&self, number: &str) -> Result<Option<Ticket>> {
        self.tickets.by_number(number).await
    }

    pub async fn approval_steps(&self, ticket_id: TicketId) -> Result<Vec<ApprovalStep>> {
        self.steps.for_ticket(ticket_id).await
    }

    // ─── Helpers ────────────────────────────────────────────────

    async fn require_contract(&self, id: ContractId) -> Result<Contract> {
        self.contracts
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("contract {}", id.0)))
    }

    async fn require_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.tickets
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("ticket {}", id.0)))
    }

    /// Rejection and full approval are both terminal for step activity:
    /// only a `pending` ticket accepts approver actions.
    fn ensure_awaiting_approval(&self, ticket: &Ticket) -> Result<()> {
        if ticket.approval_status != ApprovalStatus::Pending {
            return Err(PaymentError::BusinessRule(
                "Ticket is not awaiting approval".to_string(),
            ));
        }
        Ok(())
    }

    /// Admins and contract stakeholders (creator, assigned master, roster
    /// member) may act on a contract and its tickets.
    async fn ensure_stakeholder(&self, actor: UserId, contract: &Contract) -> Result<()> {
        if self.authorizer.is_admin(actor).await? || contract.is_master(actor) {
            return Ok(());
        }
        let roster = self.roster.entries(contract.id).await?;
        if roster.iter().any(|e| e.user_id == actor) {
            return Ok(());
        }
        Err(PaymentError::Authorization(
            "You do not have access to this contract".to_string(),
        ))
    }

    /// The caller's pending step, which must also be the next pending step
    /// in sequence order.
    fn own_turn_step(&self, actor: UserId, steps: &[ApprovalStep]) -> Result<ApprovalStep> {
        let own = steps
            .iter()
            .find(|s| s.approver == actor && s.is_pending())
            .ok_or_else(|| {
                PaymentError::Authorization(
                    "You do not have a pending approval step for this ticket".to_string(),
                )
            })?;
        let next = approval::next_pending(steps).ok_or_else(|| {
            PaymentError::Authorization(
                "You do not have a pending approval step for this ticket".to_string(),
            )
        })?;
        if next.sequence_no != own.sequence_no {
            return Err(PaymentError::Authorization(
                "It is not your turn to act on this ticket".to_string(),
            ));
        }
        Ok(own.clone())
    }
}
