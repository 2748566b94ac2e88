use super::{ContractId, TicketId, UserId, VendorId};
use crate::domain::money::Amount;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The five document types a complete payment request carries.
pub const DOCUMENT_TYPES: [&str; 5] = [
    "contract",
    "invoice",
    "handover_report",
    "tax_id",
    "tax_invoice",
];

pub const REQUIRED_DOCUMENT_COUNT: usize = DOCUMENT_TYPES.len();

/// Prefix for generated ticket numbers: `TKT-{year}-{nnnn}`.
pub const TICKET_NUMBER_PREFIX: &str = "TKT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// Document completeness. Informational only; orthogonal to the approval
/// state and never a submission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Complete,
    Incomplete,
}

impl DocumentStatus {
    pub fn from_count(count: usize) -> Self {
        if count >= REQUIRED_DOCUMENT_COUNT {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

/// A payment request raised against a contract's remaining balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    /// Unique, caller-supplied or generated via [`generate_number`].
    pub number: String,
    pub date: NaiveDate,
    pub contract_id: ContractId,
    /// Denormalized from the contract at creation.
    pub vendor_id: VendorId,
    pub status: DocumentStatus,
    pub amount: Option<Amount>,
    pub approval_status: ApprovalStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Payment reference recorded when marked paid.
    pub reference_no: Option<String>,
    /// The rejected ticket this one re-requests, if any.
    pub replaces_ticket_id: Option<TicketId>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub updated_by: Option<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TicketId,
        number: String,
        date: NaiveDate,
        contract_id: ContractId,
        vendor_id: VendorId,
        amount: Option<Amount>,
        notes: Option<String>,
        replaces_ticket_id: Option<TicketId>,
        created_by: UserId,
    ) -> Self {
        Self {
            id,
            number,
            date,
            contract_id,
            vendor_id,
            status: DocumentStatus::Incomplete,
            amount,
            approval_status: ApprovalStatus::Draft,
            submitted_at: None,
            approved_at: None,
            paid_at: None,
            reference_no: None,
            replaces_ticket_id,
            notes,
            created_by,
            updated_by: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn mark_submitted(&mut self, now: DateTime<Utc>) {
        self.approval_status = ApprovalStatus::Pending;
        self.submitted_at = Some(now);
    }

    pub fn mark_approved(&mut self, now: DateTime<Utc>) {
        // Idempotent: repeated full-approval evaluation keeps the first stamp.
        if self.approval_status != ApprovalStatus::Approved {
            self.approval_status = ApprovalStatus::Approved;
            self.approved_at = Some(now);
        }
    }

    pub fn mark_rejected(&mut self) {
        self.approval_status = ApprovalStatus::Rejected;
    }

    pub fn mark_paid(&mut self, reference_no: Option<String>, now: DateTime<Utc>) {
        self.approval_status = ApprovalStatus::Paid;
        self.paid_at = Some(now);
        self.reference_no = reference_no;
    }

    pub fn refresh_document_status(&mut self, document_count: usize) {
        self.status = DocumentStatus::from_count(document_count);
    }
}

/// Generates the next ticket number for `year`, continuing from the highest
/// existing number with that year's prefix (`TKT-2026-0007` → `TKT-2026-0008`).
pub fn generate_number(date: NaiveDate, last_for_year: Option<&str>) -> String {
    let prefix = format!("{}-{}-", TICKET_NUMBER_PREFIX, date.year());
    let next = last_for_year
        .and_then(|n| n.strip_prefix(&prefix))
        .and_then(|tail| tail.parse::<u32>().ok())
        .map_or(1, |n| n + 1);
    format!("{prefix}{next:04}")
}
