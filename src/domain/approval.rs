use super::{TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

/// One approver's decision on a ticket, snapshotted from the contract
/// roster at submission. Sequence numbers are immutable after creation;
/// `pending → approved` and `pending → rejected` are the only transitions,
/// both terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub ticket_id: TicketId,
    pub approver: UserId,
    pub sequence_no: u32,
    pub status: StepStatus,
    pub acted_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl ApprovalStep {
    pub fn pending(ticket_id: TicketId, approver: UserId, sequence_no: u32) -> Self {
        Self {
            ticket_id,
            approver,
            sequence_no,
            status: StepStatus::Pending,
            acted_at: None,
            remarks: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn approve(&mut self, remarks: Option<String>, now: DateTime<Utc>) {
        self.status = StepStatus::Approved;
        self.acted_at = Some(now);
        self.remarks = remarks;
    }

    pub fn reject(&mut self, remarks: String, now: DateTime<Utc>) {
        self.status = StepStatus::Rejected;
        self.acted_at = Some(now);
        self.remarks = Some(remarks);
    }
}

/// The step whose turn it is: lowest sequence number still pending.
pub fn next_pending(steps: &[ApprovalStep]) -> Option<&ApprovalStep> {
    steps
        .iter()
        .filter(|s| s.is_pending())
        .min_by_key(|s| s.sequence_no)
}

/// True when the ticket has steps and every one of them is approved.
pub fn fully_approved(steps: &[ApprovalStep]) -> bool {
    !steps.is_empty() && steps.iter().all(|s| s.status == StepStatus::Approved)
}
