use super::{ContractId, UserId};
use crate::domain::contract::Contract;
use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};

/// Remark stamped on the creator's system-managed roster entry.
pub const MASTER_REMARK_PRIMARY: &str = "Contract master";
/// Remark stamped on the assigned second master's entry.
pub const MASTER_REMARK_ASSISTANT: &str = "Assistant contract master";

/// One approver position on a contract. Masters are system-managed and
/// always occupy the lowest sequence numbers; non-masters are maintained by
/// the contract masters via [`plan_approver_sync`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub contract_id: ContractId,
    pub user_id: UserId,
    /// 1-based position, unique per contract, contiguous after any sync.
    pub sequence_no: u32,
    pub remarks: String,
    pub is_master: bool,
}

/// A submitted non-master approver row.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproverInput {
    pub user_id: UserId,
    pub remarks: String,
}

/// Computes the full replacement roster after the contract's masters may
/// have changed.
///
/// Masters (creator first, then the assigned master) take sequence 1..k with
/// fixed remarks; prior non-master entries keep their relative order at
/// k+1..N. A prior non-master entry whose user became a master is absorbed
/// into the master block. The plan is deterministic, so running it twice
/// with unchanged masters yields an identical roster.
///
/// The caller swaps the result in atomically; the store never sees an
/// intermediate numbering.
pub fn plan_master_resync(contract: &Contract, existing: &[RosterEntry]) -> Vec<RosterEntry> {
    let masters = contract.master_users();

    let mut roster: Vec<RosterEntry> = masters
        .iter()
        .enumerate()
        .map(|(i, user_id)| RosterEntry {
            contract_id: contract.id,
            user_id: *user_id,
            sequence_no: i as u32 + 1,
            remarks: if i == 0 {
                MASTER_REMARK_PRIMARY.to_string()
            } else {
                MASTER_REMARK_ASSISTANT.to_string()
            },
            is_master: true,
        })
        .collect();

    let mut seq = roster.len() as u32;
    let mut holdovers: Vec<&RosterEntry> = existing
        .iter()
        .filter(|e| !e.is_master && !masters.contains(&e.user_id))
        .collect();
    holdovers.sort_by_key(|e| e.sequence_no);
    for entry in holdovers {
        seq += 1;
        roster.push(RosterEntry {
            sequence_no: seq,
            ..entry.clone()
        });
    }

    roster
}

/// Computes the full replacement roster for a master-driven approver sync:
/// the current master block stays untouched, the submitted rows replace all
/// non-masters in submitted order.
///
/// Submitted user ids must be distinct and carry a remark; ids already
/// present as masters are silently skipped. Eligibility of each user is the
/// caller's concern (authorization port).
pub fn plan_approver_sync(
    contract_id: ContractId,
    masters: &[RosterEntry],
    submitted: &[ApproverInput],
) -> Result<Vec<RosterEntry>> {
    let mut seen = std::collections::HashSet::new();
    for input in submitted {
        if !seen.insert(input.user_id) {
            return Err(PaymentError::Validation(format!(
                "Duplicate approver submitted: {}",
                input.user_id
            )));
        }
        if input.remarks.trim().is_empty() {
            return Err(PaymentError::Validation(format!(
                "A remark is required for approver {}",
                input.user_id
            )));
        }
    }

    let mut roster: Vec<RosterEntry> = masters.to_vec();
    roster.sort_by_key(|e| e.sequence_no);

    let mut seq = roster.len() as u32;
    for input in submitted {
        if roster.iter().any(|m| m.is_master && m.user_id == input.user_id) {
            continue;
        }
        seq += 1;
        roster.push(RosterEntry {
            contract_id,
            user_id: input.user_id,
            sequence_no: seq,
            remarks: input.remarks.clone(),
            is_master: false,
        });
    }

    Ok(roster)
}
