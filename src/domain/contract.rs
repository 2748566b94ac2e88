use super::{ContractId, UserId, VendorId};
use crate::domain::money::Balance;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Allowed deviation when checking that progress-term percentages sum to 100.
pub const PERCENT_SUM_TOLERANCE: Decimal = dec!(0.01);

/// Upper bound on the number of progress terms.
pub const MAX_TERM_COUNT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooperationType {
    /// Paid in staged terms, each a percentage of the contract amount.
    Progress,
    /// Recurring cooperation without fixed terms.
    Routine,
}

/// A vendor contract. Carries the payment cache (`payment_total_paid` /
/// `payment_balance`) that the workflow re-derives from paid tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    /// Unique contract number, e.g. "CT-2026-001".
    pub number: String,
    pub date: NaiveDate,
    pub vendor_id: VendorId,
    /// Total contract value; the ceiling for all payments under it.
    pub amount: Decimal,
    pub cooperation_type: CooperationType,
    /// Progress contracts only: number of payment terms.
    pub term_count: Option<u32>,
    /// Progress contracts only: per-term percentages summing to 100.
    pub term_percentages: Option<Vec<Decimal>>,
    pub is_active: bool,
    pub created_by: UserId,
    pub updated_by: Option<UserId>,
    /// The assignable second contract master; the creator is always a master.
    pub assigned_master: Option<UserId>,
    pub payment_total_paid: Balance,
    pub payment_balance: Balance,
    pub payment_last_synced_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contract {
    /// Builds a contract, validating the progress-term shape. Routine
    /// contracts have their term fields cleared regardless of input.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ContractId,
        number: String,
        date: NaiveDate,
        vendor_id: VendorId,
        amount: Decimal,
        cooperation_type: CooperationType,
        term_count: Option<u32>,
        term_percentages: Option<Vec<Decimal>>,
        created_by: UserId,
        assigned_master: Option<UserId>,
    ) -> Result<Self> {
        if number.trim().is_empty() {
            return Err(PaymentError::Validation(
                "Contract number is required".to_string(),
            ));
        }
        if amount < Decimal::ZERO {
            return Err(PaymentError::Validation(
                "Contract amount must be at least 0".to_string(),
            ));
        }

        let (term_count, term_percentages) = match cooperation_type {
            CooperationType::Progress => {
                let count = term_count.ok_or_else(|| {
                    PaymentError::Validation(
                        "Number of terms is required for progress contracts".to_string(),
                    )
                })?;
                let percentages = term_percentages.ok_or_else(|| {
                    PaymentError::Validation(
                        "Term percentages are required for progress contracts".to_string(),
                    )
                })?;
                validate_terms(count, &percentages)?;
                (Some(count), Some(percentages))
            }
            CooperationType::Routine => (None, None),
        };

        Ok(Self {
            id,
            number,
            date,
            vendor_id,
            amount,
            cooperation_type,
            term_count,
            term_percentages,
            is_active: true,
            created_by,
            updated_by: None,
            assigned_master,
            payment_total_paid: Balance::ZERO,
            payment_balance: Balance::new(amount),
            payment_last_synced_at: None,
            deleted_at: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// A contract master is the creator or the assigned second master.
    pub fn is_master(&self, user: UserId) -> bool {
        self.created_by == user || self.assigned_master == Some(user)
    }

    /// The system-managed master set: distinct non-null
    /// {creator, assigned master}, creator first.
    pub fn master_users(&self) -> Vec<UserId> {
        let mut masters = vec![self.created_by];
        if let Some(assigned) = self.assigned_master
            && assigned != self.created_by
        {
            masters.push(assigned);
        }
        masters
    }

    /// Applies a freshly derived paid total to the payment cache.
    /// The balance never drops below zero.
    pub fn apply_payment_totals(&mut self, total_paid: Balance, now: DateTime<Utc>) {
        self.payment_total_paid = total_paid;
        self.payment_balance = (Balance::new(self.amount) - total_paid).floor_zero();
        self.payment_last_synced_at = Some(now);
    }

    pub fn is_progress(&self) -> bool {
        self.cooperation_type == CooperationType::Progress
    }

    pub fn is_routine(&self) -> bool {
        self.cooperation_type == CooperationType::Routine
    }
}

fn validate_terms(count: u32, percentages: &[Decimal]) -> Result<()> {
    if count == 0 || count as usize > MAX_TERM_COUNT {
        return Err(PaymentError::Validation(format!(
            "Term count must be between 1 and {MAX_TERM_COUNT}"
        )));
    }
    if percentages.len() != count as usize {
        return Err(PaymentError::Validation(format!(
            "Expected {count} term percentages, got {}",
            percentages.len()
        )));
    }
    if percentages
        .iter()
        .any(|p| *p < Decimal::ZERO || *p > dec!(100))
    {
        return Err(PaymentError::Validation(
            "Each term percentage must be between 0 and 100".to_string(),
        ));
    }
    let total: Decimal = percentages.iter().sum();
    if (total - dec!(100)).abs() > PERCENT_SUM_TOLERANCE {
        return Err(PaymentError::Validation(format!(
            "Total percentage must equal 100%. Current total: {total}%"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_contract(percentages: Vec<Decimal>) -> Result<Contract> {
        Contract::new(
            ContractId(1),
            "CT-1".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            VendorId(1),
            dec!(100000000),
            CooperationType::Progress,
            Some(percentages.len() as u32),
            Some(percentages),
            UserId(1),
            None,
        )
    }

    #[test]
    fn test_progress_terms_must_sum_to_100() {
        assert!(progress_contract(vec![dec!(50), dec!(50)]).is_ok());
        // Within tolerance
        assert!(progress_contract(vec![dec!(33.33), dec!(33.33), dec!(33.33)]).is_ok());
        assert!(matches!(
            progress_contract(vec![dec!(60), dec!(50)]),
            Err(PaymentError::Validation(_))
        ));
        assert!(matches!(
            progress_contract(vec![dec!(33.3), dec!(33.3), dec!(33.3)]),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn test_term_count_must_match_percentages() {
        let result = Contract::new(
            ContractId(1),
            "CT-1".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            VendorId(1),
            dec!(1000),
            CooperationType::Progress,
            Some(3),
            Some(vec![dec!(50), dec!(50)]),
            UserId(1),
            None,
        );
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[test]
    fn test_routine_clears_term_fields() {
        let contract = Contract::new(
            ContractId(1),
            "CT-1".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            VendorId(1),
            dec!(1000),
            CooperationType::Routine,
            Some(4),
            Some(vec![dec!(25); 4]),
            UserId(1),
            None,
        )
        .unwrap();
        assert_eq!(contract.term_count, None);
        assert_eq!(contract.term_percentages, None);
    }

    #[test]
    fn test_master_users_dedups_creator() {
        let mut contract = progress_contract(vec![dec!(100)]).unwrap();
        assert_eq!(contract.master_users(), vec![UserId(1)]);

        contract.assigned_master = Some(UserId(1));
        assert_eq!(contract.master_users(), vec![UserId(1)]);

        contract.assigned_master = Some(UserId(7));
        assert_eq!(contract.master_users(), vec![UserId(1), UserId(7)]);
        assert!(contract.is_master(UserId(7)));
        assert!(!contract.is_master(UserId(8)));
    }

    #[test]
    fn test_apply_payment_totals_floors_balance() {
        let mut contract = progress_contract(vec![dec!(100)]).unwrap();
        let now = Utc::now();

        contract.apply_payment_totals(Balance::new(dec!(40000000)), now);
        assert_eq!(contract.payment_total_paid, Balance::new(dec!(40000000)));
        assert_eq!(contract.payment_balance, Balance::new(dec!(60000000)));

        // Paid more than the (edited-down) ceiling: balance clamps at zero.
        contract.amount = dec!(30000000);
        contract.apply_payment_totals(Balance::new(dec!(40000000)), now);
        assert_eq!(contract.payment_balance, Balance::ZERO);
    }
}
