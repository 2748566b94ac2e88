use crate::application::engine::{ContractDraft, TicketDraft, WorkflowEngine};
use crate::domain::contract::CooperationType;
use crate::domain::roster::ApproverInput;
use crate::domain::{TicketId, UserId};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Register a vendor: number = code, remarks = name.
    Vendor,
    /// Create a routine contract: number, counterparty = vendor code, amount.
    Contract,
    /// Assign the second contract master: number = contract, counterparty = user id.
    Master,
    /// Append a non-master approver: number = contract, counterparty = user id, remarks.
    Approver,
    /// Create a draft ticket: number = ticket, counterparty = contract, amount.
    Ticket,
    /// Attach a document: number = ticket, counterparty = document type.
    Attach,
    /// Submit a draft ticket for approval: number = ticket.
    Submit,
    /// Approve the caller's step: number = ticket, optional remarks.
    Approve,
    /// Reject the caller's step: number = ticket, remarks required.
    Reject,
    /// Mark an approved ticket paid: number = ticket, remarks = payment reference.
    Pay,
}

/// One row of the workflow command stream. Fields are shared across ops;
/// each [`Op`] documents how it reads them.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: Op,
    /// Acting user id. Every operation names its principal explicitly.
    pub actor: u64,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub counterparty: String,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl Command {
    /// Executes this command against the engine.
    pub async fn apply(&self, engine: &WorkflowEngine) -> Result<()> {
        let actor = UserId(self.actor);
        match self.op {
            Op::Vendor => {
                let name = self.remarks.clone().ok_or_else(|| {
                    PaymentError::Validation("Vendor name is required".to_string())
                })?;
                engine.create_vendor(self.number.clone(), name).await?;
            }
            Op::Contract => {
                let vendor = engine
                    .find_vendor_by_code(&self.counterparty)
                    .await?
                    .ok_or_else(|| {
                        PaymentError::Validation(format!(
                            "Unknown vendor code {}",
                            self.counterparty
                        ))
                    })?;
                let amount = self.amount.ok_or_else(|| {
                    PaymentError::Validation("Contract amount is required".to_string())
                })?;
                engine
                    .create_contract(
                        actor,
                        ContractDraft {
                            number: self.number.clone(),
                            date: Utc::now().date_naive(),
                            vendor_id: vendor.id,
                            amount,
                            cooperation_type: CooperationType::Routine,
                            term_count: None,
                            term_percentages: None,
                            assigned_master: None,
                        },
                    )
                    .await?;
            }
            Op::Master => {
                let contract = self.require_contract(engine).await?;
                let user = self.counterparty_user()?;
                engine.assign_master(actor, contract, user).await?;
            }
            Op::Approver => {
                let contract = self.require_contract(engine).await?;
                let user = self.counterparty_user()?;
                let remarks = self.remarks.clone().ok_or_else(|| {
                    PaymentError::Validation("A remark is required for an approver".to_string())
                })?;
                // The engine replaces the whole non-master list, so append
                // the new approver to the current one.
                let mut submitted: Vec<ApproverInput> = engine
                    .roster_entries(contract)
                    .await?
                    .into_iter()
                    .filter(|e| !e.is_master)
                    .map(|e| ApproverInput {
                        user_id: e.user_id,
                        remarks: e.remarks,
                    })
                    .collect();
                submitted.push(ApproverInput {
                    user_id: user,
                    remarks,
                });
                engine.sync_approvers(actor, contract, submitted).await?;
            }
            Op::Ticket => {
                let contract = engine
                    .find_contract_by_number(&self.counterparty)
                    .await?
                    .ok_or_else(|| {
                        PaymentError::Validation(format!(
                            "Unknown contract number {}",
                            self.counterparty
                        ))
                    })?;
                let number = (!self.number.trim().is_empty()).then(|| self.number.clone());
                let amount = self.amount.map(TryInto::try_into).transpose()?;
                engine
                    .create_ticket(
                        actor,
                        TicketDraft {
                            number,
                            date: Utc::now().date_naive(),
                            contract_id: contract.id,
                            amount,
                            notes: self.remarks.clone(),
                            replaces_ticket_id: None,
                        },
                    )
                    .await?;
            }
            Op::Attach => {
                let ticket = self.require_ticket(engine).await?;
                engine
                    .attach_document(actor, ticket, &self.counterparty)
                    .await?;
            }
            Op::Submit => {
                let ticket = self.require_ticket(engine).await?;
                engine.submit(actor, ticket).await?;
            }
            Op::Approve => {
                let ticket = self.require_ticket(engine).await?;
                engine.approve(actor, ticket, self.remarks.clone()).await?;
            }
            Op::Reject => {
                let ticket = self.require_ticket(engine).await?;
                engine
                    .reject(actor, ticket, self.remarks.clone().unwrap_or_default())
                    .await?;
            }
            Op::Pay => {
                let ticket = self.require_ticket(engine).await?;
                engine.mark_paid(actor, ticket, self.remarks.clone()).await?;
            }
        }
        Ok(())
    }

    async fn require_contract(
        &self,
        engine: &WorkflowEngine,
    ) -> Result<crate::domain::ContractId> {
        engine
            .find_contract_by_number(&self.number)
            .await?
            .map(|c| c.id)
            .ok_or_else(|| {
                PaymentError::Validation(format!("Unknown contract number {}", self.number))
            })
    }

    async fn require_ticket(&self, engine: &WorkflowEngine) -> Result<TicketId> {
        engine
            .find_ticket_by_number(&self.number)
            .await?
            .map(|t| t.id)
            .ok_or_else(|| {
                PaymentError::Validation(format!("Unknown ticket number {}", self.number))
            })
    }

    fn counterparty_user(&self) -> Result<UserId> {
        self.counterparty
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| PaymentError::Validation(format!("Invalid user id {}", self.counterparty)))
    }
}

/// Reads workflow commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record
/// lengths, yielding commands lazily so large files stream.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, actor, number, counterparty, amount, remarks\n\
                    vendor, 1, VND-1, , , Acme Works\n\
                    contract, 1, CT-1, VND-1, 100000000,";
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();

        assert_eq!(commands.len(), 2);
        let vendor = commands[0].as_ref().unwrap();
        assert_eq!(vendor.op, Op::Vendor);
        assert_eq!(vendor.remarks.as_deref(), Some("Acme Works"));

        let contract = commands[1].as_ref().unwrap();
        assert_eq!(contract.op, Op::Contract);
        assert_eq!(contract.amount, Some(dec!(100000000)));
        assert_eq!(contract.remarks, None);
    }

    #[test]
    fn test_reader_malformed_op() {
        let data = "op, actor, number, counterparty, amount, remarks\n\
                    frobnicate, 1, X, , ,";
        let reader = CommandReader::new(data.as_bytes());
        let commands: Vec<Result<Command>> = reader.commands().collect();
        assert!(commands[0].is_err());
    }
}
