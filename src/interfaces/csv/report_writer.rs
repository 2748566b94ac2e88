use crate::domain::contract::Contract;
use crate::domain::ticket::Ticket;
use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;

/// Writes the end-of-run workflow state as CSV: one row per contract with
/// its payment cache, then one row per ticket with its approval state.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(target: W) -> Self {
        let writer = csv::WriterBuilder::new().flexible(true).from_writer(target);
        Self { writer }
    }

    pub fn write_report(&mut self, contracts: &[Contract], tickets: &[Ticket]) -> Result<()> {
        let numbers: HashMap<_, _> = contracts
            .iter()
            .map(|c| (c.id, c.number.as_str()))
            .collect();

        for contract in contracts {
            let amount = contract.amount.to_string();
            let paid = contract.payment_total_paid.0.to_string();
            let balance = contract.payment_balance.0.to_string();
            self.writer.write_record([
                "contract",
                contract.number.as_str(),
                amount.as_str(),
                paid.as_str(),
                balance.as_str(),
            ])?;
        }
        for ticket in tickets {
            let amount = ticket
                .amount
                .map(|a| a.value().to_string())
                .unwrap_or_default();
            let status = ticket.approval_status.to_string();
            self.writer.write_record([
                "ticket",
                ticket.number.as_str(),
                numbers.get(&ticket.contract_id).copied().unwrap_or(""),
                amount.as_str(),
                status.as_str(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
