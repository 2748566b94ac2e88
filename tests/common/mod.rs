use chrono::NaiveDate;
use paytrack::application::engine::{ContractDraft, TicketDraft, WorkflowEngine};
use paytrack::domain::contract::{Contract, CooperationType};
use paytrack::domain::money::Amount;
use paytrack::domain::ticket::Ticket;
use paytrack::domain::{ContractId, UserId};
use paytrack::infrastructure::access::{InMemoryDocumentIndex, StaticAuthorizer};
use paytrack::infrastructure::in_memory::InMemoryStore;
use rust_decimal::Decimal;

pub fn engine_with(authorizer: StaticAuthorizer) -> WorkflowEngine {
    let store = InMemoryStore::new();
    WorkflowEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store),
        Box::new(authorizer),
        Box::new(InMemoryDocumentIndex::new()),
    )
}

/// Engine where every user is an eligible approver.
pub fn engine() -> WorkflowEngine {
    engine_with(StaticAuthorizer::permissive())
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

/// Creates a vendor plus a routine contract owned by `creator`.
pub async fn seeded_contract(
    engine: &WorkflowEngine,
    creator: UserId,
    amount: Decimal,
) -> Contract {
    let vendor = engine
        .create_vendor("VND-1".to_string(), "Acme Works".to_string())
        .await
        .unwrap();
    engine
        .create_contract(
            creator,
            ContractDraft {
                number: "CT-1".to_string(),
                date: date(),
                vendor_id: vendor.id,
                amount,
                cooperation_type: CooperationType::Routine,
                term_count: None,
                term_percentages: None,
                assigned_master: None,
            },
        )
        .await
        .unwrap()
}

pub async fn draft_ticket(
    engine: &WorkflowEngine,
    actor: UserId,
    contract_id: ContractId,
    amount: Option<Decimal>,
) -> Ticket {
    engine
        .create_ticket(
            actor,
            TicketDraft {
                number: None,
                date: date(),
                contract_id,
                amount: amount.map(|a| Amount::new(a).unwrap()),
                notes: None,
                replaces_ticket_id: None,
            },
        )
        .await
        .unwrap()
}
