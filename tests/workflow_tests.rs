mod common;

use common::{date, draft_ticket, engine, engine_with, seeded_contract};
use paytrack::application::engine::TicketDraft;
use paytrack::domain::UserId;
use paytrack::domain::approval::StepStatus;
use paytrack::domain::money::{Amount, Balance};
use paytrack::domain::roster::ApproverInput;
use paytrack::domain::ticket::{ApprovalStatus, DocumentStatus};
use paytrack::error::PaymentError;
use paytrack::infrastructure::access::StaticAuthorizer;
use rust_decimal_macros::dec;

const A: UserId = UserId(1);
const B: UserId = UserId(2);

async fn add_approver(engine: &paytrack::application::engine::WorkflowEngine, contract: paytrack::domain::ContractId) {
    engine
        .sync_approvers(
            A,
            contract,
            vec![ApproverInput {
                user_id: B,
                remarks: "finance review".to_string(),
            }],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_full_approval_and_payment_flow() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;
    add_approver(&engine, contract.id).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    let ticket = engine.submit(A, ticket.id).await.unwrap();
    assert_eq!(ticket.approval_status, ApprovalStatus::Pending);
    assert!(ticket.submitted_at.is_some());

    let steps = engine.approval_steps(ticket.id).await.unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].sequence_no, 1);
    assert_eq!(steps[0].approver, A);
    assert!(steps.iter().all(|s| s.status == StepStatus::Pending));

    // First approver alone does not flip the ticket.
    let ticket = engine
        .approve(A, ticket.id, Some("looks good".to_string()))
        .await
        .unwrap();
    assert_eq!(ticket.approval_status, ApprovalStatus::Pending);
    let steps = engine.approval_steps(ticket.id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Approved);
    assert!(steps[0].acted_at.is_some());

    let ticket = engine.approve(B, ticket.id, None).await.unwrap();
    assert_eq!(ticket.approval_status, ApprovalStatus::Approved);
    assert!(ticket.approved_at.is_some());

    let ticket = engine
        .mark_paid(A, ticket.id, Some("TF-1".to_string()))
        .await
        .unwrap();
    assert_eq!(ticket.approval_status, ApprovalStatus::Paid);
    assert_eq!(ticket.reference_no.as_deref(), Some("TF-1"));
    assert!(ticket.paid_at.is_some());

    let contract = engine
        .find_contract_by_number("CT-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contract.payment_total_paid, Balance::new(dec!(40000000)));
    assert_eq!(contract.payment_balance, Balance::new(dec!(60000000)));
    assert!(contract.payment_last_synced_at.is_some());
}

#[tokio::test]
async fn test_submit_over_ceiling_is_refused() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(150000000))).await;
    let result = engine.submit(A, ticket.id).await;
    assert!(matches!(result, Err(PaymentError::BusinessRule(_))));

    // The refused submit mutated nothing.
    let ticket = engine.find_ticket_by_number(&ticket.number).await.unwrap().unwrap();
    assert_eq!(ticket.approval_status, ApprovalStatus::Draft);
    assert!(ticket.submitted_at.is_none());
    assert!(engine.approval_steps(ticket.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ceiling_counts_pending_and_approved_tickets() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let first = draft_ticket(&engine, A, contract.id, Some(dec!(70000000))).await;
    engine.submit(A, first.id).await.unwrap();

    // 70M is reserved by the pending ticket, so 40M more cannot go through.
    let second = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    let result = engine.submit(A, second.id).await;
    assert!(matches!(result, Err(PaymentError::BusinessRule(_))));

    // 30M still fits exactly.
    let third = draft_ticket(&engine, A, contract.id, Some(dec!(30000000))).await;
    assert!(engine.submit(A, third.id).await.is_ok());
}

#[tokio::test]
async fn test_submit_guards() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let amountless = draft_ticket(&engine, A, contract.id, None).await;
    assert!(matches!(
        engine.submit(A, amountless.id).await,
        Err(PaymentError::BusinessRule(_))
    ));

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(1000))).await;
    engine.submit(A, ticket.id).await.unwrap();
    // A pending ticket cannot be submitted again.
    assert!(matches!(
        engine.submit(A, ticket.id).await,
        Err(PaymentError::BusinessRule(_))
    ));
}

#[tokio::test]
async fn test_out_of_turn_approval_is_refused() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;
    add_approver(&engine, contract.id).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    engine.submit(A, ticket.id).await.unwrap();

    let result = engine.approve(B, ticket.id, None).await;
    assert!(matches!(result, Err(PaymentError::Authorization(_))));

    // No step moved.
    let steps = engine.approval_steps(ticket.id).await.unwrap();
    assert!(steps.iter().all(|s| s.status == StepStatus::Pending));

    // A stranger with no step at all gets refused too.
    let result = engine.approve(UserId(99), ticket.id, None).await;
    assert!(matches!(result, Err(PaymentError::Authorization(_))));
}

#[tokio::test]
async fn test_rejection_is_terminal() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;
    add_approver(&engine, contract.id).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    engine.submit(A, ticket.id).await.unwrap();

    // Remarks are mandatory for a rejection.
    assert!(matches!(
        engine.reject(A, ticket.id, "  ".to_string()).await,
        Err(PaymentError::BusinessRule(_))
    ));

    let ticket = engine
        .reject(A, ticket.id, "budget frozen".to_string())
        .await
        .unwrap();
    assert_eq!(ticket.approval_status, ApprovalStatus::Rejected);

    // The second approver's step exists but can no longer transition.
    assert!(matches!(
        engine.approve(B, ticket.id, None).await,
        Err(PaymentError::BusinessRule(_))
    ));
    let steps = engine.approval_steps(ticket.id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Rejected);
    assert_eq!(steps[0].remarks.as_deref(), Some("budget frozen"));
    assert_eq!(steps[1].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_replacement_ticket_after_rejection() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    engine.submit(A, ticket.id).await.unwrap();
    engine
        .reject(A, ticket.id, "wrong invoice".to_string())
        .await
        .unwrap();

    let replacement = engine
        .create_ticket(
            A,
            TicketDraft {
                number: None,
                date: date(),
                contract_id: contract.id,
                amount: Some(Amount::new(dec!(40000000)).unwrap()),
                notes: None,
                replaces_ticket_id: Some(ticket.id),
            },
        )
        .await
        .unwrap();
    assert_eq!(replacement.replaces_ticket_id, Some(ticket.id));

    // Only rejected tickets can be replaced.
    let result = engine
        .create_ticket(
            A,
            TicketDraft {
                number: None,
                date: date(),
                contract_id: contract.id,
                amount: None,
                notes: None,
                replaces_ticket_id: Some(replacement.id),
            },
        )
        .await;
    assert!(matches!(result, Err(PaymentError::BusinessRule(_))));
}

#[tokio::test]
async fn test_mark_paid_gates() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;
    add_approver(&engine, contract.id).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    engine.submit(A, ticket.id).await.unwrap();

    // Not yet approved.
    assert!(matches!(
        engine.mark_paid(A, ticket.id, None).await,
        Err(PaymentError::BusinessRule(_))
    ));

    engine.approve(A, ticket.id, None).await.unwrap();
    engine.approve(B, ticket.id, None).await.unwrap();

    // B approved the ticket but is not a contract master.
    assert!(matches!(
        engine.mark_paid(B, ticket.id, None).await,
        Err(PaymentError::Authorization(_))
    ));

    assert!(engine.mark_paid(A, ticket.id, None).await.is_ok());
}

#[tokio::test]
async fn test_payment_cache_rederivation() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(40000000))).await;
    engine.submit(A, ticket.id).await.unwrap();
    engine.approve(A, ticket.id, None).await.unwrap();
    engine.mark_paid(A, ticket.id, None).await.unwrap();

    // Redundant syncs never drift.
    let once = engine.sync_payment_cache(contract.id).await.unwrap();
    let twice = engine.sync_payment_cache(contract.id).await.unwrap();
    assert_eq!(once.payment_total_paid, twice.payment_total_paid);
    assert_eq!(once.payment_balance, Balance::new(dec!(60000000)));

    // Editing the amount below what is already paid floors the balance.
    let updated = engine
        .update_amount(A, contract.id, dec!(30000000))
        .await
        .unwrap();
    assert_eq!(updated.payment_total_paid, Balance::new(dec!(40000000)));
    assert_eq!(updated.payment_balance, Balance::ZERO);
}

#[tokio::test]
async fn test_stakeholder_gate_and_admin_bypass() {
    let admin = UserId(50);
    let outsider = UserId(99);
    let engine = engine_with(StaticAuthorizer::permissive().with_admin(admin));
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(1000))).await;
    assert!(matches!(
        engine.submit(outsider, ticket.id).await,
        Err(PaymentError::Authorization(_))
    ));

    // Admins act on any contract.
    assert!(engine.submit(admin, ticket.id).await.is_ok());
}

#[tokio::test]
async fn test_document_status_is_orthogonal() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;
    let ticket = draft_ticket(&engine, A, contract.id, Some(dec!(1000))).await;

    for doc_type in ["contract", "invoice", "handover_report", "tax_id"] {
        let t = engine.attach_document(A, ticket.id, doc_type).await.unwrap();
        assert_eq!(t.status, DocumentStatus::Incomplete);
    }
    let t = engine
        .attach_document(A, ticket.id, "tax_invoice")
        .await
        .unwrap();
    assert_eq!(t.status, DocumentStatus::Complete);

    let t = engine
        .detach_document(A, ticket.id, "invoice")
        .await
        .unwrap();
    assert_eq!(t.status, DocumentStatus::Incomplete);

    // An incomplete ticket still submits.
    assert!(engine.submit(A, ticket.id).await.is_ok());
}

#[tokio::test]
async fn test_ticket_numbers_are_sequential_and_unique() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;

    let first = draft_ticket(&engine, A, contract.id, None).await;
    let second = draft_ticket(&engine, A, contract.id, None).await;
    assert_eq!(first.number, "TKT-2026-0001");
    assert_eq!(second.number, "TKT-2026-0002");

    let result = engine
        .create_ticket(
            A,
            TicketDraft {
                number: Some(first.number.clone()),
                date: date(),
                contract_id: contract.id,
                amount: None,
                notes: None,
                replaces_ticket_id: None,
            },
        )
        .await;
    assert!(matches!(result, Err(PaymentError::Validation(_))));
}

#[tokio::test]
async fn test_soft_deleted_ticket_leaves_audit_trail_out_of_queries() {
    let engine = engine();
    let contract = seeded_contract(&engine, A, dec!(100000000)).await;
    let ticket = draft_ticket(&engine, A, contract.id, None).await;

    engine.delete_ticket(A, ticket.id).await.unwrap();
    assert!(engine.find_ticket_by_number(&ticket.number).await.unwrap().is_none());
    assert!(engine.tickets().await.unwrap().is_empty());

    // The number stays reserved: the next generated one does not reuse it.
    let next = draft_ticket(&engine, A, contract.id, None).await;
    assert_eq!(next.number, "TKT-2026-0002");
}
