use crate::domain::TicketId;
use crate::domain::UserId;
use crate::domain::ports::{Authorizer, DocumentIndex};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An [`Authorizer`] backed by explicit user sets. The CLI runs it in
/// permissive mode (every actor is an eligible approver); tests pin down
/// exact admin and eligibility sets.
#[derive(Default, Clone)]
pub struct StaticAuthorizer {
    admins: HashSet<UserId>,
    eligible: HashSet<UserId>,
    everyone_eligible: bool,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats every user as an eligible approver. Admin status still
    /// requires an explicit grant.
    pub fn permissive() -> Self {
        Self {
            everyone_eligible: true,
            ..Self::default()
        }
    }

    pub fn with_admin(mut self, user: UserId) -> Self {
        self.admins.insert(user);
        self
    }

    pub fn with_eligible(mut self, user: UserId) -> Self {
        self.eligible.insert(user);
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn is_admin(&self, user: UserId) -> Result<bool> {
        Ok(self.admins.contains(&user))
    }

    async fn is_eligible_approver(&self, user: UserId) -> Result<bool> {
        Ok(self.everyone_eligible || self.eligible.contains(&user))
    }
}

/// In-memory [`DocumentIndex`]: one slot per document type per ticket,
/// mirroring the fixed five-type checklist. The blobs themselves live
/// elsewhere; only presence matters to the workflow.
#[derive(Default, Clone)]
pub struct InMemoryDocumentIndex {
    attached: Arc<RwLock<HashMap<TicketId, HashSet<String>>>>,
}

impl InMemoryDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentIndex for InMemoryDocumentIndex {
    async fn document_count(&self, ticket_id: TicketId) -> Result<usize> {
        let attached = self.attached.read().await;
        Ok(attached.get(&ticket_id).map_or(0, HashSet::len))
    }

    async fn attach(&self, ticket_id: TicketId, doc_type: &str) -> Result<usize> {
        let mut attached = self.attached.write().await;
        let docs = attached.entry(ticket_id).or_default();
        docs.insert(doc_type.to_string());
        Ok(docs.len())
    }

    async fn detach(&self, ticket_id: TicketId, doc_type: &str) -> Result<usize> {
        let mut attached = self.attached.write().await;
        let docs = attached.entry(ticket_id).or_default();
        docs.remove(doc_type);
        Ok(docs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_authorizer_sets() {
        let auth = StaticAuthorizer::new()
            .with_admin(UserId(1))
            .with_eligible(UserId(2));
        assert!(auth.is_admin(UserId(1)).await.unwrap());
        assert!(!auth.is_admin(UserId(2)).await.unwrap());
        assert!(auth.is_eligible_approver(UserId(2)).await.unwrap());
        assert!(!auth.is_eligible_approver(UserId(3)).await.unwrap());

        let permissive = StaticAuthorizer::permissive();
        assert!(permissive.is_eligible_approver(UserId(99)).await.unwrap());
        assert!(!permissive.is_admin(UserId(99)).await.unwrap());
    }

    #[tokio::test]
    async fn test_document_index_counts_distinct_types() {
        let index = InMemoryDocumentIndex::new();
        let ticket = TicketId(1);
        assert_eq!(index.document_count(ticket).await.unwrap(), 0);

        index.attach(ticket, "invoice").await.unwrap();
        // Re-attaching the same type does not double-count.
        assert_eq!(index.attach(ticket, "invoice").await.unwrap(), 1);
        assert_eq!(index.attach(ticket, "tax_id").await.unwrap(), 2);
        assert_eq!(index.detach(ticket, "invoice").await.unwrap(), 1);
    }
}
