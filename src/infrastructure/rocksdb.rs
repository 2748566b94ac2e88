use crate::domain::approval::ApprovalStep;
use crate::domain::contract::Contract;
use crate::domain::ports::{ContractStore, RosterStore, StepStore, TicketStore, VendorStore};
use crate::domain::roster::RosterEntry;
use crate::domain::ticket::Ticket;
use crate::domain::vendor::Vendor;
use crate::domain::{ContractId, TicketId, VendorId};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_VENDORS: &str = "vendors";
pub const CF_CONTRACTS: &str = "contracts";
pub const CF_ROSTER: &str = "roster";
pub const CF_TICKETS: &str = "tickets";
pub const CF_STEPS: &str = "steps";
/// Id counter plus the unique-number indexes.
pub const CF_META: &str = "meta";

const NEXT_ID_KEY: &[u8] = b"next_id";

/// A persistent store backed by RocksDB, one column family per entity.
///
/// Values are JSON; roster and step rows are keyed by
/// `(parent id, sequence_no)` so a forward iteration yields sequence order.
/// RocksDB has no multi-key transactions here, so a writer mutex serializes
/// the check-then-write sections and `WriteBatch` keeps multi-row writes
/// atomic on disk.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates the database at `path`, ensuring all column
    /// families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [
            CF_VENDORS,
            CF_CONTRACTS,
            CF_ROSTER,
            CF_TICKETS,
            CF_STEPS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| PaymentError::Internal(Box::new(e)))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::Internal(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| PaymentError::Internal(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| PaymentError::Internal(Box::new(e)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self
            .db
            .get_cf(cf, key)
            .map_err(|e| PaymentError::Internal(Box::new(e)))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db
            .put_cf(cf, key, Self::encode(value)?)
            .map_err(|e| PaymentError::Internal(Box::new(e)))
    }

    fn meta_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(CF_META)?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| PaymentError::Internal(Box::new(e)))
    }

    fn next_id(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let next = match self.meta_get(NEXT_ID_KEY)? {
            Some(bytes) => u64::from_be_bytes(
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| PaymentError::Conflict("corrupt id counter".to_string()))?,
            ),
            None => 1,
        };
        self.db
            .put_cf(cf, NEXT_ID_KEY, (next + 1).to_be_bytes())
            .map_err(|e| PaymentError::Internal(Box::new(e)))?;
        Ok(next)
    }

    /// All rows of `cf_name` whose key starts with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| PaymentError::Internal(Box::new(e)))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push(Self::decode(&value)?);
        }
        Ok(rows)
    }

    fn scan_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| PaymentError::Internal(Box::new(e)))?;
            rows.push(Self::decode(&value)?);
        }
        Ok(rows)
    }

    fn number_index_key(kind: &str, number: &str) -> Vec<u8> {
        format!("{kind}:{number}").into_bytes()
    }

    fn composite_key(parent: u64, sequence_no: u32) -> Vec<u8> {
        let mut key = parent.to_be_bytes().to_vec();
        key.extend_from_slice(&sequence_no.to_be_bytes());
        key
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| PaymentError::Internal(Box::new(e)))
    }
}

#[async_trait]
impl VendorStore for RocksDbStore {
    async fn allocate_id(&self) -> Result<VendorId> {
        let _guard = self.write_lock.lock().await;
        Ok(VendorId(self.next_id()?))
    }

    async fn insert(&self, vendor: Vendor) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let index_key = Self::number_index_key("vendor_code", &vendor.code);
        if self.meta_get(&index_key)?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "vendor code {} already exists",
                vendor.code
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_VENDORS)?, vendor.id.0.to_be_bytes(), Self::encode(&vendor)?);
        batch.put_cf(self.cf(CF_META)?, index_key, vendor.id.0.to_be_bytes());
        self.write(batch)
    }

    async fn get(&self, id: VendorId) -> Result<Option<Vendor>> {
        let vendor: Option<Vendor> = self.get_json(CF_VENDORS, &id.0.to_be_bytes())?;
        Ok(vendor.filter(|v| !v.is_deleted()))
    }

    async fn by_code(&self, code: &str) -> Result<Option<Vendor>> {
        match self.meta_get(&Self::number_index_key("vendor_code", code))? {
            Some(id_bytes) => {
                let vendor: Option<Vendor> = self.get_json(CF_VENDORS, &id_bytes)?;
                Ok(vendor.filter(|v| !v.is_deleted()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ContractStore for RocksDbStore {
    async fn allocate_id(&self) -> Result<ContractId> {
        let _guard = self.write_lock.lock().await;
        Ok(ContractId(self.next_id()?))
    }

    async fn insert(&self, contract: Contract) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let index_key = Self::number_index_key("contract_no", &contract.number);
        if self.meta_get(&index_key)?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "contract number {} already exists",
                contract.number
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_CONTRACTS)?,
            contract.id.0.to_be_bytes(),
            Self::encode(&contract)?,
        );
        batch.put_cf(self.cf(CF_META)?, index_key, contract.id.0.to_be_bytes());
        self.write(batch)
    }

    async fn update(&self, contract: Contract) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = contract.id.0.to_be_bytes();
        if self.get_json::<Contract>(CF_CONTRACTS, &key)?.is_none() {
            return Err(PaymentError::NotFound(format!("contract {}", contract.id.0)));
        }
        self.put_json(CF_CONTRACTS, &key, &contract)
    }

    async fn get(&self, id: ContractId) -> Result<Option<Contract>> {
        let contract: Option<Contract> = self.get_json(CF_CONTRACTS, &id.0.to_be_bytes())?;
        Ok(contract.filter(|c| !c.is_deleted()))
    }

    async fn by_number(&self, number: &str) -> Result<Option<Contract>> {
        match self.meta_get(&Self::number_index_key("contract_no", number))? {
            Some(id_bytes) => {
                let contract: Option<Contract> = self.get_json(CF_CONTRACTS, &id_bytes)?;
                Ok(contract.filter(|c| !c.is_deleted()))
            }
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<Contract>> {
        let mut contracts: Vec<Contract> = self
            .scan_all::<Contract>(CF_CONTRACTS)?
            .into_iter()
            .filter(|c| !c.is_deleted())
            .collect();
        contracts.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(contracts)
    }

    async fn soft_delete(&self, id: ContractId, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id.0.to_be_bytes();
        let mut contract: Contract = self
            .get_json(CF_CONTRACTS, &key)?
            .ok_or_else(|| PaymentError::NotFound(format!("contract {}", id.0)))?;
        contract.deleted_at = Some(now);
        self.put_json(CF_CONTRACTS, &key, &contract)
    }
}

#[async_trait]
impl RosterStore for RocksDbStore {
    async fn entries(&self, contract_id: ContractId) -> Result<Vec<RosterEntry>> {
        // Keys are (contract, sequence) big-endian, so iteration order is
        // already sequence order.
        self.scan_prefix(CF_ROSTER, &contract_id.0.to_be_bytes())
    }

    async fn replace(&self, contract_id: ContractId, entries: Vec<RosterEntry>) -> Result<()> {
        let mut users = std::collections::HashSet::new();
        let mut sequences = std::collections::HashSet::new();
        for entry in &entries {
            if entry.contract_id != contract_id
                || !users.insert(entry.user_id)
                || !sequences.insert(entry.sequence_no)
            {
                return Err(PaymentError::Conflict(format!(
                    "roster uniqueness violated on contract {}",
                    contract_id.0
                )));
            }
        }

        let _guard = self.write_lock.lock().await;
        let existing: Vec<RosterEntry> = self.scan_prefix(CF_ROSTER, &contract_id.0.to_be_bytes())?;

        let mut batch = WriteBatch::default();
        let cf = self.cf(CF_ROSTER)?;
        for old in existing {
            batch.delete_cf(cf, Self::composite_key(contract_id.0, old.sequence_no));
        }
        for entry in &entries {
            batch.put_cf(
                cf,
                Self::composite_key(contract_id.0, entry.sequence_no),
                Self::encode(entry)?,
            );
        }
        self.write(batch)
    }
}

#[async_trait]
impl TicketStore for RocksDbStore {
    async fn allocate_id(&self) -> Result<TicketId> {
        let _guard = self.write_lock.lock().await;
        Ok(TicketId(self.next_id()?))
    }

    async fn insert(&self, ticket: Ticket) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let index_key = Self::number_index_key("ticket_no", &ticket.number);
        if self.meta_get(&index_key)?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "ticket number {} already exists",
                ticket.number
            )));
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_TICKETS)?,
            ticket.id.0.to_be_bytes(),
            Self::encode(&ticket)?,
        );
        batch.put_cf(self.cf(CF_META)?, index_key, ticket.id.0.to_be_bytes());
        self.write(batch)
    }

    async fn update(&self, ticket: Ticket) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = ticket.id.0.to_be_bytes();
        if self.get_json::<Ticket>(CF_TICKETS, &key)?.is_none() {
            return Err(PaymentError::NotFound(format!("ticket {}", ticket.id.0)));
        }
        self.put_json(CF_TICKETS, &key, &ticket)
    }

    async fn get(&self, id: TicketId) -> Result<Option<Ticket>> {
        let ticket: Option<Ticket> = self.get_json(CF_TICKETS, &id.0.to_be_bytes())?;
        Ok(ticket.filter(|t| !t.is_deleted()))
    }

    async fn by_number(&self, number: &str) -> Result<Option<Ticket>> {
        match self.meta_get(&Self::number_index_key("ticket_no", number))? {
            Some(id_bytes) => {
                let ticket: Option<Ticket> = self.get_json(CF_TICKETS, &id_bytes)?;
                Ok(ticket.filter(|t| !t.is_deleted()))
            }
            None => Ok(None),
        }
    }

    async fn for_contract(&self, contract_id: ContractId) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .scan_all::<Ticket>(CF_TICKETS)?
            .into_iter()
            .filter(|t| t.contract_id == contract_id && !t.is_deleted())
            .collect();
        tickets.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(tickets)
    }

    async fn all(&self) -> Result<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .scan_all::<Ticket>(CF_TICKETS)?
            .into_iter()
            .filter(|t| !t.is_deleted())
            .collect();
        tickets.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(tickets)
    }

    async fn last_number_with_prefix(&self, prefix: &str) -> Result<Option<String>> {
        // The number index keeps soft-deleted tickets, so their numbers are
        // never reissued.
        let cf = self.cf(CF_META)?;
        let index_prefix = format!("ticket_no:{prefix}").into_bytes();
        let mut last = None;
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&index_prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(|e| PaymentError::Internal(Box::new(e)))?;
            if !key.starts_with(&index_prefix) {
                break;
            }
            last = String::from_utf8(key[b"ticket_no:".len()..].to_vec()).ok();
        }
        Ok(last)
    }

    async fn soft_delete(&self, id: TicketId, now: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = id.0.to_be_bytes();
        let mut ticket: Ticket = self
            .get_json(CF_TICKETS, &key)?
            .ok_or_else(|| PaymentError::NotFound(format!("ticket {}", id.0)))?;
        ticket.deleted_at = Some(now);
        self.put_json(CF_TICKETS, &key, &ticket)
    }
}

#[async_trait]
impl StepStore for RocksDbStore {
    async fn insert_snapshot(&self, steps: Vec<ApprovalStep>) -> Result<()> {
        let Some(ticket_id) = steps.first().map(|s| s.ticket_id) else {
            return Ok(());
        };
        let mut approvers = std::collections::HashSet::new();
        let mut sequences = std::collections::HashSet::new();
        for step in &steps {
            if step.ticket_id != ticket_id
                || !approvers.insert(step.approver)
                || !sequences.insert(step.sequence_no)
            {
                return Err(PaymentError::Conflict(format!(
                    "duplicate approval step on ticket {}",
                    ticket_id.0
                )));
            }
        }

        let _guard = self.write_lock.lock().await;
        let existing: Vec<ApprovalStep> =
            self.scan_prefix(CF_STEPS, &ticket_id.0.to_be_bytes())?;
        if !existing.is_empty() {
            return Err(PaymentError::Conflict(format!(
                "approval steps already exist for ticket {}",
                ticket_id.0
            )));
        }

        let mut batch = WriteBatch::default();
        let cf = self.cf(CF_STEPS)?;
        for step in &steps {
            batch.put_cf(
                cf,
                Self::composite_key(ticket_id.0, step.sequence_no),
                Self::encode(step)?,
            );
        }
        self.write(batch)
    }

    async fn for_ticket(&self, ticket_id: TicketId) -> Result<Vec<ApprovalStep>> {
        self.scan_prefix(CF_STEPS, &ticket_id.0.to_be_bytes())
    }

    async fn update(&self, step: ApprovalStep) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let existing: Vec<ApprovalStep> =
            self.scan_prefix(CF_STEPS, &step.ticket_id.0.to_be_bytes())?;
        let slot = existing
            .iter()
            .find(|s| s.approver == step.approver)
            .ok_or_else(|| {
                PaymentError::NotFound(format!(
                    "approval step for {} on ticket {}",
                    step.approver, step.ticket_id.0
                ))
            })?;
        if slot.sequence_no != step.sequence_no {
            return Err(PaymentError::Conflict(
                "approval step sequence is immutable".to_string(),
            ));
        }
        self.put_json(
            CF_STEPS,
            &Self::composite_key(step.ticket_id.0, step.sequence_no),
            &step,
        )
    }
}
