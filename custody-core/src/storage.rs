//! Storage layer
//!
//! # Tables
//!
//! - `meta` - Id sequences and platform flag (key: fixed name)
//! - `trusts` - Trust records (key: trust_id)
//! - `split_trusts` - Split-trust records (key: group_id)
//! - `milestones` - Milestone evidence (key: trust_id || index)
//! - `activity` - Per-grantor rate window (key: principal)
//! - `flags` - Flag annotations (key: trust_id)
//! - `audits` - Audit annotations (key: trust_id)
//! - `recoveries` - Recovery requests (key: trust_id)
//! - `proxies` - Trust proxies (key: trust_id)
//! - `approvals` - Recipient allow-list (key: principal)
//!
//! Values are bincode-encoded records. Writes only reach a backend through
//! [`KvBackend::commit`], which applies a whole write set or nothing.

use crate::{
    config::{Config, StorageBackend},
    error::{Error, Result},
    types::{Principal, TrustId},
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Persistent maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Counters and flags
    Meta,
    /// Trust records
    Trusts,
    /// Split-trust records
    SplitTrusts,
    /// Milestone evidence
    Milestones,
    /// Grantor rate windows
    Activity,
    /// Flag annotations
    Flags,
    /// Audit annotations
    Audits,
    /// Recovery requests
    Recoveries,
    /// Trust proxies
    Proxies,
    /// Recipient allow-list
    Approvals,
}

impl Table {
    /// Every table, in column-family order
    pub const ALL: [Table; 10] = [
        Table::Meta,
        Table::Trusts,
        Table::SplitTrusts,
        Table::Milestones,
        Table::Activity,
        Table::Flags,
        Table::Audits,
        Table::Recoveries,
        Table::Proxies,
        Table::Approvals,
    ];

    /// Column family name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Meta => "meta",
            Table::Trusts => "trusts",
            Table::SplitTrusts => "split_trusts",
            Table::Milestones => "milestones",
            Table::Activity => "activity",
            Table::Flags => "flags",
            Table::Audits => "audits",
            Table::Recoveries => "recoveries",
            Table::Proxies => "proxies",
            Table::Approvals => "approvals",
        }
    }
}

/// Staged writes of one call, keyed by (table, key)
pub type WriteSet = BTreeMap<(Table, Vec<u8>), Vec<u8>>;

/// Meta key: last issued trust id
pub const META_LAST_TRUST_ID: &[u8] = b"last_trust_id";
/// Meta key: last issued split group id
pub const META_LAST_GROUP_ID: &[u8] = b"last_group_id";
/// Meta key: platform frozen flag
pub const META_PLATFORM_FROZEN: &[u8] = b"platform_frozen";

/// Key for records addressed by trust or group id
pub fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Key for records addressed by principal
pub fn principal_key(principal: &Principal) -> Vec<u8> {
    principal.as_str().as_bytes().to_vec()
}

/// Key for milestone evidence: trust_id || index
pub fn milestone_key(trust_id: TrustId, index: u32) -> Vec<u8> {
    let mut key = trust_id.to_be_bytes().to_vec();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// Key-value backend
pub trait KvBackend: Send + Sync {
    /// Read one value
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply a write set atomically
    fn commit(&self, writes: WriteSet) -> Result<()>;
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<BTreeMap<(Table, Vec<u8>), Vec<u8>>>,
}

impl MemoryBackend {
    /// Create empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(&(table, key.to_vec())).cloned())
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        // Single lock scope: readers see all of the set or none of it
        let mut data = self.data.write();
        data.extend(writes);
        Ok(())
    }
}

/// RocksDB backend, one column family per table
#[cfg(feature = "rocksdb")]
pub struct RocksBackend {
    db: rocksdb::DB,
}

#[cfg(feature = "rocksdb")]
impl RocksBackend {
    /// Open or create database
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use rocksdb::{ColumnFamilyDescriptor, Options, DB};

        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = Table::ALL
            .iter()
            .map(|table| {
                let mut opts = Options::default();
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                ColumnFamilyDescriptor::new(table.name(), opts)
            })
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            "Opened RocksDB at {:?} with {} column families",
            path,
            Table::ALL.len()
        );

        Ok(Self { db })
    }
}

#[cfg(feature = "rocksdb")]
impl KvBackend for RocksBackend {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self
            .db
            .cf_handle(table.name())
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", table.name())))?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut batch = rocksdb::WriteBatch::default();
        for ((table, key), value) in &writes {
            let cf = self.db.cf_handle(table.name()).ok_or_else(|| {
                Error::Storage(format!("Column family {} not found", table.name()))
            })?;
            batch.put_cf(&cf, key, value);
        }

        // Atomic commit
        self.db.write(batch)?;
        Ok(())
    }
}

/// Typed access over a backend
pub struct Storage {
    backend: Box<dyn KvBackend>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open the backend named in the configuration
    pub fn open(config: &Config) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => Ok(Self::in_memory()),
            #[cfg(feature = "rocksdb")]
            StorageBackend::RocksDb => Ok(Self::with_backend(Box::new(RocksBackend::open(
                &config.storage.data_dir,
            )?))),
            #[cfg(not(feature = "rocksdb"))]
            StorageBackend::RocksDb => Err(Error::Config(
                "rocksdb backend requested but the `rocksdb` feature is disabled".to_string(),
            )),
        }
    }

    /// Fresh in-memory storage
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryBackend::new()))
    }

    /// Wrap an arbitrary backend
    pub fn with_backend(backend: Box<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Read and decode a record
    pub fn get<T: DeserializeOwned>(&self, table: Table, key: &[u8]) -> Result<Option<T>> {
        match self.backend.get(table, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Commit a write set
    pub fn commit(&self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let count = writes.len();
        self.backend.commit(writes)?;
        tracing::debug!(entries = count, "Write set committed");
        Ok(())
    }
}
