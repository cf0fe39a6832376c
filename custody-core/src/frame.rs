//! Per-call execution context
//!
//! A [`Frame`] is created for every public operation. Reads see the frame's
//! own staged writes layered over committed storage; writes and value
//! transfers are only staged. The ledger settles a frame after the operation
//! returns `Ok`, and drops it untouched otherwise, so no partial effect of a
//! failed call is ever observable.

use crate::{
    config::Config,
    error::{Error, Result},
    storage::{self, Storage, Table, WriteSet},
    types::{Amount, BlockHeight, Principal, Trust, TrustId},
};
use serde::{de::DeserializeOwned, Serialize};

/// Transfer queued for settlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    /// Value to move
    pub amount: Amount,
    /// Debited account
    pub from: Principal,
    /// Credited account
    pub to: Principal,
}

/// Staging context of one call
pub struct Frame<'a> {
    storage: &'a Storage,
    config: &'a Config,
    caller: Principal,
    now: BlockHeight,
    writes: WriteSet,
    transfers: Vec<PendingTransfer>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        storage: &'a Storage,
        config: &'a Config,
        caller: Principal,
        now: BlockHeight,
    ) -> Self {
        Self {
            storage,
            config,
            caller,
            now,
            writes: WriteSet::new(),
            transfers: Vec::new(),
        }
    }

    /// Caller of this call
    pub fn caller(&self) -> &Principal {
        &self.caller
    }

    /// Time point of this call
    pub fn now(&self) -> BlockHeight {
        self.now
    }

    /// Ledger configuration
    pub fn config(&self) -> &'a Config {
        self.config
    }

    /// Custody account
    pub fn custody(&self) -> &'a Principal {
        &self.config.custody_account
    }

    /// Whether the caller is the configured admin
    pub fn caller_is_admin(&self) -> bool {
        self.caller == self.config.admin
    }

    /// Fail with `Unauthorized` unless the caller is admin
    pub fn require_admin(&self, action: &'static str) -> Result<()> {
        if self.caller_is_admin() {
            Ok(())
        } else {
            Err(Error::unauthorized(&self.caller, action))
        }
    }

    /// Read a record, preferring this call's staged value
    pub fn read<T: DeserializeOwned>(&self, table: Table, key: &[u8]) -> Result<Option<T>> {
        match self.writes.get(&(table, key.to_vec())) {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => self.storage.get(table, key),
        }
    }

    /// Stage a record write
    pub fn write<T: Serialize>(&mut self, table: Table, key: Vec<u8>, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.writes.insert((table, key), bytes);
        Ok(())
    }

    /// Queue a value transfer. Zero amounts are dropped.
    pub fn queue_transfer(&mut self, amount: Amount, from: &Principal, to: &Principal) {
        if amount == 0 {
            return;
        }
        self.transfers.push(PendingTransfer {
            amount,
            from: from.clone(),
            to: to.clone(),
        });
    }

    /// Load a trust, re-reading current state
    pub fn trust(&self, id: TrustId) -> Result<Trust> {
        self.read(Table::Trusts, &storage::id_key(id))?
            .ok_or_else(|| Error::NotFound(format!("trust {}", id)))
    }

    /// Stage a trust write
    pub fn put_trust(&mut self, trust: &Trust) -> Result<()> {
        self.write(Table::Trusts, storage::id_key(trust.id), trust)
    }

    /// Advance a meta sequence and return the new value
    pub fn next_sequence(&mut self, key: &[u8]) -> Result<u64> {
        let last: u64 = self.read(Table::Meta, key)?.unwrap_or(0);
        let next = last
            .checked_add(1)
            .ok_or_else(|| Error::InvariantViolation("id sequence exhausted".to_string()))?;
        self.write(Table::Meta, key.to_vec(), &next)?;
        Ok(next)
    }

    /// Queued transfers so far
    pub fn pending_transfers(&self) -> &[PendingTransfer] {
        &self.transfers
    }

    pub(crate) fn into_parts(self) -> (WriteSet, Vec<PendingTransfer>) {
        (self.writes, self.transfers)
    }
}
