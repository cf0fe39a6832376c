//! Execution host primitives
//!
//! The ledger consumes three things from its host: a monotonic time counter,
//! an atomic value-transfer primitive, and (per call) the caller identity,
//! which is passed explicitly into every operation.
//!
//! [`MemoryHost`] keeps balances in process and is what the test suites run
//! against.

use crate::types::{Amount, BlockHeight, Principal};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Reasons the host declines a transfer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Sender balance too low
    #[error("insufficient funds: {account} holds {available}, needs {required}")]
    InsufficientFunds {
        /// Debited account
        account: Principal,
        /// Balance at call time
        available: Amount,
        /// Requested amount
        required: Amount,
    },

    /// Host refused the transfer
    #[error("declined: {0}")]
    Declined(String),
}

/// Host services consumed by the ledger
pub trait Host {
    /// Current time point. Never decreases.
    fn block_height(&self) -> BlockHeight;

    /// Move `amount` from `from` to `to`; either fully happens or not at all
    fn transfer(
        &mut self,
        amount: Amount,
        from: &Principal,
        to: &Principal,
    ) -> std::result::Result<(), TransferError>;
}

/// In-process host with settable clock and failure injection
#[derive(Debug, Default)]
pub struct MemoryHost {
    height: BlockHeight,
    balances: HashMap<Principal, Amount>,
    frozen: HashSet<Principal>,
    transfers: u64,
    transfer_limit: Option<u64>,
}

impl MemoryHost {
    /// Create host at time point 0 with no balances
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air (genesis allocation)
    pub fn mint(&mut self, account: &Principal, amount: Amount) {
        *self.balances.entry(account.clone()).or_insert(0) += amount;
    }

    /// Current balance of an account
    pub fn balance(&self, account: &Principal) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Advance the clock
    pub fn advance(&mut self, blocks: BlockHeight) {
        self.height += blocks;
    }

    /// Jump the clock forward to `height`; earlier heights are ignored
    pub fn set_height(&mut self, height: BlockHeight) {
        self.height = self.height.max(height);
    }

    /// Decline every transfer touching `account` until thawed
    pub fn freeze_account(&mut self, account: &Principal) {
        self.frozen.insert(account.clone());
    }

    /// Lift a freeze
    pub fn thaw_account(&mut self, account: &Principal) {
        self.frozen.remove(account);
    }

    /// Decline every transfer once `count` transfers have executed in total
    pub fn fail_after(&mut self, count: u64) {
        self.transfer_limit = Some(count);
    }

    /// Number of transfers executed so far
    pub fn transfer_count(&self) -> u64 {
        self.transfers
    }
}

impl Host for MemoryHost {
    fn block_height(&self) -> BlockHeight {
        self.height
    }

    fn transfer(
        &mut self,
        amount: Amount,
        from: &Principal,
        to: &Principal,
    ) -> std::result::Result<(), TransferError> {
        if amount == 0 {
            return Err(TransferError::Declined("zero amount".to_string()));
        }
        if from == to {
            return Err(TransferError::Declined("sender is recipient".to_string()));
        }
        if self.frozen.contains(from) || self.frozen.contains(to) {
            return Err(TransferError::Declined("account frozen".to_string()));
        }
        if matches!(self.transfer_limit, Some(limit) if self.transfers >= limit) {
            return Err(TransferError::Declined("host unavailable".to_string()));
        }

        let available = self.balance(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.clone(),
                available,
                required: amount,
            });
        }

        self.balances.insert(from.clone(), available - amount);
        *self.balances.entry(to.clone()).or_insert(0) += amount;
        self.transfers += 1;
        Ok(())
    }
}
