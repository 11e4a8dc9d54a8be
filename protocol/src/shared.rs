//! # Shared Ledger Handle
//!
//! The ledger is a plain single-owner value. Hosts that serve several
//! submitters at once wrap it in a [`SharedLedger`]: any number of readers,
//! one writer at a time, so operations are applied strictly one after
//! another and never interleave.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ledger::{Ledger, LedgerError};

/// Cloneable, thread-safe handle to a [`Ledger`].
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Runs a read-only closure under a shared lock.
    pub fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> T {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Runs a mutation under the exclusive lock.
    ///
    /// The closure runs as one commit scope: if it fails, the ledger is left
    /// as it was, even when the closure made several calls.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut guard = self.inner.write();
        guard.atomically(f)
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
