//! # Ledger Events
//!
//! One event per committed state change, for external auditing. Events are
//! appended to an in-ledger log with a sequence number and, once the
//! surrounding commit scope succeeds, echoed as structured `tracing`
//! events. A rolled-back operation leaves no trace in either place.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crypto::keys::Address;

/// A state change worth telling the outside world about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Minted {
        to: Address,
        amount: u128,
    },
    Burned {
        from: Address,
        amount: u128,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: u128,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: u128,
    },
    Excluded {
        account: Address,
    },
    BackupRegistered {
        account: Address,
        backup: Address,
        previous: Option<Address>,
    },
    RelayAuthorized {
        relay: Address,
    },
    EmergencyTransferCompleted {
        from: Address,
        to: Address,
        amount: u128,
        nonce: u64,
    },
}

impl LedgerEvent {
    /// Short, stable name for logs and filtering.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::Minted { .. } => "minted",
            LedgerEvent::Burned { .. } => "burned",
            LedgerEvent::Transfer { .. } => "transfer",
            LedgerEvent::Approval { .. } => "approval",
            LedgerEvent::Excluded { .. } => "excluded",
            LedgerEvent::BackupRegistered { .. } => "backup_registered",
            LedgerEvent::RelayAuthorized { .. } => "relay_authorized",
            LedgerEvent::EmergencyTransferCompleted { .. } => "emergency_transfer_completed",
        }
    }
}

/// An event with its position in the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: LedgerEvent,
}

impl EventRecord {
    /// Emits this record as a structured tracing event.
    pub fn trace(&self) {
        let seq = self.sequence;
        match &self.event {
            LedgerEvent::Minted { to, amount } => {
                info!(seq, to = %to, amount = %amount, "minted");
            }
            LedgerEvent::Burned { from, amount } => {
                info!(seq, from = %from, amount = %amount, "burned");
            }
            LedgerEvent::Transfer { from, to, amount } => {
                info!(seq, from = %from, to = %to, amount = %amount, "transfer");
            }
            LedgerEvent::Approval {
                owner,
                spender,
                amount,
            } => {
                info!(seq, owner = %owner, spender = %spender, amount = %amount, "approval");
            }
            LedgerEvent::Excluded { account } => {
                info!(seq, account = %account, "account excluded");
            }
            LedgerEvent::BackupRegistered {
                account,
                backup,
                previous,
            } => {
                info!(seq, account = %account, backup = %backup, previous = ?previous, "backup registered");
            }
            LedgerEvent::RelayAuthorized { relay } => {
                info!(seq, relay = %relay, "relay authorized");
            }
            LedgerEvent::EmergencyTransferCompleted {
                from,
                to,
                amount,
                nonce,
            } => {
                info!(seq, from = %from, to = %to, amount = %amount, nonce, "emergency transfer completed");
            }
        }
    }
}

/// Append-only event log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
    next_sequence: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: LedgerEvent) -> u64 {
        let sequence = self.next_sequence;
        self.records.push(EventRecord { sequence, event });
        self.next_sequence += 1;
        sequence
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record after the first `len`, rewinding the sequence
    /// counter with them.
    pub fn truncate(&mut self, len: usize) {
        if let Some(first_dropped) = self.records.get(len) {
            self.next_sequence = first_dropped.sequence;
            self.records.truncate(len);
        }
    }

    /// Records appended after the first `offset` entries.
    pub fn since(&self, offset: usize) -> &[EventRecord] {
        self.records.get(offset..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let mut log = EventLog::new();
        let a = Address::from_bytes([1; 20]);
        assert_eq!(log.push(LedgerEvent::Excluded { account: a }), 0);
        assert_eq!(log.push(LedgerEvent::RelayAuthorized { relay: a }), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.since(1)[0].sequence, 1);
        assert!(log.since(5).is_empty());
    }

    #[test]
    fn truncate_rewinds_sequence() {
        let mut log = EventLog::new();
        let a = Address::from_bytes([1; 20]);
        for _ in 0..5 {
            log.push(LedgerEvent::Excluded { account: a });
        }
        log.truncate(2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.push(LedgerEvent::Excluded { account: a }), 2);

        log.truncate(10);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn events_serialize_externally_tagged() {
        let event = LedgerEvent::Minted {
            to: Address::from_bytes([0xAA; 20]),
            amount: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["minted"]["to"], format!("0x{}", "aa".repeat(20)));
        assert_eq!(json["minted"]["amount"], 10);
        assert_eq!(event.kind(), "minted");
    }
}
