//! Per-invocation store of property values reported by the target device.
//!
//! The message handler records into a [`ResponseAccumulator`] while the
//! poller waits on it; completion is signalled once every expected property
//! code has been observed.

use crate::error::{Result, V2hError};
use crate::protocol::{DecodedMessage, Eoj};
use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Notify;
use tokio::time::{Duration, Instant};

/// Property values observed for one device, keyed by EPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: BTreeMap<u8, String>,
}

impl Snapshot {
    pub fn get(&self, epc: u8) -> Option<&str> {
        self.values.get(&epc).map(String::as_str)
    }

    pub fn contains(&self, epc: u8) -> bool {
        self.values.contains_key(&epc)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert(&mut self, epc: u8, value: String) {
        self.values.insert(epc, value);
    }
}

impl FromIterator<(u8, String)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (u8, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Collects the latest value per property code from one source object.
pub struct ResponseAccumulator {
    target: Eoj,
    expected: HashSet<u8>,
    snapshot: Mutex<Snapshot>,
    notify: Notify,
}

impl ResponseAccumulator {
    /// Create an empty accumulator for `target`, complete once all of
    /// `expected` have been seen.
    pub fn new(target: Eoj, expected: impl IntoIterator<Item = u8>) -> Self {
        Self {
            target,
            expected: expected.into_iter().collect(),
            snapshot: Mutex::new(Snapshot::default()),
            notify: Notify::new(),
        }
    }

    pub fn target(&self) -> Eoj {
        self.target
    }

    /// Record every property of `msg` if it was sent by the target.
    ///
    /// Returns the number of values stored. Later values overwrite earlier
    /// ones for the same code.
    pub fn record(&self, msg: &DecodedMessage) -> usize {
        if msg.seoj != self.target {
            return 0;
        }
        {
            let mut snapshot = self.snapshot.lock();
            for (epc, value) in &msg.details {
                debug!("{} 0x{:02X} = {}", self.target, epc, value);
                snapshot.insert(*epc, value.clone());
            }
        }
        self.notify.notify_waiters();
        msg.details.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }

    /// Expected codes not yet observed, in ascending order.
    pub fn missing(&self) -> Vec<u8> {
        let snapshot = self.snapshot.lock();
        let mut missing: Vec<u8> = self
            .expected
            .iter()
            .copied()
            .filter(|epc| !snapshot.contains(*epc))
            .collect();
        missing.sort_unstable();
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Wait until every expected code has been observed or `timeout` elapses.
    ///
    /// On timeout the error carries the partial snapshot and the missing codes.
    pub async fn wait_complete(&self, timeout: Duration) -> Result<Snapshot> {
        let start = Instant::now();
        loop {
            let notified = self.notify.notified();

            // Check before waiting so a record() between checks is not lost
            if self.is_complete() {
                return Ok(self.snapshot());
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() || tokio::time::timeout(remaining, notified).await.is_err() {
                break;
            }
        }

        let missing = self.missing();
        if missing.is_empty() {
            return Ok(self.snapshot());
        }
        Err(V2hError::Incomplete {
            missing,
            partial: self.snapshot(),
        })
    }
}
