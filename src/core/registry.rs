//! # Module registry: records, capabilities and derived orderings.
//!
//! The registry maps a module name to its [`ModuleRecord`], the shared module
//! handle, the capabilities resolved at registration and a per-module
//! operation lock.
//!
//! ## Orderings
//! ```text
//! register(name, module, priority)
//!   ├─► insert / overwrite entry (fresh registration sequence)
//!   ├─► startup_order  = names sorted by (priority, sequence)
//!   └─► shutdown_order = startup_order reversed
//! ```
//!
//! ## Rules
//! - Names are unique; re-registration overwrites (last write wins).
//! - `shutdown_order` is always recomputed from `startup_order`, never edited on its own.
//! - Updates coming from an operation started against an older registration
//!   are ignored (generation check on [`ModuleHandle::seq`]).
//! - The registry is synchronous; callers never hold it across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::status::{FailureRecord, ModuleStatus};
use crate::modules::{Capabilities, ModuleRef};
use crate::policies::RecoveryWindow;

/// Bookkeeping for one registered module.
#[derive(Debug)]
pub(crate) struct ModuleRecord {
    pub status: ModuleStatus,
    pub priority: i32,
    pub recovery: RecoveryWindow,
    pub last_failure: Option<FailureRecord>,
}

struct Entry {
    module: ModuleRef,
    caps: Capabilities,
    record: ModuleRecord,
    seq: u64,
    op_lock: Arc<Mutex<()>>,
}

/// Everything an operation needs about a module, detached from the registry lock.
#[derive(Clone)]
pub(crate) struct ModuleHandle {
    pub name: String,
    pub module: ModuleRef,
    pub caps: Capabilities,
    pub seq: u64,
    pub op_lock: Arc<Mutex<()>>,
}

/// Name → module map plus startup/shutdown orders.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<String, Entry>,
    next_seq: u64,
    startup_order: Vec<String>,
    shutdown_order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a module. Returns `true` when a record was replaced.
    ///
    /// A replacement keeps the operation lock of the previous registration, so
    /// an operation still running against it finishes before the next one starts.
    pub fn register(&mut self, name: &str, module: ModuleRef, priority: i32) -> bool {
        let caps = module.capabilities();
        self.next_seq += 1;
        let op_lock = self
            .entries
            .get(name)
            .map(|e| Arc::clone(&e.op_lock))
            .unwrap_or_default();
        let entry = Entry {
            module,
            caps,
            record: ModuleRecord {
                status: ModuleStatus::Registered,
                priority,
                recovery: RecoveryWindow::new(),
                last_failure: None,
            },
            seq: self.next_seq,
            op_lock,
        };
        let replaced = self.entries.insert(name.to_string(), entry).is_some();
        self.reorder();
        replaced
    }

    /// Recomputes both orderings from scratch.
    fn reorder(&mut self) {
        let mut keyed: Vec<(i32, u64, &String)> = self
            .entries
            .iter()
            .map(|(name, e)| (e.record.priority, e.seq, name))
            .collect();
        keyed.sort_unstable_by_key(|(priority, seq, _)| (*priority, *seq));

        self.startup_order = keyed.into_iter().map(|(_, _, n)| n.clone()).collect();
        self.shutdown_order = self.startup_order.iter().rev().cloned().collect();
    }

    pub fn handle(&self, name: &str) -> Option<ModuleHandle> {
        self.entries.get(name).map(|e| ModuleHandle {
            name: name.to_string(),
            module: Arc::clone(&e.module),
            caps: e.caps,
            seq: e.seq,
            op_lock: Arc::clone(&e.op_lock),
        })
    }

    pub fn record(&self, name: &str) -> Option<&ModuleRecord> {
        self.entries.get(name).map(|e| &e.record)
    }

    /// Mutable record access for the registration `handle` was taken from.
    ///
    /// Returns `None` if the module has been re-registered since.
    pub fn record_mut(&mut self, handle: &ModuleHandle) -> Option<&mut ModuleRecord> {
        self.entries
            .get_mut(&handle.name)
            .filter(|e| e.seq == handle.seq)
            .map(|e| &mut e.record)
    }

    pub fn startup_order(&self) -> &[String] {
        &self.startup_order
    }

    pub fn shutdown_order(&self) -> &[String] {
        &self.shutdown_order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Records in startup order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &ModuleRecord)> + '_ {
        self.startup_order
            .iter()
            .filter_map(|n| self.entries.get(n).map(|e| (n.as_str(), &e.record)))
    }
}
