//! Engine Journal - Bounded Record of Engine Operations
//!
//! Every call on [`Engine`](super::Engine) appends one [`EngineEvent`].
//! Sequence numbers are global and never reused, so a consumer that polls
//! [`Journal::since`] can tell when it fell behind the retention bound.

use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

use crate::domain::{Denial, ProcessId, ResourceVector, SafeSequence};

/// One engine operation and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// System configured
    Configured {
        /// Number of processes
        processes: usize,
        /// Units per resource type
        totals: ResourceVector,
    },

    /// Single request granted
    Granted {
        /// Requesting process
        process: ProcessId,
        /// Units granted
        units: ResourceVector,
        /// Safe order of the resulting state
        sequence: SafeSequence,
    },

    /// Single request denied
    Denied {
        /// Requesting process
        process: ProcessId,
        /// Units requested
        units: ResourceVector,
        /// Reason
        denial: Denial,
    },

    /// Allocation matrix installed as one batch
    BatchGranted {
        /// Safe order of the resulting state
        sequence: SafeSequence,
    },

    /// Allocation batch denied
    BatchDenied {
        /// Reason
        denial: Denial,
    },

    /// Allocation matrix restored without a safety check
    Restored {
        /// `available` after the restore
        available: ResourceVector,
    },

    /// Process released its holdings
    Released {
        /// Releasing process
        process: ProcessId,
        /// Units returned
        units: ResourceVector,
    },

    /// Outstanding request recorded
    RequestRecorded {
        /// Blocked process
        process: ProcessId,
        /// Units it waits for
        units: ResourceVector,
    },

    /// Detection pass ran
    Detected {
        /// Deadlocked processes
        deadlocked: BTreeSet<ProcessId>,
    },

    /// Resolver terminated a process
    Terminated {
        /// Victim
        process: ProcessId,
        /// Units it held
        released: ResourceVector,
    },
}

/// Journal entry with its global sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    /// Position in the full history, starting at 0
    pub seq: u64,
    /// What happened
    #[serde(flatten)]
    pub event: EngineEvent,
}

/// Ring of the most recent engine events
#[derive(Debug, Clone, Serialize)]
pub struct Journal {
    capacity: usize,
    next_seq: u64,
    dropped: u64,
    entries: VecDeque<JournalEntry>,
}

impl Journal {
    /// Empty journal retaining at most `capacity` entries
    ///
    /// A capacity of zero records nothing but still counts sequence numbers.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: 0,
            dropped: 0,
            entries: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append an event, dropping the oldest entry when full
    pub fn record(&mut self, event: EngineEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.capacity == 0 {
            self.dropped += 1;
            return seq;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(JournalEntry { seq, event });
        seq
    }

    /// Retention bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries currently retained
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events evicted or never retained
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Sequence number the next event will get
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Retained entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> + '_ {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.back()
    }

    /// Retained entries with `seq >= from`
    pub fn since(&self, from: u64) -> impl Iterator<Item = &JournalEntry> + '_ {
        self.entries.iter().filter(move |e| e.seq >= from)
    }

    /// Forget every retained entry; sequence numbers keep counting
    pub fn clear(&mut self) {
        self.dropped += self.entries.len() as u64;
        self.entries.clear();
    }
}
