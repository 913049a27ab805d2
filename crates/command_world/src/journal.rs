//! Command log: a fixed-capacity ring of recent top-level invocations kept
//! for crash and desync forensics. Pure diagnostics; influences nothing.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;

use command_world_proto::envelope::{Opcode, TileIndex};
use serde::{Deserialize, Serialize};

use crate::types::{Party, SimStamp};

pub const DEFAULT_LOG_CAPACITY: usize = 128;
pub const COMMAND_LOG_VERSION: u32 = 1;

// ============================================================================
// Entry Flags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogFlags(u8);

impl LogFlags {
    pub const NONE: LogFlags = LogFlags(0);
    pub const FAILED: LogFlags = LogFlags(1 << 0);
    pub const WORLD_GEN: LogFlags = LogFlags(1 << 1);
    pub const TEXT: LogFlags = LogFlags(1 << 2);
    pub const ESTIMATE: LogFlags = LogFlags(1 << 3);
    pub const SEND_ONLY: LogFlags = LogFlags(1 << 4);
    pub const LOCAL: LogFlags = LogFlags(1 << 5);
    pub const BINARY: LogFlags = LogFlags(1 << 6);

    pub const fn contains(self, other: LogFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: LogFlags) -> LogFlags {
        LogFlags(self.0 | other.0)
    }

    /// Seven-character letter-or-dash summary for the diagnostic dump.
    pub fn letters(self) -> String {
        const LETTERS: [(LogFlags, char); 7] = [
            (LogFlags::BINARY, 'b'),
            (LogFlags::LOCAL, 'l'),
            (LogFlags::SEND_ONLY, 's'),
            (LogFlags::ESTIMATE, 'e'),
            (LogFlags::TEXT, 't'),
            (LogFlags::WORLD_GEN, 'g'),
            (LogFlags::FAILED, 'f'),
        ];
        LETTERS
            .iter()
            .map(|(flag, letter)| if self.contains(*flag) { *letter } else { '-' })
            .collect()
    }
}

// ============================================================================
// Entries
// ============================================================================

/// One top-level invocation, recorded immediately after it completes.
/// Never mutated; evicted only by overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub tile: TileIndex,
    pub p1: u32,
    pub p2: u32,
    pub opcode: Opcode,
    pub stamp: SimStamp,
    pub acting_party: Party,
    pub local_party: Party,
    pub flags: LogFlags,
}

// ============================================================================
// Ring Buffer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CommandLog {
    capacity: usize,
    entries: VecDeque<CommandLogEntry>,
    total: u64,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl CommandLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Running count of everything ever appended, kept separately from the
    /// ring occupancy so "most recent N of total M" survives wraparound.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn append(&mut self, entry: CommandLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total = self.total.saturating_add(1);
    }

    /// Newest-first view of the most recent `limit` entries.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &CommandLogEntry> {
        self.entries.iter().rev().take(limit)
    }

    /// Clears the ring and the running total together. Used at new-game and
    /// world-reset boundaries.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.total = 0;
    }

    /// Fixed-width diagnostic rendering, newest first. `name_of` resolves
    /// opcodes to display names; `map_size_x` unpacks tile indices to x/y.
    pub fn dump<F>(&self, limit: usize, map_size_x: u32, name_of: F) -> String
    where
        F: Fn(Opcode) -> Option<&'static str>,
    {
        let shown = limit.min(self.entries.len());
        let mut out = format!("Command log: most recent {} of {} total\n", shown, self.total);
        let row = map_size_x.max(1);
        for (index, entry) in self.recent(limit).enumerate() {
            let x = entry.tile % row;
            let y = entry.tile / row;
            let stamp = entry.stamp;
            let name = name_of(entry.opcode).unwrap_or("<unbound>");
            out.push_str(&format!(
                "{index:>3} | {:04}-{:02}-{:02} {:04x} {:02} | {} | x:{x:>4} y:{y:>4} | p1:{:08x} p2:{:08x} | act:{:>5} loc:{:>5} | op:{:04x} | {name}\n",
                stamp.year,
                stamp.month,
                stamp.day,
                stamp.date_fract,
                stamp.tick_skip,
                entry.flags.letters(),
                entry.p1,
                entry.p2,
                entry.acting_party,
                entry.local_party,
                entry.opcode.0,
            ));
        }
        out
    }

    pub fn snapshot(&self) -> CommandLogSnapshot {
        CommandLogSnapshot {
            version: COMMAND_LOG_VERSION,
            capacity: self.capacity,
            total: self.total,
            entries: self.entries.iter().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: CommandLogSnapshot) -> Result<Self, LogPersistError> {
        snapshot.validate_version()?;
        let capacity = snapshot.capacity.max(1);
        if snapshot.entries.len() > capacity {
            return Err(LogPersistError::CapacityOverflow {
                entries: snapshot.entries.len(),
                capacity,
            });
        }
        Ok(Self {
            capacity,
            entries: VecDeque::from(snapshot.entries),
            total: snapshot.total,
        })
    }
}

// ============================================================================
// Persistence
// ============================================================================

fn default_log_version() -> u32 {
    COMMAND_LOG_VERSION
}

/// Serializable view of the ring, for attaching to crash reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandLogSnapshot {
    #[serde(default = "default_log_version")]
    pub version: u32,
    pub capacity: usize,
    pub total: u64,
    pub entries: Vec<CommandLogEntry>,
}

impl CommandLogSnapshot {
    pub fn to_json(&self) -> Result<String, LogPersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, LogPersistError> {
        let snapshot: Self = serde_json::from_str(input)?;
        snapshot.validate_version()?;
        Ok(snapshot)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), LogPersistError> {
        Ok(fs::write(path, self.to_json()?)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LogPersistError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub(crate) fn validate_version(&self) -> Result<(), LogPersistError> {
        if self.version == COMMAND_LOG_VERSION {
            Ok(())
        } else {
            Err(LogPersistError::UnsupportedVersion {
                version: self.version,
                expected: COMMAND_LOG_VERSION,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPersistError {
    UnsupportedVersion { version: u32, expected: u32 },
    CapacityOverflow { entries: usize, capacity: usize },
    Io(String),
    Serde(String),
}

impl std::fmt::Display for LogPersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogPersistError::UnsupportedVersion { version, expected } => {
                write!(f, "unsupported command log version {version}, expected {expected}")
            }
            LogPersistError::CapacityOverflow { entries, capacity } => {
                write!(f, "snapshot has {entries} entries for capacity {capacity}")
            }
            LogPersistError::Io(message) => write!(f, "io error: {message}"),
            LogPersistError::Serde(message) => write!(f, "serde error: {message}"),
        }
    }
}

impl std::error::Error for LogPersistError {}

impl From<io::Error> for LogPersistError {
    fn from(error: io::Error) -> Self {
        LogPersistError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for LogPersistError {
    fn from(error: serde_json::Error) -> Self {
        LogPersistError::Serde(error.to_string())
    }
}
