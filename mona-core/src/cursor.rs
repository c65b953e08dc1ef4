//! Cursor tracking for the external log.
//!
//! The cursor records the greatest `(block, log_index)` position whose entry
//! has already been handed to the hub. Everything at or below it is done;
//! everything above it is still pending. The tracker turns the cursor plus
//! the current chain head into the next block range to query.

use serde::Deserialize;
use std::fmt;

/// Position of a single entry in the external log.
///
/// Ordered lexicographically by `(block_number, log_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogPosition {
    pub block_number: i64,
    pub log_index: i64,
}

impl LogPosition {
    pub fn new(block_number: i64, log_index: i64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_number, self.log_index)
    }
}

/// How far into the external log the relay has consumed.
///
/// `-1` in either field means "before any block / before any index".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub last_block: i64,
    pub last_log_index: i64,
}

impl Cursor {
    /// Sentinel for "nothing in this block consumed yet".
    pub const BEFORE_ANY_INDEX: i64 = -1;

    /// Cursor positioned before block 0; the first range starts at genesis.
    pub const GENESIS: Cursor = Cursor {
        last_block: -1,
        last_log_index: Self::BEFORE_ANY_INDEX,
    };

    /// Cursor parked on `block`; the next incremental range starts at
    /// `block + 1`.
    pub fn at_block(block: i64) -> Self {
        Self {
            last_block: block,
            last_log_index: Self::BEFORE_ANY_INDEX,
        }
    }

    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.last_block, self.last_log_index)
    }

    /// `true` if the entry at `position` was already dispatched.
    pub fn covers(&self, position: LogPosition) -> bool {
        position <= self.position()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.last_block, self.last_log_index)
    }
}

/// Inclusive block range for a single log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from_block: i64,
    pub to_block: i64,
}

/// Where the cursor starts when the relay boots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// Skip history; start after whatever block is the head on the first
    /// successful poll.
    #[default]
    Head,
    /// Replay the whole log from block 0.
    Genesis,
    /// Replay from the given block (inclusive).
    Block(i64),
}

/// Range computation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    /// Query `(last_block, head]`. Cannot drop entries between polls.
    #[default]
    Incremental,
    /// Query only `[head, head]`. Entries in blocks produced between two
    /// polls are never seen.
    LatestOnly,
}

/// Owns the cursor and computes query ranges from it.
///
/// Only the poller drives a tracker. The cursor never moves backwards.
///
/// Besides the cursor the tracker remembers the highest block already
/// queried successfully. Blocks up to that mark are not asked for again,
/// so a quiet contract does not make the query range grow while the cursor
/// stands still.
#[derive(Debug, Clone)]
pub struct CursorTracker {
    cursor: Option<Cursor>,
    scanned_to: Option<i64>,
    max_block_range: Option<u64>,
    mode: RangeMode,
}

impl CursorTracker {
    pub fn new(policy: StartPolicy, mode: RangeMode) -> Self {
        let cursor = match policy {
            StartPolicy::Head => None,
            StartPolicy::Genesis => Some(Cursor::GENESIS),
            StartPolicy::Block(block) => Some(Cursor::at_block(block.max(0) - 1)),
        };
        Self {
            cursor,
            scanned_to: None,
            max_block_range: None,
            mode,
        }
    }

    /// Start from an explicit cursor.
    pub fn from_cursor(cursor: Cursor, mode: RangeMode) -> Self {
        Self {
            cursor: Some(cursor),
            scanned_to: None,
            max_block_range: None,
            mode,
        }
    }

    /// Limit every incremental range to at most `blocks` blocks. A backlog
    /// larger than that is worked through over several polls.
    pub fn with_max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = Some(blocks.max(1));
        self
    }

    /// Current cursor, or `None` while a head-start tracker has not seen a
    /// head yet.
    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn mode(&self) -> RangeMode {
        self.mode
    }

    /// Next range to query given the current `head`.
    ///
    /// Returns `None` when there is nothing new to ask for. A tracker started
    /// from [`StartPolicy::Head`] pins its cursor to the first head it sees
    /// and returns `None` for that call.
    pub fn next_range(&mut self, head: i64) -> Option<BlockRange> {
        let cursor = match self.cursor {
            Some(cursor) => cursor,
            None => {
                self.cursor = Some(Cursor::at_block(head));
                return None;
            }
        };

        let (from_block, to_block) = match self.mode {
            RangeMode::Incremental => {
                let done = self
                    .scanned_to
                    .map_or(cursor.last_block, |scanned| scanned.max(cursor.last_block));
                let from_block = done + 1;
                let to_block = match self.max_block_range {
                    Some(blocks) => {
                        let span = i64::try_from(blocks).unwrap_or(i64::MAX);
                        head.min(from_block.saturating_add(span - 1))
                    }
                    None => head,
                };
                (from_block, to_block)
            }
            RangeMode::LatestOnly => (head, head),
        };
        (from_block <= to_block).then_some(BlockRange {
            from_block,
            to_block,
        })
    }

    /// Highest block already queried, if any query succeeded yet.
    pub fn scanned_to(&self) -> Option<i64> {
        self.scanned_to
    }

    /// Record that `range` was queried successfully and every entry in it
    /// was handled. Does not move the cursor.
    pub fn mark_scanned(&mut self, range: BlockRange) {
        if self.scanned_to.is_none_or(|scanned| range.to_block > scanned) {
            self.scanned_to = Some(range.to_block);
        }
    }

    /// Record that every entry up to and including `position` was processed.
    ///
    /// Positions at or below the current cursor are ignored. Returns `true`
    /// if the cursor moved.
    pub fn advance(&mut self, position: LogPosition) -> bool {
        let next = Cursor {
            last_block: position.block_number,
            last_log_index: position.log_index,
        };
        match self.cursor {
            Some(current) if next <= current => false,
            _ => {
                self.cursor = Some(next);
                true
            }
        }
    }
}
