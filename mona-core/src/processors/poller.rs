//! LedgerPoller processor.
//!
//! The LedgerPoller is responsible for:
//! - Querying the external log on a fixed interval with the range computed
//!   by its `CursorTracker`
//! - Dropping entries at or below the cursor (overlapping ranges may return
//!   them again)
//! - Decoding the rest in `(block, log_index)` order, updating the
//!   `EntityStateCache`, and handing the resulting `Notification` to the
//!   `BroadcastHub`
//! - Advancing the cursor once the whole batch has been handled, and
//!   remembering the queried range so quiet blocks are not asked for twice
//!
//! A failed query leaves the cursor where it was and is retried on the next
//! tick. An entry that cannot be decoded is skipped but still moves the
//! cursor past it.

use super::hub::BroadcastHub;
use crate::cursor::{Cursor, CursorTracker, RangeMode};
use crate::events::{DecodeError, EventSchema, RelayEvent};
use crate::ledger::{EventLog, LedgerError, LogEntry};
use crate::state::EntityStateCache;
use kanau::processor::Processor;
use mona_sdk::objects::Notification;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Counters for a single poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Entries handed to the hub
    pub dispatched: u32,
    /// Entries discarded because the cursor already covered them
    pub duplicates: u32,
    /// Entries skipped because they could not be decoded
    pub undecodable: u32,
}

/// Polls an [`EventLog`] and feeds decoded notifications to a
/// [`BroadcastHub`].
pub struct LedgerPoller<L: EventLog> {
    log: L,
    tracker: CursorTracker,
    schema: EventSchema,
    cache: Option<Arc<EntityStateCache>>,
    hub: Arc<BroadcastHub>,
    interval: Duration,
}

impl<L: EventLog> LedgerPoller<L> {
    /// Create a new LedgerPoller.
    ///
    /// # Arguments
    ///
    /// * `log` - The external log to query
    /// * `tracker` - Cursor tracker, already positioned by the start policy
    /// * `schema` - Which contract event to decode
    /// * `hub` - Destination for decoded notifications
    /// * `interval` - Time between two poll cycles
    pub fn new(
        log: L,
        tracker: CursorTracker,
        schema: EventSchema,
        hub: Arc<BroadcastHub>,
        interval: Duration,
    ) -> Self {
        Self {
            log,
            tracker,
            schema,
            cache: None,
            hub,
            interval,
        }
    }

    /// Attach the entity cache updated by `EntityStateChanged` events.
    pub fn with_cache(mut self, cache: Arc<EntityStateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.tracker.cursor()
    }

    /// Run a single poll cycle.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, LedgerError> {
        let head = self.log.latest_block().await?;
        let Some(range) = self.tracker.next_range(head) else {
            debug!(head, cursor = ?self.tracker.cursor(), "No new blocks");
            return Ok(PollOutcome::default());
        };

        let mut entries = self.log.fetch_logs(range).await?;
        entries.sort_by_key(LogEntry::position);

        let mut outcome = PollOutcome::default();
        let mut high_water = self.tracker.cursor().map(|cursor| cursor.position());

        for entry in entries {
            let position = entry.position();
            if high_water.is_some_and(|seen| position <= seen) {
                debug!(%position, "Discarding already dispatched entry");
                outcome.duplicates += 1;
                continue;
            }
            high_water = Some(position);

            match self.dispatch(&entry).await {
                Ok(()) => outcome.dispatched += 1,
                Err(e) => {
                    warn!(%position, error = %e, "Skipping undecodable entry");
                    outcome.undecodable += 1;
                }
            }
        }

        if let Some(position) = high_water {
            self.tracker.advance(position);
        }
        self.tracker.mark_scanned(range);

        debug!(
            from_block = range.from_block,
            to_block = range.to_block,
            dispatched = outcome.dispatched,
            duplicates = outcome.duplicates,
            undecodable = outcome.undecodable,
            cursor = ?self.tracker.cursor(),
            "Poll completed"
        );

        Ok(outcome)
    }

    /// Run the LedgerPoller until shutdown is signaled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            event = self.schema.signature(),
            interval = ?self.interval,
            cursor = ?self.tracker.cursor(),
            "LedgerPoller started"
        );
        if self.tracker.mode() == RangeMode::LatestOnly {
            warn!("Polling only the latest block; events in skipped blocks will be missed");
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                // Check for shutdown
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("LedgerPoller received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(
                            error = %e,
                            cursor = ?self.tracker.cursor(),
                            "Poll failed, retrying on next tick"
                        );
                    }
                }
            }
        }

        info!(cursor = ?self.tracker.cursor(), "LedgerPoller shutdown complete");
    }

    async fn dispatch(&self, entry: &LogEntry) -> Result<(), DecodeError> {
        let event = self.schema.decode(&entry.payload)?;
        let notification = self.to_notification(&event)?;
        let Ok(report) = self.hub.process(notification).await;

        info!(
            position = %entry.position(),
            ?event,
            delivered = report.delivered,
            dropped = report.dropped,
            "Relayed event"
        );
        Ok(())
    }

    fn to_notification(&self, event: &RelayEvent) -> Result<Notification, DecodeError> {
        match event {
            RelayEvent::VisibilityChanged { visible } => Ok(Notification::Visibility {
                visible: *visible,
            }),
            RelayEvent::EntityStateChanged { entity, state } => {
                let Some(cache) = &self.cache else {
                    return Err(DecodeError::UnknownEntity(entity.clone()));
                };
                cache.set(entity, *state)?;
                Ok(Notification::Entities(cache.snapshot()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cursor::{BlockRange, StartPolicy};
    use crate::events::decoder::tests::{entity_log, visibility_log};
    use crate::ledger::RawLog;
    use crate::processors::hub::tests::RecordingSubscriber;
    use alloy_primitives::Bytes;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// In-memory stand-in for the external log.
    #[derive(Default)]
    struct SimulatedLog {
        state: Mutex<SimulatedState>,
    }

    #[derive(Default)]
    struct SimulatedState {
        head: i64,
        entries: Vec<LogEntry>,
        /// Returned once, on top of the in-range entries, on the next fetch.
        replay: Vec<LogEntry>,
        failures: u32,
        queries: Vec<BlockRange>,
    }

    impl SimulatedLog {
        fn append(&self, block_number: i64, log_index: i64, payload: RawLog) {
            let mut state = self.state.lock();
            state.entries.push(LogEntry {
                block_number,
                log_index,
                payload,
            });
            state.head = state.head.max(block_number);
        }

        fn set_head(&self, head: i64) {
            self.state.lock().head = head;
        }

        fn replay_once(&self, entry: LogEntry) {
            self.state.lock().replay.push(entry);
        }

        fn fail_next(&self, count: u32) {
            self.state.lock().failures = count;
        }

        fn queries(&self) -> Vec<BlockRange> {
            self.state.lock().queries.clone()
        }
    }

    #[async_trait]
    impl EventLog for SimulatedLog {
        async fn latest_block(&self) -> Result<i64, LedgerError> {
            Ok(self.state.lock().head)
        }

        async fn fetch_logs(&self, range: BlockRange) -> Result<Vec<LogEntry>, LedgerError> {
            let mut state = self.state.lock();
            if state.failures > 0 {
                state.failures -= 1;
                return Err(LedgerError::RateLimited);
            }
            state.queries.push(range);
            let mut found: Vec<LogEntry> = state
                .entries
                .iter()
                .filter(|e| e.block_number >= range.from_block && e.block_number <= range.to_block)
                .cloned()
                .collect();
            found.append(&mut state.replay);
            // Upstream order is not guaranteed.
            found.reverse();
            Ok(found)
        }
    }

    fn poller_at(
        log: Arc<SimulatedLog>,
        cursor: Cursor,
    ) -> (LedgerPoller<Arc<SimulatedLog>>, Arc<RecordingSubscriber>) {
        let hub = Arc::new(BroadcastHub::default());
        let subscriber = Arc::new(RecordingSubscriber::default());
        hub.register(subscriber.clone());
        let poller = LedgerPoller::new(
            log,
            CursorTracker::from_cursor(cursor, RangeMode::Incremental),
            EventSchema::Visibility,
            hub,
            Duration::from_secs(5),
        );
        (poller, subscriber)
    }

    fn frame(visible: bool) -> String {
        format!(r#"{{"visible":{visible}}}"#)
    }

    #[tokio::test]
    async fn test_dispatch_order_and_overlap_dedup() {
        let log = Arc::new(SimulatedLog::default());
        log.append(101, 0, visibility_log(true));
        log.append(101, 1, visibility_log(false));
        log.append(102, 0, visibility_log(true));
        let (mut poller, subscriber) = poller_at(log.clone(), Cursor::at_block(100));

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.dispatched, 3);
        assert_eq!(subscriber.frames(), vec![frame(true), frame(false), frame(true)]);
        assert_eq!(
            poller.cursor(),
            Some(Cursor {
                last_block: 102,
                last_log_index: 0
            })
        );

        // The upstream re-returns (101, 1) next to a genuinely new entry.
        log.replay_once(LogEntry {
            block_number: 101,
            log_index: 1,
            payload: visibility_log(false),
        });
        log.append(103, 0, visibility_log(false));

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(subscriber.frames().len(), 4);
        assert_eq!(subscriber.frames()[3], frame(false));
        assert_eq!(
            poller.cursor(),
            Some(Cursor {
                last_block: 103,
                last_log_index: 0
            })
        );
        assert_eq!(
            log.queries(),
            vec![
                BlockRange {
                    from_block: 101,
                    to_block: 102
                },
                BlockRange {
                    from_block: 103,
                    to_block: 103
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_entries_spanning_cycles_are_dispatched_once_in_order() {
        let log = Arc::new(SimulatedLog::default());
        log.set_head(10);
        let (mut poller, subscriber) = poller_at(log.clone(), Cursor::at_block(10));

        let mut expected = Vec::new();
        let mut cursor_history = Vec::new();
        for cycle in 0..6i64 {
            // Some cycles produce nothing, some produce several blocks.
            for offset in 0..(cycle % 3) {
                let block = 11 + cycle * 2 + offset;
                for index in 0..2 {
                    let visible = (block + index) % 2 == 0;
                    log.append(block, index, visibility_log(visible));
                    expected.push(frame(visible));
                }
            }
            poller.poll_once().await.unwrap();
            cursor_history.push(poller.cursor().unwrap());
            // Overlap every other cycle by replaying what is already consumed.
            if cycle % 2 == 1 {
                let cursor = poller.cursor().unwrap();
                log.replay_once(LogEntry {
                    block_number: cursor.last_block,
                    log_index: cursor.last_log_index,
                    payload: visibility_log(true),
                });
            }
        }
        poller.poll_once().await.unwrap();

        assert_eq!(subscriber.frames(), expected);
        assert!(cursor_history.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_failed_query_keeps_cursor() {
        let log = Arc::new(SimulatedLog::default());
        log.append(101, 0, visibility_log(true));
        let (mut poller, subscriber) = poller_at(log.clone(), Cursor::at_block(100));

        log.fail_next(2);
        assert!(matches!(poller.poll_once().await, Err(LedgerError::RateLimited)));
        assert!(poller.poll_once().await.is_err());
        assert_eq!(poller.cursor(), Some(Cursor::at_block(100)));
        assert!(subscriber.frames().is_empty());

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(
            poller.cursor(),
            Some(Cursor {
                last_block: 101,
                last_log_index: 0
            })
        );
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_cursor() {
        let log = Arc::new(SimulatedLog::default());
        log.set_head(120);
        let (mut poller, _subscriber) = poller_at(log.clone(), Cursor::at_block(100));

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome, PollOutcome::default());
        assert_eq!(poller.cursor(), Some(Cursor::at_block(100)));
    }

    #[tokio::test]
    async fn test_quiet_period_queries_only_new_blocks() {
        let log = Arc::new(SimulatedLog::default());
        let (mut poller, subscriber) = poller_at(log.clone(), Cursor::at_block(100));

        for cycle in 1..=30i64 {
            log.set_head(100 + cycle * 1000);
            let outcome = poller.poll_once().await.unwrap();
            assert_eq!(outcome, PollOutcome::default());
        }
        assert_eq!(poller.cursor(), Some(Cursor::at_block(100)));

        let queries = log.queries();
        assert_eq!(queries.len(), 30);
        assert!(queries.iter().all(|r| r.to_block - r.from_block == 999));
        assert!(queries.windows(2).all(|w| w[1].from_block == w[0].to_block + 1));

        // Activity after the quiet period is still picked up.
        log.append(30_101, 0, visibility_log(true));
        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(subscriber.frames(), vec![frame(true)]);
        assert_eq!(
            log.queries().last(),
            Some(&BlockRange {
                from_block: 30_101,
                to_block: 30_101
            })
        );
        assert_eq!(
            poller.cursor(),
            Some(Cursor {
                last_block: 30_101,
                last_log_index: 0
            })
        );
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_skipped_but_consumed() {
        let log = Arc::new(SimulatedLog::default());
        log.append(101, 0, visibility_log(true));
        log.append(
            101,
            1,
            RawLog {
                topics: visibility_log(true).topics,
                data: Bytes::from(vec![1u8, 2, 3]),
            },
        );
        let (mut poller, subscriber) = poller_at(log.clone(), Cursor::at_block(100));

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(outcome.undecodable, 1);
        assert_eq!(subscriber.frames(), vec![frame(true)]);
        assert_eq!(
            poller.cursor(),
            Some(Cursor {
                last_block: 101,
                last_log_index: 1
            })
        );
    }

    #[tokio::test]
    async fn test_entity_events_update_cache_and_send_snapshot() {
        let log = Arc::new(SimulatedLog::default());
        log.append(5, 0, entity_log("door", true));
        log.append(5, 1, entity_log("gate", true));
        log.append(6, 0, entity_log("bridge", true));

        let hub = Arc::new(BroadcastHub::default());
        let subscriber = Arc::new(RecordingSubscriber::default());
        hub.register(subscriber.clone());
        let cache = Arc::new(EntityStateCache::new(["door", "bridge"]));
        let mut poller = LedgerPoller::new(
            log.clone(),
            CursorTracker::new(StartPolicy::Genesis, RangeMode::Incremental),
            EventSchema::Entities,
            hub,
            Duration::from_secs(5),
        )
        .with_cache(cache.clone());

        let outcome = poller.poll_once().await.unwrap();
        assert_eq!(outcome.dispatched, 2);
        // "gate" is not registered
        assert_eq!(outcome.undecodable, 1);
        assert_eq!(
            subscriber.frames(),
            vec![
                r#"{"bridge":false,"door":true}"#.to_string(),
                r#"{"bridge":true,"door":true}"#.to_string(),
            ]
        );
        assert_eq!(cache.get("bridge"), Some(true));
        assert_eq!(log.queries()[0].from_block, 0);
    }

    #[tokio::test]
    async fn test_head_start_skips_history() {
        let log = Arc::new(SimulatedLog::default());
        log.append(50, 0, visibility_log(true));
        let hub = Arc::new(BroadcastHub::default());
        let subscriber = Arc::new(RecordingSubscriber::default());
        hub.register(subscriber.clone());
        let mut poller = LedgerPoller::new(
            log.clone(),
            CursorTracker::new(StartPolicy::Head, RangeMode::Incremental),
            EventSchema::Visibility,
            hub,
            Duration::from_secs(5),
        );

        poller.poll_once().await.unwrap();
        assert_eq!(poller.cursor(), Some(Cursor::at_block(50)));

        log.append(51, 0, visibility_log(false));
        poller.poll_once().await.unwrap();
        assert_eq!(subscriber.frames(), vec![frame(false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let log = Arc::new(SimulatedLog::default());
        log.append(101, 0, visibility_log(true));
        let (poller, subscriber) = poller_at(log.clone(), Cursor::at_block(100));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(subscriber.frames(), vec![frame(true)]);

        log.append(102, 0, visibility_log(false));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(subscriber.frames(), vec![frame(true), frame(false)]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        let polls = log.queries().len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(log.queries().len(), polls);
    }
}
