// ETWSpy - core/pipeline.rs
//
// The producer/consumer event pipeline between native callback threads and
// the UI thread.
//
// Shape: native callbacks -> bounded queue -> per-tick drain -> display
// buffer. Producers never block: on overflow the event is dropped and
// counted. The UI drains a batch sized by queue depth, and a hysteresis
// controller tunes the drain cadence between fast (busy) and slow (idle).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use crate::core::model::EventRow;
use crate::util::constants::{
    ABSOLUTE_MAX_DISPLAY_EVENTS, BATCH_MAX_DEPTH, BATCH_STEP_UP_DEPTH, DEFAULT_FLUSH_INTERVAL_MS,
    DEPTH_HIGH_THRESHOLD, DEPTH_LOW_THRESHOLD, DEPTH_WINDOW_SAMPLES, EVENT_QUEUE_CAPACITY,
    HYSTERESIS_SAMPLES, MAX_FLUSH_BATCH, MAX_FLUSH_INTERVAL_MS, MID_FLUSH_BATCH,
    MIN_FLUSH_INTERVAL_MS, MIN_FLUSH_BATCH, MIN_MAX_DISPLAY_EVENTS,
};

// =============================================================================
// Bounded event queue
// =============================================================================

/// Producer half of the event queue. Cloned into every native callback.
///
/// `sync_channel` has no depth accessor, so an approximate depth counter is
/// kept alongside: incremented on successful send, decremented on drain.
#[derive(Clone)]
pub struct EventSender {
    tx: SyncSender<EventRow>,
    depth: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl EventSender {
    /// Enqueue without blocking. On a full queue the row is dropped and the
    /// drop counter incremented; callbacks must never stall the ETW buffers.
    pub fn send(&self, row: EventRow) {
        match self.tx.try_send(row) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Consumer half, owned by the UI thread.
pub struct EventQueue {
    rx: Receiver<EventRow>,
    depth: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl EventQueue {
    /// Create a queue with the standard capacity.
    pub fn channel() -> (EventSender, EventQueue) {
        Self::with_capacity(EVENT_QUEUE_CAPACITY)
    }

    /// Create a queue with an explicit capacity (tests use small queues).
    pub fn with_capacity(capacity: usize) -> (EventSender, EventQueue) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let depth = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        (
            EventSender {
                tx,
                depth: Arc::clone(&depth),
                dropped: Arc::clone(&dropped),
            },
            EventQueue { rx, depth, dropped },
        )
    }

    /// Approximate number of rows waiting in the queue.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Total rows dropped on overflow since the queue was created.
    pub fn dropped_total(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain up to `max` rows without blocking.
    pub fn drain(&self, max: usize) -> Vec<EventRow> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.rx.try_recv() {
                Ok(row) => {
                    self.depth.fetch_sub(1, Ordering::Relaxed);
                    batch.push(row);
                }
                Err(_) => break,
            }
        }
        batch
    }
}

/// Flush batch size for the current queue depth. Deeper queues drain in
/// bigger batches so the consumer catches up, capped so one tick cannot
/// stall the render loop.
pub fn flush_batch_size(depth: usize) -> usize {
    if depth >= BATCH_MAX_DEPTH {
        MAX_FLUSH_BATCH
    } else if depth >= BATCH_STEP_UP_DEPTH {
        MID_FLUSH_BATCH
    } else {
        MIN_FLUSH_BATCH
    }
}

// =============================================================================
// Adaptive flush interval
// =============================================================================

/// Hysteresis controller for the UI flush cadence.
///
/// Each tick records the queue depth into a sliding window. When the
/// windowed average sits above the high threshold for enough consecutive
/// evaluations the interval halves (faster drains); when it sits below the
/// low threshold long enough the interval doubles (cheaper idling). Both
/// directions are clamped and require a full streak again after a change,
/// so bursty rates do not make the cadence oscillate.
#[derive(Debug)]
pub struct FlushController {
    interval_ms: u64,
    window: VecDeque<usize>,
    high_streak: u32,
    low_streak: u32,
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new()
    }
}

impl FlushController {
    pub fn new() -> Self {
        Self {
            interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            window: VecDeque::with_capacity(DEPTH_WINDOW_SAMPLES),
            high_streak: 0,
            low_streak: 0,
        }
    }

    /// Current flush interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Record a queue-depth sample and retune the interval if a full streak
    /// has accumulated. Returns the (possibly updated) interval.
    pub fn record_depth(&mut self, depth: usize) -> u64 {
        if self.window.len() == DEPTH_WINDOW_SAMPLES {
            self.window.pop_front();
        }
        self.window.push_back(depth);

        let average = self.window.iter().sum::<usize>() / self.window.len();

        if average >= DEPTH_HIGH_THRESHOLD {
            self.high_streak += 1;
            self.low_streak = 0;
        } else if average <= DEPTH_LOW_THRESHOLD {
            self.low_streak += 1;
            self.high_streak = 0;
        } else {
            self.high_streak = 0;
            self.low_streak = 0;
        }

        if self.high_streak >= HYSTERESIS_SAMPLES {
            let next = (self.interval_ms / 2).max(MIN_FLUSH_INTERVAL_MS);
            if next != self.interval_ms {
                tracing::debug!(from = self.interval_ms, to = next, "Flush interval decreased");
            }
            self.interval_ms = next;
            self.high_streak = 0;
        } else if self.low_streak >= HYSTERESIS_SAMPLES {
            let next = (self.interval_ms * 2).min(MAX_FLUSH_INTERVAL_MS);
            if next != self.interval_ms {
                tracing::debug!(from = self.interval_ms, to = next, "Flush interval increased");
            }
            self.interval_ms = next;
            self.low_streak = 0;
        }

        self.interval_ms
    }

    /// Reset to the starting cadence (used when a new session starts).
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// =============================================================================
// Capped display buffer
// =============================================================================

/// FIFO buffer of rows backing the event grid.
///
/// Bounded by a user-configurable cap: pushing past it evicts the oldest
/// rows, so the buffer length never exceeds the cap after any flush.
#[derive(Debug)]
pub struct DisplayBuffer {
    rows: VecDeque<EventRow>,
    max_events: usize,
}

impl DisplayBuffer {
    pub fn new(max_events: usize) -> Self {
        Self {
            rows: VecDeque::new(),
            max_events: clamp_max_events(max_events),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn get(&self, index: usize) -> Option<&EventRow> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRow> {
        self.rows.iter()
    }

    /// Change the cap, clamping to the allowed range and evicting oldest
    /// rows immediately if the buffer is now over it.
    pub fn set_max_events(&mut self, max_events: usize) {
        self.max_events = clamp_max_events(max_events);
        self.evict();
    }

    /// Append a flushed batch, evicting oldest rows past the cap.
    pub fn push_batch(&mut self, batch: Vec<EventRow>) {
        self.rows.extend(batch);
        self.evict();
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    fn evict(&mut self) {
        while self.rows.len() > self.max_events {
            self.rows.pop_front();
        }
    }
}

fn clamp_max_events(requested: usize) -> usize {
    requested.clamp(MIN_MAX_DISPLAY_EVENTS, ABSOLUTE_MAX_DISPLAY_EVENTS)
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::TraceLevel;
    use chrono::Utc;

    fn row(id: u64) -> EventRow {
        EventRow {
            id,
            timestamp: Utc::now(),
            provider_name: "Test".into(),
            provider_guid: "22FB2CD6-0E7B-422B-A0C7-2FAD1FD0E716".into(),
            event_id: 1,
            opcode: 0,
            level: TraceLevel::Information,
            process_id: 0,
            thread_id: 0,
            task: String::new(),
            properties: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    #[test]
    fn test_queue_overflow_drops_and_counts() {
        let (tx, queue) = EventQueue::with_capacity(3);
        for i in 0..5 {
            tx.send(row(i));
        }

        assert_eq!(queue.depth(), 3);
        assert_eq!(queue.dropped_total(), 2);

        let drained = queue.drain(10);
        assert_eq!(drained.len(), 3);
        // The oldest rows survive; the newest are the ones dropped.
        assert_eq!(drained[0].id, 0);
        assert_eq!(drained[2].id, 2);
        assert_eq!(queue.depth(), 0);
    }

    #[test]
    fn test_drain_respects_batch_limit() {
        let (tx, queue) = EventQueue::with_capacity(10);
        for i in 0..8 {
            tx.send(row(i));
        }

        assert_eq!(queue.drain(5).len(), 5);
        assert_eq!(queue.depth(), 3);
        assert_eq!(queue.drain(5).len(), 3);
    }

    #[test]
    fn test_send_after_receiver_dropped_counts_as_dropped() {
        let (tx, queue) = EventQueue::with_capacity(4);
        drop(queue);
        tx.send(row(1));
        // No panic; the row is accounted as dropped internally.
        assert_eq!(tx.dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_flush_batch_size_steps() {
        assert_eq!(flush_batch_size(0), MIN_FLUSH_BATCH);
        assert_eq!(flush_batch_size(BATCH_STEP_UP_DEPTH - 1), MIN_FLUSH_BATCH);
        assert_eq!(flush_batch_size(BATCH_STEP_UP_DEPTH), MID_FLUSH_BATCH);
        assert_eq!(flush_batch_size(BATCH_MAX_DEPTH - 1), MID_FLUSH_BATCH);
        assert_eq!(flush_batch_size(BATCH_MAX_DEPTH), MAX_FLUSH_BATCH);
        assert_eq!(flush_batch_size(usize::MAX), MAX_FLUSH_BATCH);
    }

    // ------------------------------------------------------------------
    // Flush controller
    // ------------------------------------------------------------------

    #[test]
    fn test_controller_starts_at_default() {
        let controller = FlushController::new();
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS);
    }

    #[test]
    fn test_sustained_pressure_halves_interval() {
        let mut controller = FlushController::new();
        for _ in 0..(HYSTERESIS_SAMPLES - 1) {
            controller.record_depth(DEPTH_HIGH_THRESHOLD + 1_000);
        }
        // Two high samples are not enough.
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS);

        controller.record_depth(DEPTH_HIGH_THRESHOLD + 1_000);
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS / 2);
    }

    #[test]
    fn test_sustained_idle_doubles_interval() {
        let mut controller = FlushController::new();
        for _ in 0..HYSTERESIS_SAMPLES {
            controller.record_depth(0);
        }
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS * 2);
    }

    #[test]
    fn test_interval_clamps_at_both_ends() {
        let mut controller = FlushController::new();
        // Drive hard toward the floor.
        for _ in 0..50 {
            controller.record_depth(EVENT_QUEUE_CAPACITY);
        }
        assert_eq!(controller.interval_ms(), MIN_FLUSH_INTERVAL_MS);

        // Then idle long enough to reach the ceiling.
        for _ in 0..50 {
            controller.record_depth(0);
        }
        assert_eq!(controller.interval_ms(), MAX_FLUSH_INTERVAL_MS);
    }

    #[test]
    fn test_neutral_depth_leaves_interval_unchanged() {
        let mut controller = FlushController::new();
        let neutral = (DEPTH_LOW_THRESHOLD + DEPTH_HIGH_THRESHOLD) / 2;
        for _ in 0..20 {
            controller.record_depth(neutral);
        }
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS);
    }

    #[test]
    fn test_broken_streak_never_adjusts() {
        let mut controller = FlushController::new();
        // Two busy samples, then enough of a lull to pull the windowed
        // average back into the neutral band before the third.
        for _ in 0..7 {
            controller.record_depth(DEPTH_HIGH_THRESHOLD + 100);
            controller.record_depth(DEPTH_HIGH_THRESHOLD + 100);
            controller.record_depth(0);
            controller.record_depth(0);
            controller.record_depth(0);
        }
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS);
    }

    #[test]
    fn test_streak_resets_after_adjustment() {
        let mut controller = FlushController::new();
        for _ in 0..HYSTERESIS_SAMPLES {
            controller.record_depth(DEPTH_HIGH_THRESHOLD + 1_000);
        }
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS / 2);

        // One more high sample must not immediately halve again.
        controller.record_depth(DEPTH_HIGH_THRESHOLD + 1_000);
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS / 2);
    }

    #[test]
    fn test_reset_returns_to_default() {
        let mut controller = FlushController::new();
        for _ in 0..10 {
            controller.record_depth(EVENT_QUEUE_CAPACITY);
        }
        controller.reset();
        assert_eq!(controller.interval_ms(), DEFAULT_FLUSH_INTERVAL_MS);
    }

    // ------------------------------------------------------------------
    // Display buffer
    // ------------------------------------------------------------------

    #[test]
    fn test_buffer_never_exceeds_cap() {
        let mut buffer = DisplayBuffer::new(MIN_MAX_DISPLAY_EVENTS);
        let cap = buffer.max_events();

        // Push well past the cap in uneven batches.
        let mut id = 0u64;
        for batch_size in [1usize, 7, 300, cap, 13, cap * 2] {
            let batch: Vec<EventRow> = (0..batch_size)
                .map(|_| {
                    id += 1;
                    row(id)
                })
                .collect();
            buffer.push_batch(batch);
            assert!(buffer.len() <= cap);
        }

        // Oldest rows were evicted FIFO; the newest survive.
        assert_eq!(buffer.len(), cap);
        let last = buffer.iter().last().map(|r| r.id);
        assert_eq!(last, Some(id));
    }

    #[test]
    fn test_cap_is_clamped_to_allowed_range() {
        assert_eq!(DisplayBuffer::new(0).max_events(), MIN_MAX_DISPLAY_EVENTS);
        assert_eq!(
            DisplayBuffer::new(usize::MAX).max_events(),
            ABSOLUTE_MAX_DISPLAY_EVENTS
        );
    }

    #[test]
    fn test_shrinking_cap_evicts_immediately() {
        let mut buffer = DisplayBuffer::new(ABSOLUTE_MAX_DISPLAY_EVENTS);
        buffer.push_batch((0..5_000).map(|i| row(i as u64)).collect());
        assert_eq!(buffer.len(), 5_000);

        buffer.set_max_events(MIN_MAX_DISPLAY_EVENTS);
        assert_eq!(buffer.len(), MIN_MAX_DISPLAY_EVENTS);
        // The retained rows are the newest ones.
        assert_eq!(buffer.get(0).map(|r| r.id), Some(4_000));
    }
}
