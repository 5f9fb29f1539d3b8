use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use model::base_types::RouteId;

/// A point-in-time report emitted by the Run Driver (§4.7, §5). The hot loop
/// never blocks on a slow consumer; see [`ChannelProgressSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    PlacementComplete { vehicles_placed: u32 },
    RouteProcessed {
        route_id: RouteId,
        route_start: DateTime<Utc>,
        routes_processed: u64,
        routes_total: u64,
    },
    DayBoundaryCrossed { day: DateTime<Utc> },
    RunComplete { routes_processed: u64, unassigned: u64 },
}

/// Stands in for "an external reporter" (§2 item 7). The CLI, the HTTP
/// surface, and tests each supply their own implementation.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event. The default for tests and for callers with no
/// interest in progress reporting.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// A fixed-capacity, drop-oldest event queue guarded by a plain mutex
/// (§5.1). Producers never block: once `capacity` is reached, the oldest
/// queued event is discarded to make room for the newest one.
pub struct ChannelProgressSink {
    capacity: usize,
    queue: Mutex<VecDeque<ProgressEvent>>,
}

impl ChannelProgressSink {
    pub fn new(capacity: usize) -> ChannelProgressSink {
        ChannelProgressSink {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Drains every event currently queued, oldest first.
    pub fn drain(&self) -> Vec<ProgressEvent> {
        self.queue.lock().drain(..).collect()
    }
}

impl ProgressSink for ChannelProgressSink {
    fn report(&self, event: ProgressEvent) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(event);
    }
}
