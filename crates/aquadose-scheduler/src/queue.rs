//! Pending delivery queue.
//!
//! A min-heap ordered so recovered deliveries preempt fresh ones at the
//! same time, and due instants pop in a deterministic total order. Only
//! the engine owns this queue; nothing else reorders or peeks it.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::deliveries::DeliveryInstant;

/// A queued instant plus the engine in-flight count snapshotted at
/// enqueue time (the load tiebreak in the ordering key).
#[derive(Debug, Clone)]
struct QueuedDelivery {
    instant: DeliveryInstant,
    in_flight_at_enqueue: u32,
}

impl QueuedDelivery {
    /// Lexicographic ordering key, ascending: recovery instants first,
    /// then delivery time, system load at enqueue, channel grouping,
    /// cycle order, and a unique id for total order.
    fn key(&self) -> (u8, DateTime<Utc>, u32, u8, u32, u64) {
        (
            if self.instant.is_recovery { 0 } else { 1 },
            self.instant.delivery_time,
            self.in_flight_at_enqueue,
            self.instant.channel_id,
            self.instant.cycle_index,
            self.instant.instant_id,
        )
    }
}

impl PartialEq for QueuedDelivery {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedDelivery {}

impl PartialOrd for QueuedDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedDelivery {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Priority queue of pending delivery instants.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    heap: BinaryHeap<Reverse<QueuedDelivery>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an instant, snapshotting the current in-flight count.
    pub fn push(&mut self, instant: DeliveryInstant, in_flight_now: u32) {
        self.heap.push(Reverse(QueuedDelivery {
            instant,
            in_flight_at_enqueue: in_flight_now,
        }));
    }

    /// Pop the earliest instant if it is due. The heap ordering means a
    /// non-due head guarantees nothing later is due either.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<DeliveryInstant> {
        match self.heap.peek() {
            Some(Reverse(next)) if next.instant.delivery_time <= now => {
                self.heap.pop().map(|Reverse(q)| q.instant)
            }
            _ => None,
        }
    }

    /// Delivery time of the earliest queued instant.
    pub fn peek_next_time(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse(q)| q.instant.delivery_time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether any queued instant targets the given subject.
    pub fn contains_subject(&self, schedule_id: &str, subject_id: &str) -> bool {
        self.heap.iter().any(|Reverse(q)| {
            q.instant.schedule_id == schedule_id && q.instant.subject_id == subject_id
        })
    }

    /// Drop every queued instant belonging to a schedule. Returns how
    /// many were removed.
    pub fn purge_schedule(&mut self, schedule_id: &str) -> usize {
        let before = self.heap.len();
        let kept: Vec<Reverse<QueuedDelivery>> = std::mem::take(&mut self.heap)
            .into_iter()
            .filter(|Reverse(q)| q.instant.schedule_id != schedule_id)
            .collect();
        self.heap = BinaryHeap::from(kept);
        before - self.heap.len()
    }
}
