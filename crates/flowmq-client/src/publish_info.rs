//! Producer-local view of a topic's writable partitions.
//!
//! One `TopicPublishInfo` exists per (producer, topic). Its cursor is the
//! round-robin state shared by every send for that topic, so successive
//! sends rotate across partitions instead of dog-piling one of them. The
//! cursor is seeded randomly at construction to keep a fleet of fresh
//! producers from all starting on partition 0.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{ClientError, Result};
use crate::route::{Endpoints, Partition, TopicRouteData};

/// Writable partitions of one topic plus the rotation cursor.
pub struct TopicPublishInfo {
    topic: String,
    partitions: Vec<Partition>,
    cursor: AtomicUsize,
}

impl TopicPublishInfo {
    /// Builds the publish view from a route, keeping only writable
    /// partitions in route order.
    pub fn new(topic: impl Into<String>, route: &TopicRouteData) -> Self {
        let partitions = route
            .partitions()
            .iter()
            .filter(|partition| partition.permission().is_writable())
            .cloned()
            .collect();
        Self {
            topic: topic.into(),
            partitions,
            cursor: AtomicUsize::new(rand::random::<u16>() as usize),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    fn next_index(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }

    /// Picks `count` candidate partitions for one send by advancing the
    /// cursor.
    ///
    /// The first pass only accepts partitions on non-isolated endpoints and
    /// takes at most one partition per broker. If that pass cannot fill the
    /// list — every endpoint isolated, or fewer healthy brokers than
    /// requested — the remainder is filled by plain rotation over all
    /// partitions, isolated or not: isolation is advisory and must never
    /// leave a send with nothing to try.
    pub fn take_partitions(
        &self,
        isolated: &HashSet<Endpoints>,
        count: usize,
    ) -> Result<Vec<Partition>> {
        if self.partitions.is_empty() {
            return Err(ClientError::NoWritablePartition(self.topic.clone()));
        }

        let len = self.partitions.len();
        let count = count.max(1);
        let mut candidates: Vec<Partition> = Vec::with_capacity(count);
        let mut taken_brokers: HashSet<&str> = HashSet::new();

        for _ in 0..len {
            if candidates.len() == count {
                break;
            }
            let partition = &self.partitions[self.next_index() % len];
            if isolated.contains(partition.endpoints()) {
                continue;
            }
            if !taken_brokers.insert(partition.broker_name()) {
                continue;
            }
            candidates.push(partition.clone());
        }

        // Fewer healthy brokers than requested: allow broker repetition but
        // still avoid isolated endpoints.
        for _ in 0..len {
            if candidates.len() == count {
                break;
            }
            let partition = &self.partitions[self.next_index() % len];
            if isolated.contains(partition.endpoints()) {
                continue;
            }
            candidates.push(partition.clone());
        }

        // Everything writable is isolated: rotate through all partitions
        // anyway so the caller fails on a real attempt instead of stalling.
        while candidates.len() < count {
            let partition = &self.partitions[self.next_index() % len];
            candidates.push(partition.clone());
        }

        Ok(candidates)
    }
}
