//! Batcher - groups prepared items by route until size or linger is reached

use std::collections::HashMap;
use std::time::Duration;

use contracts::{BatchItem, OutboundRoute};
use tokio::time::Instant;

use crate::ack::AckSender;

/// One flushed group, formatted as a unit
#[derive(Debug)]
pub struct Batch {
    pub route: OutboundRoute,
    pub items: Vec<BatchItem>,
    /// Parallel to `items`
    pub acks: Vec<Option<AckSender>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
struct Group {
    items: Vec<BatchItem>,
    acks: Vec<Option<AckSender>>,
    opened_at: Instant,
}

/// Per-worker batch accumulator
#[derive(Debug)]
pub struct Batcher {
    max_size: usize,
    linger: Duration,
    groups: HashMap<OutboundRoute, Group>,
}

impl Batcher {
    pub fn new(max_size: usize, linger: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            linger,
            groups: HashMap::new(),
        }
    }

    /// Add an item; returns its group once the group is full
    pub fn push(&mut self, item: BatchItem, ack: Option<AckSender>, now: Instant) -> Option<Batch> {
        let route = item.route.clone();
        let group = self.groups.entry(route.clone()).or_insert_with(|| Group {
            items: Vec::with_capacity(self.max_size),
            acks: Vec::with_capacity(self.max_size),
            opened_at: now,
        });
        group.items.push(item);
        group.acks.push(ack);

        if group.items.len() >= self.max_size {
            return self.take(&route);
        }
        None
    }

    /// Earliest linger deadline among open groups
    pub fn next_deadline(&self) -> Option<Instant> {
        self.groups
            .values()
            .map(|group| group.opened_at + self.linger)
            .min()
    }

    /// Flush every group whose linger has elapsed at `now`
    pub fn take_expired(&mut self, now: Instant) -> Vec<Batch> {
        let expired: Vec<OutboundRoute> = self
            .groups
            .iter()
            .filter(|(_, group)| group.opened_at + self.linger <= now)
            .map(|(route, _)| route.clone())
            .collect();

        expired.iter().filter_map(|route| self.take(route)).collect()
    }

    /// Flush everything, used when input ends
    pub fn drain(&mut self) -> Vec<Batch> {
        self.groups
            .drain()
            .map(|(route, group)| Batch {
                route,
                items: group.items,
                acks: group.acks,
            })
            .collect()
    }

    /// Items waiting in open groups
    pub fn pending(&self) -> usize {
        self.groups.values().map(|group| group.items.len()).sum()
    }

    fn take(&mut self, route: &OutboundRoute) -> Option<Batch> {
        self.groups.remove(route).map(|group| Batch {
            route: route.clone(),
            items: group.items,
            acks: group.acks,
        })
    }
}
