//! Bounded cache of recent Discord messages.
//!
//! Edit notices need the previous content of a message, and reply quoting
//! needs the content of the referenced message. Both read from here before
//! falling back to the Discord API.

use std::collections::{HashMap, VecDeque};

use crate::common::types::Snowflake;
use crate::common::MessageSnapshot;

pub const RECENT_MESSAGE_CAPACITY: usize = 1000;

/// Least-recently-used map of message id -> snapshot.
#[derive(Debug)]
pub struct RecentMessageCache {
    capacity: usize,
    entries: HashMap<Snowflake, MessageSnapshot>,
    /// Front is least recently used.
    order: VecDeque<Snowflake>,
}

impl RecentMessageCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn put(&mut self, id: Snowflake, snapshot: MessageSnapshot) {
        if self.entries.insert(id, snapshot).is_some() {
            self.touch(id);
            return;
        }

        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    /// Look up a message, marking it as recently used.
    pub fn get(&mut self, id: Snowflake) -> Option<&MessageSnapshot> {
        if self.entries.contains_key(&id) {
            self.touch(id);
        }
        self.entries.get(&id)
    }

    /// Store new content and hand back what was there before.
    pub fn replace(&mut self, id: Snowflake, snapshot: MessageSnapshot) -> Option<MessageSnapshot> {
        let previous = self.entries.get(&id).cloned();
        self.put(id, snapshot);
        previous
    }

    pub fn contains(&self, id: Snowflake) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, id: Snowflake) {
        if let Some(pos) = self.order.iter().position(|&entry| entry == id) {
            self.order.remove(pos);
        }
        self.order.push_back(id);
    }
}

impl Default for RecentMessageCache {
    fn default() -> Self {
        Self::new(RECENT_MESSAGE_CAPACITY)
    }
}
