//! Exploration frontiers.

use std::collections::VecDeque;

use crate::arg::ArgNodeId;

pub trait Waitlist {
    fn add(&mut self, node: ArgNodeId);

    /// Next node to explore, or `None` when the frontier is exhausted.
    fn remove(&mut self) -> Option<ArgNodeId>;

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;

    fn add_all(&mut self, nodes: impl IntoIterator<Item = ArgNodeId>)
    where
        Self: Sized,
    {
        for node in nodes {
            self.add(node);
        }
    }
}

/// Oldest node first: breadth-first search.
#[derive(Debug, Default)]
pub struct FifoWaitlist {
    queue: VecDeque<ArgNodeId>,
}

impl FifoWaitlist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Waitlist for FifoWaitlist {
    fn add(&mut self, node: ArgNodeId) {
        self.queue.push_back(node);
    }

    fn remove(&mut self) -> Option<ArgNodeId> {
        self.queue.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Newest node first: depth-first search.
#[derive(Debug, Default)]
pub struct LifoWaitlist {
    stack: Vec<ArgNodeId>,
}

impl LifoWaitlist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Waitlist for LifoWaitlist {
    fn add(&mut self, node: ArgNodeId) {
        self.stack.push(node);
    }

    fn remove(&mut self) -> Option<ArgNodeId> {
        self.stack.pop()
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    fn len(&self) -> usize {
        self.stack.len()
    }
}
