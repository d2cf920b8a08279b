//! The narrow node-cache contract
//!
//! The cache proper (reference counting, expiration scheduling) lives
//! outside this crate; the engine only drains forget lists it was handed
//! and gives undrained entries back on teardown.

use std::collections::VecDeque;

/// Node references awaiting a forget notification, drained from the front.
#[derive(Debug, Default)]
pub struct ForgetList {
    nodeids: VecDeque<u64>,
}

impl ForgetList {
    #[must_use]
    pub fn new(nodeids: Vec<u64>) -> Self {
        Self {
            nodeids: nodeids.into(),
        }
    }

    /// Drains one node reference, if any remains.
    pub fn next(&mut self) -> Option<u64> {
        self.nodeids.pop_front()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodeids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodeids.len()
    }

    /// Hands the remaining entries back, emptying the list.
    pub fn take_remaining(&mut self) -> Vec<u64> {
        self.nodeids.drain(..).collect()
    }
}

/// What the engine needs from the node cache.
pub trait NodeCache: Send + Sync {
    /// Releases node references whose forget notifications were never
    /// sent (instance teardown with a partially drained list).
    fn release_forget(&self, nodeids: &[u64]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order() {
        let mut list = ForgetList::new(vec![3, 1, 2]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.next(), Some(3));
        assert_eq!(list.next(), Some(1));
        assert_eq!(list.next(), Some(2));
        assert_eq!(list.next(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn take_remaining_empties() {
        let mut list = ForgetList::new(vec![5, 6]);
        assert_eq!(list.next(), Some(5));
        assert_eq!(list.take_remaining(), vec![6]);
        assert!(list.is_empty());
    }
}
