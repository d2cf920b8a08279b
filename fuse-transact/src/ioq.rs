//! Transaction queue
//!
//! Two collections per mounted instance: pending contexts awaiting
//! transmission (FIFO) and processing contexts awaiting a reply, indexed
//! by correlation token. Transitions are atomic under one lock so a
//! context is never visible to two channel exchanges at once.

use crate::context::FuseContext;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub(crate) struct Ioq {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<Box<FuseContext>>,
    processing: HashMap<u64, Box<FuseContext>>,
}

impl Ioq {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn post_pending(&self, ctx: Box<FuseContext>) {
        self.lock().pending.push_back(ctx);
    }

    pub(crate) fn next_pending(&self) -> Option<Box<FuseContext>> {
        self.lock().pending.pop_front()
    }

    pub(crate) fn start_processing(&self, ctx: Box<FuseContext>) {
        let prev = self.lock().processing.insert(ctx.token, ctx);
        debug_assert!(prev.is_none(), "correlation token collision");
    }

    pub(crate) fn end_processing(&self, token: u64) -> Option<Box<FuseContext>> {
        self.lock().processing.remove(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Payload;

    fn ctx(token: u64) -> Box<FuseContext> {
        FuseContext::internal(token, Payload::Init, None)
    }

    #[test]
    fn pending_is_fifo() {
        let ioq = Ioq::new();
        ioq.post_pending(ctx(1));
        ioq.post_pending(ctx(2));
        ioq.post_pending(ctx(3));

        assert_eq!(ioq.next_pending().unwrap().token, 1);
        assert_eq!(ioq.next_pending().unwrap().token, 2);
        assert_eq!(ioq.next_pending().unwrap().token, 3);
        assert!(ioq.next_pending().is_none());
    }

    #[test]
    fn processing_is_keyed_by_token() {
        let ioq = Ioq::new();
        ioq.start_processing(ctx(7));
        ioq.start_processing(ctx(8));

        assert_eq!(ioq.end_processing(8).unwrap().token, 8);
        assert_eq!(ioq.end_processing(7).unwrap().token, 7);
    }

    #[test]
    fn unknown_token_yields_none() {
        let ioq = Ioq::new();
        ioq.start_processing(ctx(7));
        assert!(ioq.end_processing(42).is_none());
        // the stored context is untouched
        assert_eq!(ioq.end_processing(7).unwrap().token, 7);
    }
}
