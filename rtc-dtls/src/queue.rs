//! The bounded, blocking hand-off between the socket receive loop (which
//! classifies a datagram as DTLS and pushes it) and the handshake/record task
//! (which pops with a timeout). Pushing never blocks the receive loop: a full
//! queue drops the oldest datagram, the same "newest item wins, drop and
//! count" policy resource exhaustion gets everywhere else in this workspace.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

struct Inner {
    queue: VecDeque<Vec<u8>>,
    closed: bool,
}

pub struct InboundQueue {
    capacity: usize,
    state: Mutex<Inner>,
    not_empty: Condvar,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        InboundQueue {
            capacity,
            state: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Pushes a datagram, dropping the oldest queued one if full. Never blocks.
    pub fn push(&self, datagram: Vec<u8>) {
        let mut inner = self.state.lock().unwrap();
        if inner.closed {
            return;
        }
        if inner.queue.len() >= self.capacity {
            inner.queue.pop_front();
            log::warn!("dtls: inbound queue full, dropping oldest datagram");
        }
        inner.queue.push_back(datagram);
        self.not_empty.notify_one();
    }

    /// Pops the oldest datagram, waiting up to `timeout`. Returns `Ok(None)` on
    /// timeout (the caller interprets this as "retransmit needed"), and
    /// `Err(QueueClosed)` once [`InboundQueue::close`] has been called and
    /// drained.
    pub fn pop(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.state.lock().unwrap();
        loop {
            if let Some(datagram) = inner.queue.pop_front() {
                return Ok(Some(datagram));
            }
            if inner.closed {
                return Err(Error::QueueClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, timeout_result) = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap();
            inner = guard;
            if timeout_result.timed_out() && inner.queue.is_empty() && !inner.closed {
                return Ok(None);
            }
        }
    }

    pub fn close(&self) {
        let mut inner = self.state.lock().unwrap();
        inner.closed = true;
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_times_out_when_empty() {
        let q = InboundQueue::new(4);
        assert_eq!(q.pop(Duration::from_millis(20)).unwrap(), None);
    }

    #[test]
    fn push_then_pop_returns_fifo() {
        let q = InboundQueue::new(4);
        q.push(vec![1]);
        q.push(vec![2]);
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap(), Some(vec![1]));
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap(), Some(vec![2]));
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = InboundQueue::new(2);
        q.push(vec![1]);
        q.push(vec![2]);
        q.push(vec![3]);
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap(), Some(vec![2]));
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap(), Some(vec![3]));
    }

    #[test]
    fn closed_and_drained_queue_errors() {
        let q = InboundQueue::new(2);
        q.close();
        assert!(q.pop(Duration::from_millis(10)).is_err());
    }
}
