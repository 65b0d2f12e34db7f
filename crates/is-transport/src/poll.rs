//! Poll-item set construction (spec §4.3 "Poll set" / §4.4 "Loop").
//! Grounded on `isProcessManagement.c`'s `isRemakeZMQPollItems`: the root
//! process polls `[transport-router, error-rep, error-dealer,
//! *child_dealers]`, rebuilding the last group whenever a child is added or
//! removed. The original caches the array across calls because it's a raw
//! `calloc`'d buffer threaded through global state; here a fresh `PollSet`
//! is simply built each time the socket membership changes and reused for
//! every poll iteration in between, which is the idiomatic equivalent
//! without any unsafe aliasing.

use is_domain::error::{IsError, Result};

pub struct PollSet<'a> {
    items: Vec<zmq::PollItem<'a>>,
}

impl<'a> PollSet<'a> {
    /// Build a poll set over `sockets`, in order; index `i` in `sockets`
    /// corresponds to index `i` in `is_readable`.
    pub fn new(sockets: impl IntoIterator<Item = &'a zmq::Socket>) -> Self {
        let items = sockets
            .into_iter()
            .map(|s| s.as_poll_item(zmq::POLLIN))
            .collect();
        PollSet { items }
    }

    /// Block up to `timeout_ms` (negative blocks forever) for any socket to
    /// become readable. Returns the number of ready sockets.
    pub fn poll(&mut self, timeout_ms: i64) -> Result<i32> {
        zmq::poll(&mut self.items, timeout_ms)
            .map_err(|e| IsError::TransportError(format!("zmq_poll failed: {e}")))
    }

    pub fn is_readable(&self, index: usize) -> bool {
        self.items
            .get(index)
            .is_some_and(|item| item.is_readable())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket;

    #[test]
    fn readable_after_peer_sends() {
        let ctx = zmq::Context::new();
        let router = socket::new_router(&ctx).unwrap();
        let dealer = socket::new_dealer(&ctx).unwrap();
        socket::bind(&router, "inproc://is-transport-test-poll").unwrap();
        socket::connect(&dealer, "inproc://is-transport-test-poll").unwrap();

        socket::send_multipart(&dealer, vec![b"ping".to_vec()]).unwrap();

        let mut set = PollSet::new([&router]);
        let n = set.poll(1000).unwrap();
        assert_eq!(n, 1);
        assert!(set.is_readable(0));
    }
}
