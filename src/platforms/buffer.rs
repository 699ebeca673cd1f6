use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::transport::{OutboundRequest, Transport};

/// Requests waiting to be handed to the transport.
///
/// A buffer with a flush interval flushes itself on the first push after the interval has
/// elapsed since the previous flush; a zero interval sends every request as it is pushed.
/// Without an interval, requests only leave on an explicit [`RequestBuffer::flush`].
/// Delivery failures are logged and the request dropped.
pub(crate) struct RequestBuffer {
    platform: &'static str,
    transport: Arc<dyn Transport>,
    pending: Vec<OutboundRequest>,
    flush_interval: Option<Duration>,
    last_flush: Instant,
}

impl RequestBuffer {
    pub(crate) fn new(
        platform: &'static str,
        transport: Arc<dyn Transport>,
        flush_interval: Option<Duration>,
    ) -> Self {
        Self {
            platform,
            transport,
            pending: Vec::new(),
            flush_interval,
            last_flush: Instant::now(),
        }
    }

    pub(crate) fn push(&mut self, request: OutboundRequest) {
        self.pending.push(request);
        if self.is_due() {
            self.flush();
        }
    }

    /// Sends every pending request. Returns how many were delivered.
    pub(crate) fn flush(&mut self) -> usize {
        self.last_flush = Instant::now();
        let mut delivered = 0;
        for request in self.pending.drain(..) {
            match self.transport.send(&request) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    log::warn!("{}: dropping request to {}: {err}", self.platform, request.url)
                }
            }
        }
        delivered
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn is_due(&self) -> bool {
        self.flush_interval
            .is_some_and(|interval| self.last_flush.elapsed() >= interval)
    }
}
