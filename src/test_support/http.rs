use std::sync::{Arc, Mutex};

use httpmock::MockServer;

use crate::analytics::error::{network_error, AnalyticsResult};
use crate::transport::{OutboundRequest, Transport};

/// Start a fresh `httpmock::MockServer` instance for use in unit tests.
pub fn start_mock_server() -> MockServer {
    MockServer::start()
}

/// Transport that keeps every request instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    fail: Mutex<bool>,
}

impl RecordingTransport {
    pub fn shared() -> Arc<RecordingTransport> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<OutboundRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }

    /// Makes subsequent sends fail with a network error (requests are still recorded).
    pub fn fail_sends(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &OutboundRequest) -> AnalyticsResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        if *self.fail.lock().unwrap() {
            return Err(network_error("simulated transport failure"));
        }
        Ok(())
    }
}
