//! Test utilities shared across crate-level unit tests.

pub mod http;
pub mod platform;

pub use http::{start_mock_server, RecordingTransport};
pub use platform::{CallLog, StubPlatform};
