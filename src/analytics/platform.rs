use std::fmt;
use std::sync::Arc;

use crate::analytics::config::PlatformSettings;
use crate::analytics::data::EventRecord;
use crate::analytics::error::AnalyticsResult;
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::transport::Transport;

/// The contract every vendor integration implements.
///
/// Platforms guard every tracking call on their own opt-out and started state, whatever their
/// vendor supports natively, so the dispatcher can fan calls out unconditionally. Tracking calls
/// made while opted out or stopped return `Ok(())` without any effect. Errors are reserved for
/// misuse, such as exceeding a vendor's parameter limit.
pub trait AnalyticsPlatform: Send {
    /// The configuration type-name this platform is registered under.
    fn name(&self) -> &str;

    /// One-time setup from this platform's settings. Calling it twice fails with
    /// `analytics/already-initialized`.
    fn initialize(&mut self, settings: &PlatformSettings) -> AnalyticsResult<()>;

    /// Begins collection. Does nothing when already started or opted out.
    fn start(&mut self);

    /// Halts collection and flushes buffered requests. Does nothing when not started.
    fn stop(&mut self);

    fn is_started(&self) -> bool;

    fn opt_out(&self) -> bool;

    /// Suppresses (or re-enables) tracking immediately, without touching the started state.
    fn set_opt_out(&mut self, opt_out: bool);

    fn track_event(&mut self, event: &EventRecord) -> AnalyticsResult<()>;

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()>;

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()>;

    fn stop_tracking_user(&mut self, user: &UserRecord) -> AnalyticsResult<()>;

    /// Hands any buffered requests to the transport now.
    fn flush(&mut self) {}

    /// Title used when reporting `screen`. Override to customise screen naming per platform.
    fn title_for(&self, screen: &dyn TrackableScreen) -> String {
        screen.tracking_title()
    }
}

/// Opt-out and started flags kept by each platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlatformState {
    opt_out: bool,
    started: bool,
}

impl PlatformState {
    pub fn opt_out(&self) -> bool {
        self.opt_out
    }

    pub fn set_opt_out(&mut self, opt_out: bool) {
        self.opt_out = opt_out;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Marks the platform started. Returns `false`, leaving the state alone, when it is
    /// already started or opted out.
    pub fn begin(&mut self) -> bool {
        if self.opt_out || self.started {
            return false;
        }
        self.started = true;
        true
    }

    /// Marks the platform stopped. Returns `false` when it was not started.
    pub fn end(&mut self) -> bool {
        if !self.started {
            return false;
        }
        self.started = false;
        true
    }

    /// Whether tracking calls should reach the vendor.
    pub fn is_collecting(&self) -> bool {
        self.started && !self.opt_out
    }
}

/// Version information of the host application, stamped on outgoing data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppInfo {
    pub short_version: String,
    pub build_version: String,
}

impl AppInfo {
    pub fn new(short_version: impl Into<String>, build_version: impl Into<String>) -> Self {
        Self {
            short_version: short_version.into(),
            build_version: build_version.into(),
        }
    }

    /// `"<short>.<build>"`, e.g. `"2.1.0.418"`.
    pub fn version_string(&self) -> String {
        format!("{}.{}", self.short_version, self.build_version)
    }
}

impl Default for AppInfo {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"), "0")
    }
}

/// Shared collaborators handed to platform factories.
#[derive(Clone)]
pub struct PlatformContext {
    pub transport: Arc<dyn Transport>,
    pub app_info: AppInfo,
}

impl PlatformContext {
    pub fn new(transport: Arc<dyn Transport>, app_info: AppInfo) -> Self {
        Self {
            transport,
            app_info,
        }
    }
}

impl fmt::Debug for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformContext")
            .field("app_info", &self.app_info)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_refused_while_opted_out() {
        let mut state = PlatformState::default();
        state.set_opt_out(true);
        assert!(!state.begin());
        assert!(!state.is_started());
    }

    #[test]
    fn opt_out_leaves_started_untouched() {
        let mut state = PlatformState::default();
        assert!(state.begin());
        state.set_opt_out(true);
        assert!(state.is_started());
        assert!(!state.is_collecting());
        state.set_opt_out(false);
        assert!(state.is_collecting());
    }

    #[test]
    fn begin_and_end_are_idempotent() {
        let mut state = PlatformState::default();
        assert!(state.begin());
        assert!(!state.begin());
        assert!(state.end());
        assert!(!state.end());
    }

    #[test]
    fn version_string_joins_short_and_build() {
        assert_eq!(AppInfo::new("2.1.0", "418").version_string(), "2.1.0.418");
    }
}
