//! Bundled vendor platforms.

mod buffer;
mod flurry;
mod google_analytics;
mod intercom;
mod localytics;
mod mixpanel;

pub use flurry::FlurryPlatform;
pub use google_analytics::GoogleAnalyticsPlatform;
pub use intercom::IntercomPlatform;
pub use localytics::LocalyticsPlatform;
pub use mixpanel::MixpanelPlatform;

use log::{Level, LevelFilter};

/// Verbosity used when a platform's settings carry no `logLevel`.
pub(crate) fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    }
}

/// Emits a debug line for `platform` when its configured verbosity allows it.
pub(crate) fn trace_call(
    platform: &str,
    verbosity: LevelFilter,
    message: impl FnOnce() -> String,
) {
    if Level::Debug <= verbosity {
        log::debug!("{platform}: {}", message());
    }
}

pub(crate) fn generate_id(len: usize) -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(len)
        .collect()
}
