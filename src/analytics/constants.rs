/// File name looked up when no explicit configuration path is given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "AnalyticsPlatformConfig.json";

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "ANALYTICS_PLATFORM_CONFIG";

/// Placeholder used when a value the host did not provide has to be reported.
pub const UNKNOWN_VALUE: &str = "<unknown>";

/// Prefix for screen tracking on platforms without a native screen API.
pub const TRACK_VIEW_PREFIX: &str = "TrackView - ";

pub const FLURRY_PLATFORM: &str = "Flurry";
pub const GOOGLE_ANALYTICS_PLATFORM: &str = "GoogleAnalytics";
pub const MIXPANEL_PLATFORM: &str = "Mixpanel";
pub const INTERCOM_PLATFORM: &str = "Intercom";
pub const LOCALYTICS_PLATFORM: &str = "Localytics";
