mod api;
pub mod config;
pub mod constants;
pub(crate) mod data;
pub mod error;
pub mod lifecycle;
pub mod platform;
pub(crate) mod screen;
pub(crate) mod user;

pub use api::{Analytics, AnalyticsBuilder};
pub use config::{
    ConfigSource, FileConfigSource, PlatformConfig, PlatformSettings, SettingValue,
    StaticConfigSource,
};
pub use data::{Category, EventRecord, Parameters};
pub use error::{AnalyticsError, AnalyticsErrorCode, AnalyticsResult};
pub use lifecycle::{BackgroundRefreshStatus, LaunchOptions, LifecycleSignal};
pub use platform::{AnalyticsPlatform, AppInfo, PlatformContext, PlatformState};
pub use screen::{ScreenView, TrackableScreen};
pub use user::UserRecord;
