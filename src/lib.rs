#![doc = include_str!("RUSTDOC.md")]

pub mod analytics;
pub mod platforms;
pub mod registry;
pub mod transport;

#[cfg(test)]
pub mod test_support;

pub use analytics::{
    Analytics, AnalyticsBuilder, AnalyticsError, AnalyticsResult, Category, EventRecord,
    LifecycleSignal, ScreenView, TrackableScreen, UserRecord,
};
