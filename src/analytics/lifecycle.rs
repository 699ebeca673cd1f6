//! Host application lifecycle signals.
//!
//! The host wires its framework's lifecycle callbacks to
//! [`crate::analytics::Analytics::handle_lifecycle_signal`]; each signal becomes exactly one
//! `Application` event.

use serde_json::Value;

use crate::analytics::constants::UNKNOWN_VALUE;
use crate::analytics::data::{Category, EventRecord};

pub const DID_ENTER_BACKGROUND_EVENT: &str = "Did Enter Background";

/// Whether the host may refresh content in the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundRefreshStatus {
    Restricted,
    Denied,
    Available,
}

impl BackgroundRefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundRefreshStatus::Restricted => "restricted",
            BackgroundRefreshStatus::Denied => "denied",
            BackgroundRefreshStatus::Available => "available",
        }
    }
}

/// What the application was launched with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub url: Option<String>,
    pub source_application: Option<String>,
    pub remote_notification: Option<String>,
    pub local_notification: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleSignal {
    BackgroundRefreshStatusDidChange(BackgroundRefreshStatus),
    DidBecomeActive,
    DidEnterBackground,
    DidFinishLaunching(LaunchOptions),
    DidTakeScreenshot,
    WillEnterForeground,
    WillResignActive,
    WillTerminate,
    ContentSizeCategoryDidChange { new_size: Option<String> },
}

impl LifecycleSignal {
    pub fn event_name(&self) -> &'static str {
        match self {
            LifecycleSignal::BackgroundRefreshStatusDidChange(_) => {
                "Background Refresh Status Did Change"
            }
            LifecycleSignal::DidBecomeActive => "Did Become Active",
            LifecycleSignal::DidEnterBackground => DID_ENTER_BACKGROUND_EVENT,
            LifecycleSignal::DidFinishLaunching(_) => "Did Finish Launching",
            LifecycleSignal::DidTakeScreenshot => "Did Take Screenshot",
            LifecycleSignal::WillEnterForeground => "Will Enter Foreground",
            LifecycleSignal::WillResignActive => "Will Resign Active",
            LifecycleSignal::WillTerminate => "Will Terminate",
            LifecycleSignal::ContentSizeCategoryDidChange { .. } => {
                "Content Size Category Did Change"
            }
        }
    }

    pub fn to_event(&self) -> EventRecord {
        let event = EventRecord::new(Category::Application, self.event_name());
        match self {
            LifecycleSignal::BackgroundRefreshStatusDidChange(status) => {
                event.with_parameter("status", status.as_str())
            }
            LifecycleSignal::DidFinishLaunching(options) => {
                let fields = [
                    ("launchOptionsURL", &options.url),
                    ("sourceApplication", &options.source_application),
                    ("remoteNotification", &options.remote_notification),
                    ("localNotification", &options.local_notification),
                ];
                fields
                    .into_iter()
                    .filter_map(|(key, value)| value.as_ref().map(|value| (key, value)))
                    .fold(event, |event, (key, value)| {
                        event.with_parameter(key, Value::String(value.clone()))
                    })
            }
            LifecycleSignal::ContentSizeCategoryDidChange { new_size } => {
                let size = new_size.as_deref().unwrap_or(UNKNOWN_VALUE);
                event.with_parameter("contentSize", size)
            }
            _ => event,
        }
    }
}

/// Whether `event` is the application moving to the background.
pub(crate) fn is_background_transition(event: &EventRecord) -> bool {
    *event.category() == Category::Application && event.event() == DID_ENTER_BACKGROUND_EVENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_signals_carry_no_parameters() {
        let event = LifecycleSignal::WillResignActive.to_event();
        assert_eq!(event.category(), &Category::Application);
        assert_eq!(event.event(), "Will Resign Active");
        assert_eq!(event.parameters(), None);
    }

    #[test]
    fn background_refresh_status_is_reported() {
        let event =
            LifecycleSignal::BackgroundRefreshStatusDidChange(BackgroundRefreshStatus::Denied)
                .to_event();
        assert_eq!(
            event.parameters().unwrap().get("status"),
            Some(&json!("denied"))
        );
    }

    #[test]
    fn launch_without_options_has_no_parameters() {
        let event = LifecycleSignal::DidFinishLaunching(LaunchOptions::default()).to_event();
        assert_eq!(event.event(), "Did Finish Launching");
        assert_eq!(event.parameters(), None);
    }

    #[test]
    fn launch_options_become_parameters() {
        let event = LifecycleSignal::DidFinishLaunching(LaunchOptions {
            url: Some("myapp://open/42".into()),
            source_application: Some("com.example.mail".into()),
            ..Default::default()
        })
        .to_event();
        let params = event.parameters().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(
            params.get("launchOptionsURL"),
            Some(&json!("myapp://open/42"))
        );
        assert_eq!(
            params.get("sourceApplication"),
            Some(&json!("com.example.mail"))
        );
    }

    #[test]
    fn content_size_defaults_to_unknown() {
        let event = LifecycleSignal::ContentSizeCategoryDidChange { new_size: None }.to_event();
        assert_eq!(
            event.parameters().unwrap().get("contentSize"),
            Some(&json!("<unknown>"))
        );
    }

    #[test]
    fn background_transition_is_detected() {
        assert!(is_background_transition(
            &LifecycleSignal::DidEnterBackground.to_event()
        ));
        assert!(!is_background_transition(
            &LifecycleSignal::WillEnterForeground.to_event()
        ));
    }
}
