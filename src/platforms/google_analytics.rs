use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use log::LevelFilter;
use serde::Serialize;
use serde_json::Value;

use crate::analytics::config::PlatformSettings;
use crate::analytics::constants::GOOGLE_ANALYTICS_PLATFORM;
use crate::analytics::data::EventRecord;
use crate::analytics::error::{already_initialized, invalid_argument, AnalyticsResult};
use crate::analytics::platform::{AnalyticsPlatform, AppInfo, PlatformContext, PlatformState};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::platforms::buffer::RequestBuffer;
use crate::platforms::{default_log_level, generate_id, trace_call};
use crate::transport::OutboundRequest;

const DEFAULT_ENDPOINT: &str = "https://www.google-analytics.com/mp/collect";
const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(120);
const MAX_EVENT_PARAMETERS: usize = 25;
const MAX_EVENT_NAME_LEN: usize = 40;

/// Google Analytics through the GA4 Measurement Protocol.
///
/// The event category and name travel as the `event_category` and `event_action` parameters;
/// the GA4 event name is derived from both. Screens are reported as `screen_view` events.
pub struct GoogleAnalyticsPlatform {
    context: PlatformContext,
    state: PlatformState,
    verbosity: LevelFilter,
    tracker: Option<Tracker>,
}

struct Tracker {
    measurement_id: String,
    api_secret: String,
    endpoint: String,
    dry_run: bool,
    client_id: String,
    user_id: Option<String>,
    user_properties: BTreeMap<String, UserProperty>,
    buffer: RequestBuffer,
}

#[derive(Serialize)]
struct MeasurementPayload<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    timestamp_micros: i64,
    #[serde(skip_serializing_if = "has_no_properties")]
    user_properties: &'a BTreeMap<String, UserProperty>,
    events: Vec<MeasurementEvent<'a>>,
}

#[derive(Serialize)]
struct MeasurementEvent<'a> {
    name: &'a str,
    params: &'a BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize)]
struct UserProperty {
    value: String,
}

fn has_no_properties(properties: &&BTreeMap<String, UserProperty>) -> bool {
    properties.is_empty()
}

impl GoogleAnalyticsPlatform {
    pub fn new(context: &PlatformContext) -> Self {
        Self {
            context: context.clone(),
            state: PlatformState::default(),
            verbosity: default_log_level(),
            tracker: None,
        }
    }

    fn send_hit(&mut self, name: &str, params: BTreeMap<String, String>) {
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };
        let payload = MeasurementPayload {
            client_id: &tracker.client_id,
            user_id: tracker.user_id.as_deref(),
            timestamp_micros: Utc::now().timestamp_micros(),
            user_properties: &tracker.user_properties,
            events: vec![MeasurementEvent {
                name,
                params: &params,
            }],
        };
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(err) => {
                log::warn!("{GOOGLE_ANALYTICS_PLATFORM}: failed to encode `{name}`: {err}");
                return;
            }
        };

        if tracker.dry_run {
            trace_call(GOOGLE_ANALYTICS_PLATFORM, self.verbosity, || {
                format!("dry run, not sending {body}")
            });
            return;
        }

        trace_call(GOOGLE_ANALYTICS_PLATFORM, self.verbosity, || {
            format!("queued {name}")
        });
        let request = OutboundRequest::post(GOOGLE_ANALYTICS_PLATFORM, tracker.endpoint.clone())
            .with_query("measurement_id", tracker.measurement_id.clone())
            .with_query("api_secret", tracker.api_secret.clone())
            .with_json(body);
        tracker.buffer.push(request);
    }

    fn base_params(app_info: &AppInfo) -> BTreeMap<String, String> {
        BTreeMap::from([("app_version".to_string(), app_info.version_string())])
    }
}

/// GA4 event names are at most 40 characters of letters, digits and underscores and start
/// with a letter.
fn measurement_event_name(event: &EventRecord) -> String {
    let mut name = String::new();
    let mut last_was_separator = true;
    for ch in format!("{}_{}", event.category(), event.event()).chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            name.push('_');
            last_was_separator = true;
        }
    }
    let mut name = name.trim_end_matches('_').to_string();
    if !name.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        name.insert_str(0, "event_");
    }
    name.truncate(MAX_EVENT_NAME_LEN);
    name.trim_end_matches('_').to_string()
}

fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl AnalyticsPlatform for GoogleAnalyticsPlatform {
    fn name(&self) -> &str {
        GOOGLE_ANALYTICS_PLATFORM
    }

    fn initialize(&mut self, settings: &PlatformSettings) -> AnalyticsResult<()> {
        if self.tracker.is_some() {
            return Err(already_initialized(GOOGLE_ANALYTICS_PLATFORM));
        }
        let measurement_id = settings.require_string(GOOGLE_ANALYTICS_PLATFORM, "trackingID")?;
        let api_secret = settings.require_string(GOOGLE_ANALYTICS_PLATFORM, "apiSecret")?;
        let endpoint = settings.endpoint(GOOGLE_ANALYTICS_PLATFORM, DEFAULT_ENDPOINT)?;
        let dispatch_interval = settings
            .optional_seconds(GOOGLE_ANALYTICS_PLATFORM, "dispatchInterval")?
            .unwrap_or(DEFAULT_DISPATCH_INTERVAL);
        let dry_run = settings
            .optional_bool(GOOGLE_ANALYTICS_PLATFORM, "dryRun")?
            .unwrap_or(false);
        if let Some(level) = settings.log_level(GOOGLE_ANALYTICS_PLATFORM)? {
            self.verbosity = level;
        }

        self.tracker = Some(Tracker {
            measurement_id: measurement_id.to_string(),
            api_secret: api_secret.to_string(),
            endpoint,
            dry_run,
            client_id: generate_id(32),
            user_id: None,
            user_properties: BTreeMap::new(),
            buffer: RequestBuffer::new(
                GOOGLE_ANALYTICS_PLATFORM,
                self.context.transport.clone(),
                Some(dispatch_interval),
            ),
        });
        Ok(())
    }

    fn start(&mut self) {
        if self.tracker.is_none() {
            return;
        }
        self.state.begin();
    }

    fn stop(&mut self) {
        if self.state.end() {
            self.flush();
        }
    }

    fn is_started(&self) -> bool {
        self.state.is_started()
    }

    fn opt_out(&self) -> bool {
        self.state.opt_out()
    }

    fn set_opt_out(&mut self, opt_out: bool) {
        self.state.set_opt_out(opt_out);
    }

    fn track_event(&mut self, event: &EventRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let mut params = Self::base_params(&self.context.app_info);
        params.insert("event_category".to_string(), event.category().to_string());
        params.insert("event_action".to_string(), event.event().to_string());
        if let Some(parameters) = event.parameters() {
            for (key, value) in parameters {
                params.insert(key.clone(), parameter_text(value));
            }
        }
        if params.len() > MAX_EVENT_PARAMETERS {
            return Err(invalid_argument(format!(
                "Google Analytics accepts at most {MAX_EVENT_PARAMETERS} parameters, `{}` has {}",
                event.event(),
                params.len()
            )));
        }

        let name = measurement_event_name(event);
        self.send_hit(&name, params);
        Ok(())
    }

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let mut params = Self::base_params(&self.context.app_info);
        params.insert("screen_name".to_string(), self.title_for(screen));
        self.send_hit("screen_view", params);
        Ok(())
    }

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.user_id = Some(user.identifier().to_string());
            tracker.user_properties = user
                .parameters()
                .map(|parameters| {
                    parameters
                        .iter()
                        .map(|(key, value)| {
                            (
                                key.clone(),
                                UserProperty {
                                    value: parameter_text(value),
                                },
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
        }
        Ok(())
    }

    fn stop_tracking_user(&mut self, _user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.user_id = None;
            tracker.user_properties.clear();
        }
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.buffer.flush();
        }
    }
}
