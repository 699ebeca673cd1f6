use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use log::LevelFilter;
use serde_json::{json, Map, Value};

use crate::analytics::config::PlatformSettings;
use crate::analytics::constants::{FLURRY_PLATFORM, TRACK_VIEW_PREFIX};
use crate::analytics::data::EventRecord;
use crate::analytics::error::{already_initialized, invalid_argument, AnalyticsResult};
use crate::analytics::lifecycle::is_background_transition;
use crate::analytics::platform::{AnalyticsPlatform, AppInfo, PlatformContext, PlatformState};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::platforms::{default_log_level, generate_id, trace_call};
use crate::transport::{OutboundRequest, Transport};

const DEFAULT_ENDPOINT: &str = "https://data.flurry.com/aap.do";
const MAX_EVENT_PARAMETERS: usize = 10;
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);
const MAX_PENDING_EVENTS: usize = 1_000;

/// Flurry analytics.
///
/// Events are logged as `"<category> - <event>"` and collected into a session report. The report
/// is sent when the platform stops, when the host moves to the background, on `flush`, and on the
/// first call after `reportInterval` has elapsed or the pending events reach a fixed cap.
pub struct FlurryPlatform {
    transport: Arc<dyn Transport>,
    app_info: AppInfo,
    state: PlatformState,
    verbosity: LevelFilter,
    session: Option<FlurrySession>,
}

struct FlurrySession {
    api_key: String,
    endpoint: String,
    session_id: String,
    started_at: DateTime<Utc>,
    user_id: Option<String>,
    page_views: u32,
    events: Vec<Value>,
    report_interval: Duration,
    last_report: Instant,
}

impl FlurryPlatform {
    pub fn new(context: &PlatformContext) -> Self {
        Self {
            transport: context.transport.clone(),
            app_info: context.app_info.clone(),
            state: PlatformState::default(),
            verbosity: default_log_level(),
            session: None,
        }
    }

    fn log_event(&mut self, name: String, parameters: Option<&Map<String, Value>>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut entry = json!({
            "name": name,
            "timestamp": Utc::now().timestamp_millis(),
        });
        if let Some(parameters) = parameters {
            entry["parameters"] = Value::Object(parameters.clone());
        }
        trace_call(FLURRY_PLATFORM, self.verbosity, || {
            format!("logged {entry}")
        });
        session.events.push(entry);
    }

    fn report_if_due(&mut self) {
        let due = self.session.as_ref().is_some_and(|session| {
            session.events.len() >= MAX_PENDING_EVENTS
                || session.last_report.elapsed() >= session.report_interval
        });
        if due {
            self.send_report();
        }
    }

    fn send_report(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.last_report = Instant::now();
        if session.events.is_empty() && session.page_views == 0 {
            return;
        }

        let events = std::mem::take(&mut session.events);
        let page_views = std::mem::take(&mut session.page_views);
        let report = json!({
            "apiKey": session.api_key,
            "sessionId": session.session_id,
            "sessionStart": session.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "appVersion": self.app_info.version_string(),
            "userId": session.user_id,
            "pageViews": page_views,
            "events": events,
        });
        let request =
            OutboundRequest::post(FLURRY_PLATFORM, session.endpoint.clone()).with_json(report);
        if let Err(err) = self.transport.send(&request) {
            log::warn!("{FLURRY_PLATFORM}: dropping session report: {err}");
        }
    }
}

impl AnalyticsPlatform for FlurryPlatform {
    fn name(&self) -> &str {
        FLURRY_PLATFORM
    }

    fn initialize(&mut self, settings: &PlatformSettings) -> AnalyticsResult<()> {
        if self.session.is_some() {
            return Err(already_initialized(FLURRY_PLATFORM));
        }
        let api_key = settings.require_string(FLURRY_PLATFORM, "apiKey")?;
        let endpoint = settings.endpoint(FLURRY_PLATFORM, DEFAULT_ENDPOINT)?;
        let report_interval = settings
            .optional_seconds(FLURRY_PLATFORM, "reportInterval")?
            .unwrap_or(DEFAULT_REPORT_INTERVAL);
        if let Some(level) = settings.log_level(FLURRY_PLATFORM)? {
            self.verbosity = level;
        }

        self.session = Some(FlurrySession {
            api_key: api_key.to_string(),
            endpoint,
            session_id: generate_id(24),
            started_at: Utc::now(),
            user_id: None,
            page_views: 0,
            events: Vec::new(),
            report_interval,
            last_report: Instant::now(),
        });
        trace_call(FLURRY_PLATFORM, self.verbosity, || {
            format!("session opened for version {}", self.app_info.version_string())
        });
        Ok(())
    }

    fn start(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.state.begin();
    }

    fn stop(&mut self) {
        if self.state.end() {
            self.send_report();
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
        let parameters = match event.parameters() {
            Some(parameters) if parameters.len() > MAX_EVENT_PARAMETERS => {
                return Err(invalid_argument(format!(
                    "Flurry accepts at most {MAX_EVENT_PARAMETERS} parameters, `{}` has {}",
                    event.event(),
                    parameters.len()
                )));
            }
            Some(parameters) => Some(
                parameters
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Map<String, Value>>(),
            ),
            None => None,
        };

        self.log_event(event.qualified_name(), parameters.as_ref());
        if is_background_transition(event) {
            self.send_report();
        } else {
            self.report_if_due();
        }
        Ok(())
    }

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let title = self.title_for(screen);
        self.log_event(format!("{TRACK_VIEW_PREFIX}{title}"), None);
        if let Some(session) = self.session.as_mut() {
            session.page_views += 1;
        }
        self.report_if_due();
        Ok(())
    }

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(session) = self.session.as_mut() {
            session.user_id = Some(user.identifier().to_string());
        }
        Ok(())
    }

    fn stop_tracking_user(&mut self, _user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(session) = self.session.as_mut() {
            session.user_id = None;
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.send_report();
    }
}
