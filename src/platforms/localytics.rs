use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::LevelFilter;
use serde_json::{json, Map, Value};

use crate::analytics::config::PlatformSettings;
use crate::analytics::constants::LOCALYTICS_PLATFORM;
use crate::analytics::data::EventRecord;
use crate::analytics::error::{already_initialized, invalid_argument, AnalyticsResult};
use crate::analytics::lifecycle::is_background_transition;
use crate::analytics::platform::{AnalyticsPlatform, AppInfo, PlatformContext, PlatformState};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::platforms::{default_log_level, generate_id, trace_call};
use crate::transport::{OutboundRequest, Transport};

const DEFAULT_ENDPOINT: &str = "https://analytics.localytics.com/api/v2/applications";
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_UPLOAD_INTERVAL: Duration = Duration::from_secs(60);
const MAX_PENDING_RECORDS: usize = 1_000;

/// Localytics.
///
/// Records a session opened on `start` and closed on `stop`. Activity after the session
/// timeout of inactivity closes the old session and opens a new one. Events carry only their
/// name; every attribute value must be a string. Pending records are uploaded once
/// `uploadInterval` has elapsed or the queue reaches a fixed cap.
pub struct LocalyticsPlatform {
    transport: Arc<dyn Transport>,
    app_info: AppInfo,
    state: PlatformState,
    verbosity: LevelFilter,
    upload: Option<LocalyticsUpload>,
}

struct LocalyticsUpload {
    app_key: String,
    endpoint: String,
    session_timeout: Duration,
    session: Option<LocalyticsSession>,
    customer_id: Option<String>,
    records: Vec<Value>,
    upload_interval: Duration,
    last_upload: Instant,
}

struct LocalyticsSession {
    id: String,
    last_activity: Instant,
}

impl LocalyticsUpload {
    fn record(&mut self, kind: &str, mut fields: Map<String, Value>) {
        fields.insert("dt".into(), json!(kind));
        fields.insert("ct".into(), json!(Utc::now().timestamp()));
        if let Some(session) = &self.session {
            fields.insert("su".into(), json!(session.id));
        }
        if let Some(customer_id) = &self.customer_id {
            fields.insert("cid".into(), json!(customer_id));
        }
        self.records.push(Value::Object(fields));
    }

    fn open_session(&mut self) {
        self.session = Some(LocalyticsSession {
            id: generate_id(32),
            last_activity: Instant::now(),
        });
        self.record("s", Map::new());
    }

    fn close_session(&mut self) {
        if self.session.is_some() {
            self.record("c", Map::new());
            self.session = None;
        }
    }

    /// Rolls the session over when it has been idle longer than the timeout.
    fn touch(&mut self) {
        let expired = self
            .session
            .as_ref()
            .map_or(true, |session| {
                session.last_activity.elapsed() >= self.session_timeout
            });
        if expired {
            self.close_session();
            self.open_session();
        } else if let Some(session) = self.session.as_mut() {
            session.last_activity = Instant::now();
        }
    }

    fn is_due(&self) -> bool {
        self.records.len() >= MAX_PENDING_RECORDS
            || self.last_upload.elapsed() >= self.upload_interval
    }
}

impl LocalyticsPlatform {
    pub fn new(context: &PlatformContext) -> Self {
        Self {
            transport: context.transport.clone(),
            app_info: context.app_info.clone(),
            state: PlatformState::default(),
            verbosity: default_log_level(),
            upload: None,
        }
    }

    fn send_upload(&mut self) {
        let Some(upload) = self.upload.as_mut() else {
            return;
        };
        upload.last_upload = Instant::now();
        if upload.records.is_empty() {
            return;
        }
        let records = std::mem::take(&mut upload.records);
        let count = records.len();
        let body = json!({
            "app_key": upload.app_key,
            "app_version": self.app_info.version_string(),
            "records": records,
        });
        let url = format!("{}/{}/uploads", upload.endpoint, upload.app_key);
        let request = OutboundRequest::post(LOCALYTICS_PLATFORM, url).with_json(body);
        match self.transport.send(&request) {
            Ok(()) => trace_call(LOCALYTICS_PLATFORM, self.verbosity, || {
                format!("uploaded {count} records")
            }),
            Err(err) => log::warn!("{LOCALYTICS_PLATFORM}: dropping {count} records: {err}"),
        }
    }

    fn upload_if_due(&mut self) {
        if self.upload.as_ref().is_some_and(LocalyticsUpload::is_due) {
            self.send_upload();
        }
    }
}

fn string_attributes(event: &EventRecord) -> AnalyticsResult<Option<Map<String, Value>>> {
    let Some(parameters) = event.parameters() else {
        return Ok(None);
    };
    let mut attributes = Map::new();
    for (key, value) in parameters {
        if !value.is_string() {
            return Err(invalid_argument(format!(
                "Localytics attributes must be strings, `{key}` of `{}` is {value}",
                event.event()
            )));
        }
        attributes.insert(key.clone(), value.clone());
    }
    Ok(Some(attributes))
}

impl AnalyticsPlatform for LocalyticsPlatform {
    fn name(&self) -> &str {
        LOCALYTICS_PLATFORM
    }

    fn initialize(&mut self, settings: &PlatformSettings) -> AnalyticsResult<()> {
        if self.upload.is_some() {
            return Err(already_initialized(LOCALYTICS_PLATFORM));
        }
        let app_key = settings.require_string(LOCALYTICS_PLATFORM, "trackingID")?;
        let endpoint = settings.endpoint(LOCALYTICS_PLATFORM, DEFAULT_ENDPOINT)?;
        let session_timeout = settings
            .optional_seconds(LOCALYTICS_PLATFORM, "dispatchInterval")?
            .unwrap_or(DEFAULT_SESSION_TIMEOUT);
        let upload_interval = settings
            .optional_seconds(LOCALYTICS_PLATFORM, "uploadInterval")?
            .unwrap_or(DEFAULT_UPLOAD_INTERVAL);
        if let Some(level) = settings.log_level(LOCALYTICS_PLATFORM)? {
            self.verbosity = level;
        }

        self.upload = Some(LocalyticsUpload {
            app_key: app_key.to_string(),
            endpoint,
            session_timeout,
            session: None,
            customer_id: None,
            records: Vec::new(),
            upload_interval,
            last_upload: Instant::now(),
        });
        Ok(())
    }

    fn start(&mut self) {
        let Some(upload) = self.upload.as_mut() else {
            return;
        };
        if self.state.begin() {
            upload.open_session();
            self.send_upload();
        }
    }

    fn stop(&mut self) {
        if !self.state.end() {
            return;
        }
        if let Some(upload) = self.upload.as_mut() {
            upload.close_session();
        }
        self.send_upload();
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
        let attributes = string_attributes(event)?;
        let Some(upload) = self.upload.as_mut() else {
            return Ok(());
        };
        upload.touch();
        let mut fields = Map::new();
        fields.insert("n".into(), json!(event.event()));
        if let Some(attributes) = attributes {
            fields.insert("attrs".into(), Value::Object(attributes));
        }
        upload.record("e", fields);

        if is_background_transition(event) {
            self.send_upload();
        } else {
            self.upload_if_due();
        }
        Ok(())
    }

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let title = self.title_for(screen);
        if let Some(upload) = self.upload.as_mut() {
            upload.touch();
            let mut fields = Map::new();
            fields.insert("n".into(), json!(title));
            upload.record("screen", fields);
        }
        self.upload_if_due();
        Ok(())
    }

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let Some(upload) = self.upload.as_mut() else {
            return Ok(());
        };
        upload.customer_id = Some(user.identifier().to_string());

        let mut attributes = Map::new();
        if let Some(first_name) = user.first_name() {
            attributes.insert("$first_name".into(), json!(first_name));
        }
        if let Some(last_name) = user.last_name() {
            attributes.insert("$last_name".into(), json!(last_name));
        }
        if let Some(full_name) = user.full_name() {
            attributes.insert("$full_name".into(), json!(full_name));
        }
        if let Some(email) = user.email_address() {
            attributes.insert("$email".into(), json!(email));
        }
        let mut fields = Map::new();
        fields.insert("attrs".into(), Value::Object(attributes));
        upload.record("profile", fields);
        self.upload_if_due();
        Ok(())
    }

    fn stop_tracking_user(&mut self, _user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(upload) = self.upload.as_mut() {
            upload.customer_id = None;
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.send_upload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::data::{Category, Parameters};
    use crate::analytics::lifecycle::LifecycleSignal;
    use crate::analytics::screen::ScreenView;
    use crate::test_support::RecordingTransport;

    fn started_platform() -> (LocalyticsPlatform, Arc<RecordingTransport>) {
        let transport = RecordingTransport::shared();
        let context = PlatformContext::new(transport.clone(), AppInfo::new("1.4", "7"));
        let mut platform = LocalyticsPlatform::new(&context);
        platform
            .initialize(&PlatformSettings::new().with("trackingID", "LL-KEY"))
            .unwrap();
        platform.start();
        (platform, transport)
    }

    fn kinds(request: &OutboundRequest) -> Vec<String> {
        request.json().unwrap()["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|record| record["dt"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn start_uploads_session_open() {
        let (_platform, transport) = started_platform();
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            "https://analytics.localytics.com/api/v2/applications/LL-KEY/uploads"
        );
        assert_eq!(requests[0].json().unwrap()["app_version"], "1.4.7");
        assert_eq!(kinds(&requests[0]), ["s"]);
    }

    #[test]
    fn stop_closes_session_with_pending_events() {
        let (mut platform, transport) = started_platform();
        transport.take();
        platform
            .track_event(&EventRecord::new(Category::View, "Opened").with_parameter("tab", "2"))
            .unwrap();
        platform
            .track_screen(&ScreenView::new("Feed").with_title("Feed"))
            .unwrap();
        platform.stop();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(kinds(&requests[0]), ["e", "screen", "c"]);
        let event = &requests[0].json().unwrap()["records"][0];
        assert_eq!(event["n"], "Opened");
        assert_eq!(event["attrs"]["tab"], "2");
    }

    #[test]
    fn non_string_attributes_are_rejected() {
        let (mut platform, _) = started_platform();
        let err = platform
            .track_event(&EventRecord::new(Category::General, "Count").with_parameter("n", 3))
            .unwrap_err();
        assert_eq!(err.code_str(), "analytics/invalid-argument");
    }

    #[test]
    fn empty_attributes_are_omitted() {
        let (mut platform, transport) = started_platform();
        transport.take();
        platform
            .track_event(
                &EventRecord::new(Category::General, "A").with_parameters(Parameters::new()),
            )
            .unwrap();
        platform.flush();
        let request = &transport.requests()[0];
        assert!(request.json().unwrap()["records"][0].get("attrs").is_none());
    }

    #[test]
    fn idle_session_is_rolled_over() {
        let transport = RecordingTransport::shared();
        let context = PlatformContext::new(transport.clone(), AppInfo::default());
        let mut platform = LocalyticsPlatform::new(&context);
        platform
            .initialize(
                &PlatformSettings::new()
                    .with("trackingID", "LL-KEY")
                    .with("dispatchInterval", 0i64),
            )
            .unwrap();
        platform.start();
        transport.take();
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform.flush();
        assert_eq!(kinds(&transport.requests()[0]), ["c", "s", "e"]);
    }

    #[test]
    fn customer_id_follows_tracked_user() {
        let (mut platform, transport) = started_platform();
        transport.take();
        let user = UserRecord::new("c-9")
            .unwrap()
            .with_email_address("c9@example.com");
        platform.track_user(&user).unwrap();
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform.stop_tracking_user(&user).unwrap();
        platform
            .track_event(&EventRecord::new(Category::General, "B"))
            .unwrap();
        platform
            .track_event(&LifecycleSignal::DidEnterBackground.to_event())
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let records = &requests[0].json().unwrap()["records"];
        assert_eq!(records[0]["dt"], "profile");
        assert_eq!(records[0]["attrs"]["$email"], "c9@example.com");
        assert_eq!(records[1]["cid"], "c-9");
        assert!(records[2].get("cid").is_none());
    }

    #[test]
    fn elapsed_upload_interval_uploads_on_next_call() {
        let transport = RecordingTransport::shared();
        let context = PlatformContext::new(transport.clone(), AppInfo::default());
        let mut platform = LocalyticsPlatform::new(&context);
        platform
            .initialize(
                &PlatformSettings::new()
                    .with("trackingID", "LL-KEY")
                    .with("uploadInterval", 0i64),
            )
            .unwrap();
        platform.start();
        transport.take();
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform.track_screen(&ScreenView::new("Feed")).unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(kinds(&requests[0]), ["e"]);
        assert_eq!(kinds(&requests[1]), ["screen"]);
    }

    #[test]
    fn pending_records_are_capped() {
        let (mut platform, transport) = started_platform();
        transport.take();
        for i in 0..MAX_PENDING_RECORDS + 3 {
            platform
                .track_event(&EventRecord::new(Category::General, format!("E{i}")))
                .unwrap();
        }

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(kinds(&requests[0]).len(), MAX_PENDING_RECORDS);

        platform.stop();
        assert_eq!(kinds(&transport.requests()[1]), ["e", "e", "e", "c"]);
    }

    #[test]
    fn opt_out_keeps_session_but_drops_events() {
        let (mut platform, transport) = started_platform();
        transport.take();
        platform.set_opt_out(true);
        assert!(platform.is_started());
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform.flush();
        assert!(transport.requests().is_empty());
    }
}
