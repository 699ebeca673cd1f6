use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use log::LevelFilter;
use serde_json::{json, Map, Value};

use crate::analytics::config::PlatformSettings;
use crate::analytics::constants::{MIXPANEL_PLATFORM, TRACK_VIEW_PREFIX};
use crate::analytics::data::EventRecord;
use crate::analytics::error::{already_initialized, AnalyticsResult};
use crate::analytics::lifecycle::is_background_transition;
use crate::analytics::platform::{AnalyticsPlatform, PlatformContext, PlatformState};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::platforms::buffer::RequestBuffer;
use crate::platforms::{default_log_level, generate_id, trace_call};
use crate::transport::OutboundRequest;

const DEFAULT_ENDPOINT: &str = "https://api.mixpanel.com";
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Mixpanel.
///
/// Mixpanel has no notion of starting, stopping or opting out on the ingestion side, so all of
/// it is enforced here. Events go to `/track` and people properties to `/engage`, both as the
/// base64 `data` form field.
pub struct MixpanelPlatform {
    context: PlatformContext,
    state: PlatformState,
    verbosity: LevelFilter,
    project: Option<MixpanelProject>,
}

struct MixpanelProject {
    token: String,
    endpoint: String,
    flush_on_background: bool,
    distinct_id: String,
    buffer: RequestBuffer,
}

impl MixpanelProject {
    fn anonymous_id() -> String {
        format!("$device:{}", generate_id(24))
    }

    fn ingest(&mut self, path: &str, records: Value) {
        let data = STANDARD.encode(records.to_string());
        let request = OutboundRequest::post(MIXPANEL_PLATFORM, format!("{}{path}", self.endpoint))
            .with_form(vec![("data".to_string(), data)]);
        self.buffer.push(request);
    }

    fn event_properties(&self, app_version: String) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert("token".into(), json!(self.token));
        properties.insert("distinct_id".into(), json!(self.distinct_id));
        properties.insert("time".into(), json!(Utc::now().timestamp_millis()));
        properties.insert("$insert_id".into(), json!(generate_id(16)));
        properties.insert("$app_version_string".into(), json!(app_version));
        properties
    }
}

impl MixpanelPlatform {
    pub fn new(context: &PlatformContext) -> Self {
        Self {
            context: context.clone(),
            state: PlatformState::default(),
            verbosity: default_log_level(),
            project: None,
        }
    }

    fn track(&mut self, name: String, parameters: Option<&Map<String, Value>>) {
        let app_version = self.context.app_info.version_string();
        let Some(project) = self.project.as_mut() else {
            return;
        };
        let mut properties = parameters.cloned().unwrap_or_default();
        properties.extend(project.event_properties(app_version));
        trace_call(MIXPANEL_PLATFORM, self.verbosity, || {
            format!("track {name}")
        });
        project.ingest("/track", json!([{ "event": name, "properties": properties }]));
    }
}

impl AnalyticsPlatform for MixpanelPlatform {
    fn name(&self) -> &str {
        MIXPANEL_PLATFORM
    }

    fn initialize(&mut self, settings: &PlatformSettings) -> AnalyticsResult<()> {
        if self.project.is_some() {
            return Err(already_initialized(MIXPANEL_PLATFORM));
        }
        let token = settings.require_string(MIXPANEL_PLATFORM, "token")?;
        let endpoint = settings.endpoint(MIXPANEL_PLATFORM, DEFAULT_ENDPOINT)?;
        let flush_interval = settings
            .optional_seconds(MIXPANEL_PLATFORM, "flushInterval")?
            .unwrap_or(DEFAULT_FLUSH_INTERVAL);
        let flush_on_background = settings
            .optional_bool(MIXPANEL_PLATFORM, "flushOnBackground")?
            .unwrap_or(true);
        if let Some(level) = settings.log_level(MIXPANEL_PLATFORM)? {
            self.verbosity = level;
        }

        self.project = Some(MixpanelProject {
            token: token.to_string(),
            endpoint,
            flush_on_background,
            distinct_id: MixpanelProject::anonymous_id(),
            buffer: RequestBuffer::new(
                MIXPANEL_PLATFORM,
                self.context.transport.clone(),
                Some(flush_interval),
            ),
        });
        Ok(())
    }

    fn start(&mut self) {
        if self.project.is_none() {
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
        let parameters = event
            .parameters()
            .map(|parameters| parameters.clone().into_iter().collect::<Map<String, Value>>());
        self.track(event.qualified_name(), parameters.as_ref());

        let flush_now = is_background_transition(event)
            && self
                .project
                .as_ref()
                .is_some_and(|project| project.flush_on_background);
        if flush_now {
            self.flush();
        }
        Ok(())
    }

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let title = self.title_for(screen);
        self.track(format!("{TRACK_VIEW_PREFIX}{title}"), None);
        Ok(())
    }

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let Some(project) = self.project.as_mut() else {
            return Ok(());
        };

        if project.distinct_id != user.identifier() {
            let anonymous_id =
                std::mem::replace(&mut project.distinct_id, user.identifier().to_string());
            project.ingest(
                "/track",
                json!([{
                    "event": "$identify",
                    "properties": {
                        "token": project.token,
                        "distinct_id": user.identifier(),
                        "$identified_id": user.identifier(),
                        "$anon_id": anonymous_id,
                    }
                }]),
            );
        }

        let mut set = user
            .parameters()
            .map(|parameters| parameters.clone().into_iter().collect::<Map<String, Value>>())
            .unwrap_or_default();
        if let Some(first_name) = user.first_name() {
            set.insert("$first_name".into(), json!(first_name));
        }
        if let Some(last_name) = user.last_name() {
            set.insert("$last_name".into(), json!(last_name));
        }
        if let Some(full_name) = user.full_name() {
            set.insert("$name".into(), json!(full_name));
        }
        if let Some(email) = user.email_address() {
            set.insert("$email".into(), json!(email));
        }
        if !set.is_empty() {
            project.ingest(
                "/engage",
                json!([{
                    "$token": project.token,
                    "$distinct_id": user.identifier(),
                    "$set": set,
                }]),
            );
        }
        Ok(())
    }

    fn stop_tracking_user(&mut self, _user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(project) = self.project.as_mut() {
            project.distinct_id = MixpanelProject::anonymous_id();
        }
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(project) = self.project.as_mut() {
            let sent = project.buffer.flush();
            trace_call(MIXPANEL_PLATFORM, self.verbosity, || {
                format!("flushed {sent} requests")
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::data::{Category, Parameters};
    use crate::analytics::lifecycle::LifecycleSignal;
    use crate::analytics::platform::AppInfo;
    use crate::analytics::screen::ScreenView;
    use crate::test_support::RecordingTransport;
    use crate::transport::RequestBody;
    use std::sync::Arc;

    fn platform_with(settings: PlatformSettings) -> (MixpanelPlatform, Arc<RecordingTransport>) {
        let transport = RecordingTransport::shared();
        let context = PlatformContext::new(transport.clone(), AppInfo::new("3.0", "12"));
        let mut platform = MixpanelPlatform::new(&context);
        platform.initialize(&settings).unwrap();
        platform.start();
        (platform, transport)
    }

    fn immediate() -> PlatformSettings {
        PlatformSettings::new()
            .with("token", "MP-TOKEN")
            .with("flushInterval", 0i64)
    }

    fn decode(request: &OutboundRequest) -> Value {
        let RequestBody::Form(fields) = &request.body else {
            panic!("expected a form body");
        };
        let data = &fields.iter().find(|(key, _)| key == "data").unwrap().1;
        serde_json::from_slice(&STANDARD.decode(data).unwrap()).unwrap()
    }

    #[test]
    fn event_is_sent_with_qualified_name_and_properties() {
        let (mut platform, transport) = platform_with(immediate());
        platform
            .track_event(
                &EventRecord::new(Category::Sharing, "Shared Photo")
                    .with_parameter("network", "mail"),
            )
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://api.mixpanel.com/track");
        let payload = decode(&requests[0]);
        assert_eq!(payload[0]["event"], "Sharing - Shared Photo");
        assert_eq!(payload[0]["properties"]["network"], "mail");
        assert_eq!(payload[0]["properties"]["token"], "MP-TOKEN");
        assert_eq!(payload[0]["properties"]["$app_version_string"], "3.0.12");
    }

    #[test]
    fn events_wait_for_flush_interval() {
        let (mut platform, transport) =
            platform_with(PlatformSettings::new().with("token", "MP-TOKEN"));
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform
            .track_screen(&ScreenView::new("Home").with_title("Welcome"))
            .unwrap();
        assert!(transport.requests().is_empty());

        platform.flush();
        let names: Vec<Value> = transport
            .requests()
            .iter()
            .map(|request| decode(request)[0]["event"].clone())
            .collect();
        assert_eq!(names, [json!("General - A"), json!("TrackView - Welcome")]);
    }

    #[test]
    fn background_transition_flushes_when_enabled() {
        let (mut platform, transport) =
            platform_with(PlatformSettings::new().with("token", "MP-TOKEN"));
        platform
            .track_event(&LifecycleSignal::DidEnterBackground.to_event())
            .unwrap();
        assert_eq!(transport.requests().len(), 1);

        let (mut quiet, quiet_transport) = platform_with(
            PlatformSettings::new()
                .with("token", "MP-TOKEN")
                .with("flushOnBackground", false),
        );
        quiet
            .track_event(&LifecycleSignal::DidEnterBackground.to_event())
            .unwrap();
        assert!(quiet_transport.requests().is_empty());
    }

    #[test]
    fn identify_then_reset_changes_distinct_id() {
        let (mut platform, transport) = platform_with(immediate());
        let user = UserRecord::new("u1")
            .unwrap()
            .with_first_name("Jane")
            .with_last_name("Doe")
            .with_email_address("jane@example.com");
        platform.track_user(&user).unwrap();
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform.stop_tracking_user(&user).unwrap();
        platform
            .track_event(&EventRecord::new(Category::General, "B"))
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(decode(&requests[0])[0]["event"], "$identify");
        assert_eq!(requests[1].url, "https://api.mixpanel.com/engage");
        let engage = decode(&requests[1]);
        assert_eq!(engage[0]["$set"]["$name"], "Jane Doe");
        assert_eq!(engage[0]["$set"]["$email"], "jane@example.com");
        assert_eq!(decode(&requests[2])[0]["properties"]["distinct_id"], "u1");
        assert_ne!(decode(&requests[3])[0]["properties"]["distinct_id"], "u1");
    }

    #[test]
    fn empty_parameters_match_missing_parameters() {
        let (mut platform, transport) = platform_with(immediate());
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform
            .track_event(
                &EventRecord::new(Category::General, "A").with_parameters(Parameters::new()),
            )
            .unwrap();
        let keys: Vec<Vec<String>> = transport
            .requests()
            .iter()
            .map(|request| {
                decode(request)[0]["properties"]
                    .as_object()
                    .unwrap()
                    .keys()
                    .cloned()
                    .collect()
            })
            .collect();
        assert_eq!(keys[0], keys[1]);
    }

    #[test]
    fn opted_out_or_stopped_platform_sends_nothing() {
        let (mut platform, transport) = platform_with(immediate());
        platform.set_opt_out(true);
        assert!(platform.is_started());
        platform
            .track_event(&EventRecord::new(Category::General, "A"))
            .unwrap();
        platform.set_opt_out(false);
        platform.stop();
        platform
            .track_event(&EventRecord::new(Category::General, "B"))
            .unwrap();
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn opted_out_platform_does_not_start() {
        let transport = RecordingTransport::shared();
        let context = PlatformContext::new(transport, AppInfo::default());
        let mut platform = MixpanelPlatform::new(&context);
        platform.initialize(&immediate()).unwrap();
        platform.set_opt_out(true);
        platform.start();
        assert!(!platform.is_started());
    }
}
