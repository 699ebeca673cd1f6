use std::time::Duration;

use chrono::Utc;
use log::LevelFilter;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::analytics::config::PlatformSettings;
use crate::analytics::constants::{INTERCOM_PLATFORM, TRACK_VIEW_PREFIX};
use crate::analytics::data::EventRecord;
use crate::analytics::error::{already_initialized, invalid_argument, AnalyticsResult};
use crate::analytics::platform::{AnalyticsPlatform, PlatformContext, PlatformState};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::platforms::buffer::RequestBuffer;
use crate::platforms::{default_log_level, generate_id, trace_call};
use crate::transport::OutboundRequest;

const DEFAULT_ENDPOINT: &str = "https://api.intercom.io";
const MAX_METADATA_KEYS: usize = 10;

/// Intercom.
///
/// Every call is sent as it happens. Activity before `track_user` is attributed to an
/// anonymous id that is regenerated by `stop_tracking_user`.
pub struct IntercomPlatform {
    context: PlatformContext,
    state: PlatformState,
    verbosity: LevelFilter,
    workspace: Option<IntercomWorkspace>,
}

struct IntercomWorkspace {
    api_key: String,
    app_id: String,
    endpoint: String,
    user_id: String,
    buffer: RequestBuffer,
}

#[derive(Serialize)]
struct EventBody<'a> {
    event_name: &'a str,
    created_at: i64,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct UserBody<'a> {
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    custom_attributes: Map<String, Value>,
}

impl IntercomWorkspace {
    fn anonymous_id() -> String {
        format!("anonymous-{}", generate_id(20))
    }

    fn request(&self, path: &str) -> OutboundRequest {
        OutboundRequest::post(INTERCOM_PLATFORM, format!("{}{path}", self.endpoint))
            .with_header("Authorization", format!("Bearer {}", self.api_key))
            .with_header("Accept", "application/json")
    }
}

impl IntercomPlatform {
    pub fn new(context: &PlatformContext) -> Self {
        Self {
            context: context.clone(),
            state: PlatformState::default(),
            verbosity: default_log_level(),
            workspace: None,
        }
    }

    fn log_event(
        &mut self,
        name: &str,
        metadata: Option<Map<String, Value>>,
    ) -> AnalyticsResult<()> {
        let Some(workspace) = self.workspace.as_mut() else {
            return Ok(());
        };
        let body = EventBody {
            event_name: name,
            created_at: Utc::now().timestamp(),
            user_id: &workspace.user_id,
            metadata,
        };
        let body = serde_json::to_value(&body).map_err(|err| {
            invalid_argument(format!("Intercom event `{name}` is not serializable: {err}"))
        })?;
        let request = workspace.request("/events").with_json(body);
        trace_call(INTERCOM_PLATFORM, self.verbosity, || {
            format!("[{}] logged event {name}", workspace.app_id)
        });
        workspace.buffer.push(request);
        Ok(())
    }
}

impl AnalyticsPlatform for IntercomPlatform {
    fn name(&self) -> &str {
        INTERCOM_PLATFORM
    }

    fn initialize(&mut self, settings: &PlatformSettings) -> AnalyticsResult<()> {
        if self.workspace.is_some() {
            return Err(already_initialized(INTERCOM_PLATFORM));
        }
        let api_key = settings.require_string(INTERCOM_PLATFORM, "apiKey")?;
        let app_id = settings.require_string(INTERCOM_PLATFORM, "appID")?;
        let endpoint = settings.endpoint(INTERCOM_PLATFORM, DEFAULT_ENDPOINT)?;
        match settings.optional_bool(INTERCOM_PLATFORM, "enableLogging")? {
            Some(true) => self.verbosity = LevelFilter::Debug,
            Some(false) => self.verbosity = LevelFilter::Off,
            None => {}
        }

        self.workspace = Some(IntercomWorkspace {
            api_key: api_key.to_string(),
            app_id: app_id.to_string(),
            endpoint,
            user_id: IntercomWorkspace::anonymous_id(),
            buffer: RequestBuffer::new(
                INTERCOM_PLATFORM,
                self.context.transport.clone(),
                Some(Duration::ZERO),
            ),
        });
        Ok(())
    }

    fn start(&mut self) {
        if self.workspace.is_none() {
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
        let metadata = match event.parameters() {
            Some(parameters) if parameters.len() > MAX_METADATA_KEYS => {
                return Err(invalid_argument(format!(
                    "Intercom accepts at most {MAX_METADATA_KEYS} metadata keys, `{}` has {}",
                    event.event(),
                    parameters.len()
                )));
            }
            Some(parameters) => Some(parameters.clone().into_iter().collect()),
            None => None,
        };
        self.log_event(&event.qualified_name(), metadata)
    }

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let title = self.title_for(screen);
        self.log_event(&format!("{TRACK_VIEW_PREFIX}{title}"), None)
    }

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        let Some(workspace) = self.workspace.as_mut() else {
            return Ok(());
        };
        workspace.user_id = user.identifier().to_string();

        let body = UserBody {
            user_id: user.identifier(),
            email: user.email_address(),
            name: user.full_name(),
            custom_attributes: user
                .parameters()
                .map(|parameters| parameters.clone().into_iter().collect())
                .unwrap_or_default(),
        };
        let body = serde_json::to_value(&body).map_err(|err| {
            invalid_argument(format!(
                "Intercom user `{}` is not serializable: {err}",
                user.identifier()
            ))
        })?;
        let request = workspace.request("/users").with_json(body);
        workspace.buffer.push(request);
        Ok(())
    }

    fn stop_tracking_user(&mut self, _user: &UserRecord) -> AnalyticsResult<()> {
        if !self.state.is_collecting() {
            return Ok(());
        }
        if let Some(workspace) = self.workspace.as_mut() {
            workspace.user_id = IntercomWorkspace::anonymous_id();
            trace_call(INTERCOM_PLATFORM, self.verbosity, || {
                "user logged out".to_string()
            });
        }
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(workspace) = self.workspace.as_mut() {
            workspace.buffer.flush();
        }
    }
}
