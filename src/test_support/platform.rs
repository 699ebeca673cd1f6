use std::sync::{Arc, Mutex};

use crate::analytics::config::PlatformSettings;
use crate::analytics::data::EventRecord;
use crate::analytics::error::{already_initialized, invalid_argument, AnalyticsResult};
use crate::analytics::platform::{AnalyticsPlatform, PlatformState};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::registry::PlatformComponent;

/// Shared record of every call the stub platforms receive, in arrival order.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
    events: Arc<Mutex<Vec<(String, EventRecord)>>>,
}

impl CallLog {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<(String, EventRecord)> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        self.events.lock().unwrap().clear();
    }

    fn push(&self, platform: &str, call: &str) {
        self.entries
            .lock()
            .unwrap()
            .push(format!("{platform}:{call}"));
    }
}

/// Platform that records calls instead of talking to a vendor.
pub struct StubPlatform {
    name: String,
    log: CallLog,
    state: PlatformState,
    initialized: bool,
    fail_initialize: bool,
    fail_tracking: bool,
}

impl StubPlatform {
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            state: PlatformState::default(),
            initialized: false,
            fail_initialize: false,
            fail_tracking: false,
        }
    }

    pub fn component(name: &str, log: &CallLog) -> PlatformComponent {
        Self::component_named(name, name, log)
    }

    /// Registers under `registered` a stub reporting itself as `name`.
    pub fn component_named(registered: &str, name: &str, log: &CallLog) -> PlatformComponent {
        let log = log.clone();
        let name = name.to_string();
        PlatformComponent::new(registered, move |_| {
            Box::new(StubPlatform::new(name.clone(), &log))
        })
    }

    pub fn failing_initialize_component(name: &str, log: &CallLog) -> PlatformComponent {
        let log = log.clone();
        let name = name.to_string();
        PlatformComponent::new(name.clone(), move |_| {
            let mut stub = StubPlatform::new(name.clone(), &log);
            stub.fail_initialize = true;
            Box::new(stub)
        })
    }

    pub fn failing_tracking_component(name: &str, log: &CallLog) -> PlatformComponent {
        let log = log.clone();
        let name = name.to_string();
        PlatformComponent::new(name.clone(), move |_| {
            let mut stub = StubPlatform::new(name.clone(), &log);
            stub.fail_tracking = true;
            Box::new(stub)
        })
    }

    fn tracking_result(&self) -> AnalyticsResult<()> {
        if self.fail_tracking {
            return Err(invalid_argument(format!("{} refused the call", self.name)));
        }
        Ok(())
    }
}

impl AnalyticsPlatform for StubPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, _settings: &PlatformSettings) -> AnalyticsResult<()> {
        if self.initialized {
            return Err(already_initialized(&self.name));
        }
        self.log.push(&self.name, "initialize");
        if self.fail_initialize {
            return Err(invalid_argument(format!("{} cannot initialize", self.name)));
        }
        self.initialized = true;
        Ok(())
    }

    fn start(&mut self) {
        self.log.push(&self.name, "start");
        self.state.begin();
    }

    fn stop(&mut self) {
        self.log.push(&self.name, "stop");
        self.state.end();
    }

    fn is_started(&self) -> bool {
        self.state.is_started()
    }

    fn opt_out(&self) -> bool {
        self.state.opt_out()
    }

    fn set_opt_out(&mut self, opt_out: bool) {
        self.log.push(&self.name, &format!("opt_out={opt_out}"));
        self.state.set_opt_out(opt_out);
    }

    fn track_event(&mut self, event: &EventRecord) -> AnalyticsResult<()> {
        self.log.push(&self.name, "track_event");
        self.log
            .events
            .lock()
            .unwrap()
            .push((self.name.clone(), event.clone()));
        self.tracking_result()
    }

    fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        let title = self.title_for(screen);
        self.log.push(&self.name, &format!("track_screen:{title}"));
        self.tracking_result()
    }

    fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        self.log
            .push(&self.name, &format!("track_user:{}", user.identifier()));
        self.tracking_result()
    }

    fn stop_tracking_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        let entry = format!("stop_tracking_user:{}", user.identifier());
        self.log.push(&self.name, &entry);
        self.tracking_result()
    }

    fn flush(&mut self) {
        self.log.push(&self.name, "flush");
    }
}
