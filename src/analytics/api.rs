use std::fmt;
use std::sync::Arc;

use crate::analytics::config::{ConfigSource, FileConfigSource};
use crate::analytics::data::EventRecord;
use crate::analytics::error::{internal_error, invalid_config, AnalyticsResult};
use crate::analytics::lifecycle::LifecycleSignal;
use crate::analytics::platform::{AnalyticsPlatform, AppInfo, PlatformContext};
use crate::analytics::screen::TrackableScreen;
use crate::analytics::user::UserRecord;
use crate::registry::PlatformRegistry;
use crate::transport::{HttpTransport, Transport};

/// Fans every tracking call out to the configured platforms.
///
/// Platforms are built from the [`ConfigSource`] on [`Analytics::start`] and receive every call
/// in configuration order. The value is meant to be owned by the application's composition root
/// and passed by reference to whatever needs to track.
pub struct Analytics {
    config_source: Box<dyn ConfigSource>,
    registry: PlatformRegistry,
    context: PlatformContext,
    platforms: Vec<Box<dyn AnalyticsPlatform>>,
    started: bool,
}

impl fmt::Debug for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("platforms", &self.platform_names())
            .field("started", &self.started)
            .finish()
    }
}

/// Builder for [`Analytics`].
///
/// Defaults to the bundled platforms, an HTTP transport and the configuration file found by
/// [`FileConfigSource::default`].
#[derive(Default)]
pub struct AnalyticsBuilder {
    config_source: Option<Box<dyn ConfigSource>>,
    registry: Option<PlatformRegistry>,
    transport: Option<Arc<dyn Transport>>,
    app_info: Option<AppInfo>,
}

impl AnalyticsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.config_source = Some(Box::new(source));
        self
    }

    pub fn registry(mut self, registry: PlatformRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn app_info(mut self, app_info: AppInfo) -> Self {
        self.app_info = Some(app_info);
        self
    }

    /// Fails only when the default HTTP transport cannot be constructed.
    pub fn build(self) -> AnalyticsResult<Analytics> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };
        let config_source = self
            .config_source
            .unwrap_or_else(|| Box::new(FileConfigSource::default()) as Box<dyn ConfigSource>);
        let context = PlatformContext::new(transport, self.app_info.unwrap_or_default());
        Ok(Analytics {
            config_source,
            registry: self
                .registry
                .unwrap_or_else(PlatformRegistry::with_builtin_platforms),
            context,
            platforms: Vec::new(),
            started: false,
        })
    }
}

impl Analytics {
    pub fn builder() -> AnalyticsBuilder {
        AnalyticsBuilder::new()
    }

    /// Loads the configuration, builds and initializes every platform, then starts them.
    ///
    /// Does nothing when already started. If any platform cannot be built or initialized, none
    /// are kept and the error is returned.
    pub fn start(&mut self) -> AnalyticsResult<()> {
        if self.started {
            log::debug!("analytics already started");
            return Ok(());
        }
        if !self.platforms.is_empty() {
            return Err(internal_error(
                "platform list must be empty before the dispatcher starts",
            ));
        }

        let config = self.config_source.load()?;
        if config.is_empty() {
            return Err(invalid_config("configuration names no analytics platforms"));
        }

        for (name, settings) in config.iter() {
            let built = self.registry.create(name, &self.context).and_then(|mut platform| {
                platform.initialize(settings)?;
                Ok(platform)
            });
            match built {
                Ok(platform) => {
                    log::debug!("initialized analytics platform {name}");
                    self.platforms.push(platform);
                }
                Err(err) => {
                    log::warn!("failed to set up analytics platform {name}: {err}");
                    self.platforms.clear();
                    return Err(err);
                }
            }
        }

        for platform in &mut self.platforms {
            platform.start();
        }
        self.started = true;
        log::info!("analytics started with {:?}", self.platform_names());
        Ok(())
    }

    /// Stops every platform, flushing what they buffered, and discards them.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for platform in &mut self.platforms {
            platform.stop();
        }
        self.platforms.clear();
        self.started = false;
        log::info!("analytics stopped");
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Type-names of the live platforms, in dispatch order.
    pub fn platform_names(&self) -> Vec<&str> {
        self.platforms
            .iter()
            .map(|platform| platform.name())
            .collect()
    }

    /// Opts every platform in or out. The dispatcher's own state is unaffected.
    pub fn set_opt_out(&mut self, opt_out: bool) {
        log::debug!("setting analytics opt-out to {opt_out}");
        for platform in &mut self.platforms {
            platform.set_opt_out(opt_out);
        }
    }

    pub fn track_event(&mut self, event: &EventRecord) -> AnalyticsResult<()> {
        for platform in &mut self.platforms {
            platform.track_event(event)?;
        }
        Ok(())
    }

    pub fn track_screen(&mut self, screen: &dyn TrackableScreen) -> AnalyticsResult<()> {
        for platform in &mut self.platforms {
            platform.track_screen(screen)?;
        }
        Ok(())
    }

    pub fn track_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        for platform in &mut self.platforms {
            platform.track_user(user)?;
        }
        Ok(())
    }

    pub fn stop_tracking_user(&mut self, user: &UserRecord) -> AnalyticsResult<()> {
        for platform in &mut self.platforms {
            platform.stop_tracking_user(user)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) {
        for platform in &mut self.platforms {
            platform.flush();
        }
    }

    /// Records a host lifecycle transition as an `Application` event.
    ///
    /// The dispatcher listens for signals only while started; others are ignored.
    pub fn handle_lifecycle_signal(&mut self, signal: &LifecycleSignal) -> AnalyticsResult<()> {
        if !self.started {
            log::debug!("ignoring lifecycle signal {}", signal.event_name());
            return Ok(());
        }
        self.track_event(&signal.to_event())
    }
}

impl Drop for Analytics {
    fn drop(&mut self) {
        self.stop();
    }
}
