//! An application-specific wrapper around the dispatcher, with one method per tracked action.
//!
//! Requests are printed instead of sent. Point `ANALYTICS_PLATFORM_CONFIG` at a configuration
//! file to try other platforms; without it the demo uses an in-code Mixpanel and Flurry setup.

use std::sync::Arc;

use analytics_relay::analytics::{
    AppInfo, ConfigSource, FileConfigSource, PlatformConfig, PlatformSettings, StaticConfigSource,
};
use analytics_relay::transport::{OutboundRequest, Transport};
use analytics_relay::{
    Analytics, AnalyticsResult, Category, EventRecord, TrackableScreen, UserRecord,
};

struct PrintTransport;

impl Transport for PrintTransport {
    fn send(&self, request: &OutboundRequest) -> AnalyticsResult<()> {
        println!("[{}] POST {} {:?}", request.platform, request.url, request.body);
        Ok(())
    }
}

struct SampleAnalytics {
    analytics: Analytics,
}

impl SampleAnalytics {
    fn new(config_source: impl ConfigSource + 'static) -> AnalyticsResult<Self> {
        let analytics = Analytics::builder()
            .config_source(config_source)
            .transport(Arc::new(PrintTransport))
            .app_info(AppInfo::new("1.0", "1"))
            .build()?;
        Ok(Self { analytics })
    }

    fn selected_tab_1(&mut self) -> AnalyticsResult<()> {
        self.analytics
            .track_event(&EventRecord::new(Category::View, "Selected Tab 1"))
    }

    fn selected_tab_2(&mut self) -> AnalyticsResult<()> {
        self.analytics
            .track_event(&EventRecord::new(Category::View, "Selected Tab 2"))
    }
}

struct SecondScreen;

impl TrackableScreen for SecondScreen {
    fn title(&self) -> Option<&str> {
        Some("Second")
    }
}

fn demo_config() -> PlatformConfig {
    PlatformConfig::new()
        .with_platform(
            "Mixpanel",
            PlatformSettings::new()
                .with("token", "DEMO-TOKEN")
                .with("flushInterval", 0i64),
        )
        .with_platform("Flurry", PlatformSettings::new().with("apiKey", "DEMO-KEY"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut sample = if std::env::var_os("ANALYTICS_PLATFORM_CONFIG").is_some() {
        SampleAnalytics::new(FileConfigSource::default())?
    } else {
        SampleAnalytics::new(StaticConfigSource::new(demo_config()))?
    };

    sample.analytics.start()?;
    let user = UserRecord::new("demo-user")?.with_first_name("Demo");
    sample.analytics.track_user(&user)?;
    sample.selected_tab_1()?;
    sample.analytics.track_screen(&SecondScreen)?;
    sample.selected_tab_2()?;

    sample.analytics.set_opt_out(true);
    sample.selected_tab_1()?;
    sample.analytics.set_opt_out(false);

    sample.analytics.stop();
    Ok(())
}
