//! Forwards a scripted sequence of host lifecycle callbacks to the dispatcher.

use std::sync::Arc;

use analytics_relay::analytics::{
    AppInfo, BackgroundRefreshStatus, LaunchOptions, PlatformConfig, PlatformSettings,
    StaticConfigSource,
};
use analytics_relay::transport::{OutboundRequest, RequestBody, Transport};
use analytics_relay::{Analytics, AnalyticsResult, LifecycleSignal};

struct PrintTransport;

impl Transport for PrintTransport {
    fn send(&self, request: &OutboundRequest) -> AnalyticsResult<()> {
        match &request.body {
            RequestBody::Json(body) => println!("{} <- {body:#}", request.url),
            other => println!("{} <- {other:?}", request.url),
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PlatformConfig::new().with_platform(
        "Localytics",
        PlatformSettings::new().with("trackingID", "DEMO-APP-KEY"),
    );
    let mut analytics = Analytics::builder()
        .config_source(StaticConfigSource::new(config))
        .transport(Arc::new(PrintTransport))
        .app_info(AppInfo::new("2.0", "5"))
        .build()?;

    // Ignored until the dispatcher is started.
    let terminate = LifecycleSignal::WillTerminate;
    analytics.handle_lifecycle_signal(&terminate)?;

    analytics.start()?;
    let signals = [
        LifecycleSignal::DidFinishLaunching(LaunchOptions {
            url: Some("demo://open".to_string()),
            ..LaunchOptions::default()
        }),
        LifecycleSignal::DidBecomeActive,
        LifecycleSignal::BackgroundRefreshStatusDidChange(BackgroundRefreshStatus::Available),
        LifecycleSignal::ContentSizeCategoryDidChange { new_size: None },
        LifecycleSignal::WillResignActive,
        LifecycleSignal::DidEnterBackground,
        LifecycleSignal::WillEnterForeground,
        LifecycleSignal::WillTerminate,
    ];
    for signal in &signals {
        analytics.handle_lifecycle_signal(signal)?;
    }
    analytics.stop();
    Ok(())
}
