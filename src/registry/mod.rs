//! Registry resolving configuration type-names to platform factories.
//!
//! Each entry of the configuration document names a platform type. The registry maps those
//! names to factory closures registered up front, so no runtime type lookup is involved.

mod component;

pub use component::{PlatformComponent, PlatformFactory};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::analytics::constants::{
    FLURRY_PLATFORM, GOOGLE_ANALYTICS_PLATFORM, INTERCOM_PLATFORM, LOCALYTICS_PLATFORM,
    MIXPANEL_PLATFORM,
};
use crate::analytics::error::{unknown_platform, AnalyticsResult};
use crate::analytics::platform::{AnalyticsPlatform, PlatformContext};
use crate::platforms::{
    FlurryPlatform, GoogleAnalyticsPlatform, IntercomPlatform, LocalyticsPlatform, MixpanelPlatform,
};

#[derive(Clone, Default)]
pub struct PlatformRegistry {
    components: HashMap<Arc<str>, PlatformComponent>,
}

impl PlatformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the five bundled vendor platforms.
    pub fn with_builtin_platforms() -> Self {
        let mut registry = Self::new();
        registry.register(PlatformComponent::new(FLURRY_PLATFORM, |context| {
            Box::new(FlurryPlatform::new(context))
        }));
        registry.register(PlatformComponent::new(GOOGLE_ANALYTICS_PLATFORM, |context| {
            Box::new(GoogleAnalyticsPlatform::new(context))
        }));
        registry.register(PlatformComponent::new(MIXPANEL_PLATFORM, |context| {
            Box::new(MixpanelPlatform::new(context))
        }));
        registry.register(PlatformComponent::new(INTERCOM_PLATFORM, |context| {
            Box::new(IntercomPlatform::new(context))
        }));
        registry.register(PlatformComponent::new(LOCALYTICS_PLATFORM, |context| {
            Box::new(LocalyticsPlatform::new(context))
        }));
        registry
    }

    /// Registers `component`. Returns `false`, keeping the existing entry, when the name is
    /// already taken.
    pub fn register(&mut self, component: PlatformComponent) -> bool {
        if self.components.contains_key(component.name()) {
            log::warn!(
                "analytics platform `{}` is already registered; keeping the existing factory",
                component.name()
            );
            return false;
        }
        self.components
            .insert(Arc::from(component.name().to_owned()), component);
        true
    }

    /// Registers `component`, replacing any existing entry with the same name.
    pub fn register_or_replace(&mut self, component: PlatformComponent) {
        self.components
            .insert(Arc::from(component.name().to_owned()), component);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(|name| name.as_ref()).collect();
        names.sort_unstable();
        names
    }

    /// Builds an uninitialized platform of type `name`.
    pub fn create(
        &self,
        name: &str,
        context: &PlatformContext,
    ) -> AnalyticsResult<Box<dyn AnalyticsPlatform>> {
        let component = self
            .components
            .get(name)
            .ok_or_else(|| unknown_platform(name))?;
        Ok(component.instantiate(context))
    }
}

impl fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::platform::AppInfo;
    use crate::test_support::{CallLog, RecordingTransport, StubPlatform};

    fn context() -> PlatformContext {
        PlatformContext::new(RecordingTransport::shared(), AppInfo::default())
    }

    #[test]
    fn builtin_registry_knows_all_vendors() {
        let registry = PlatformRegistry::with_builtin_platforms();
        assert_eq!(
            registry.names(),
            [
                "Flurry",
                "GoogleAnalytics",
                "Intercom",
                "Localytics",
                "Mixpanel"
            ]
        );
        let platform = registry.create("Mixpanel", &context()).unwrap();
        assert_eq!(platform.name(), "Mixpanel");
        assert!(!platform.is_started());
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = PlatformRegistry::with_builtin_platforms();
        let Err(err) = registry.create("Amplitude", &context()) else {
            panic!("Amplitude is not a bundled platform");
        };
        assert_eq!(err.code_str(), "analytics/unknown-platform");
    }

    #[test]
    fn duplicate_registration_keeps_first_factory() {
        let log = CallLog::default();
        let mut registry = PlatformRegistry::new();
        assert!(registry.register(StubPlatform::component("Stub", &log)));
        assert!(!registry.register(PlatformComponent::new("Stub", |context| {
            Box::new(MixpanelPlatform::new(context))
        })));

        let platform = registry.create("Stub", &context()).unwrap();
        assert_eq!(platform.name(), "Stub");
    }

    #[test]
    fn register_or_replace_swaps_factory() {
        let log = CallLog::default();
        let mut registry = PlatformRegistry::with_builtin_platforms();
        let replacement = StubPlatform::component_named("Mixpanel", "Mixpanel", &log);
        registry.register_or_replace(replacement);
        let mut platform = registry.create("Mixpanel", &context()).unwrap();
        platform.start();
        assert_eq!(log.entries(), ["Mixpanel:start"]);
    }
}
