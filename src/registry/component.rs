use std::fmt;
use std::sync::Arc;

use crate::analytics::platform::{AnalyticsPlatform, PlatformContext};

pub type PlatformFactory =
    Arc<dyn Fn(&PlatformContext) -> Box<dyn AnalyticsPlatform> + Send + Sync>;

/// A named platform factory.
#[derive(Clone)]
pub struct PlatformComponent {
    name: Arc<str>,
    factory: PlatformFactory,
}

impl PlatformComponent {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PlatformContext) -> Box<dyn AnalyticsPlatform> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn instantiate(&self, context: &PlatformContext) -> Box<dyn AnalyticsPlatform> {
        (self.factory)(context)
    }
}

impl fmt::Debug for PlatformComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformComponent")
            .field("name", &self.name)
            .finish()
    }
}
