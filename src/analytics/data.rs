use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// JSON-compatible parameters attached to an event or a user.
pub type Parameters = BTreeMap<String, Value>;

/// Event categories used to organise tracked events.
///
/// Platforms with a native category concept (Google Analytics) forward it as such; the others
/// fold it into the event name as `"<category> - <event>"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Share sheets and other activity pickers.
    Activity,
    /// Host application lifecycle.
    Application,
    /// Catch-all.
    General,
    /// Views appearing and user navigation.
    View,
    /// Errors logged as events.
    Error,
    /// In-app settings.
    Settings,
    /// The user shared something.
    Sharing,
    /// Support interactions such as contacting support.
    Support,
    /// Built-in version checking.
    VersionCheck,
    /// Any caller-defined category.
    Custom(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Activity => "Activity",
            Category::Application => "Application",
            Category::General => "General",
            Category::View => "View",
            Category::Error => "Error",
            Category::Settings => "Settings",
            Category::Sharing => "Sharing",
            Category::Support => "Support",
            Category::VersionCheck => "VersionCheck",
            Category::Custom(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        match value {
            "Activity" => Category::Activity,
            "Application" => Category::Application,
            "General" => Category::General,
            "View" => Category::View,
            "Error" => Category::Error,
            "Settings" => Category::Settings,
            "Sharing" => Category::Sharing,
            "Support" => Category::Support,
            "VersionCheck" => Category::VersionCheck,
            other => Category::Custom(other.to_string()),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from(value.as_str())
    }
}

/// A single tracked occurrence: category, event name and optional parameters.
///
/// Records are built at the call site, handed to [`crate::analytics::Analytics::track_event`]
/// and dropped once every platform has seen them.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    category: Category,
    event: String,
    parameters: Option<Parameters>,
}

impl EventRecord {
    pub fn new(category: impl Into<Category>, event: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            event: event.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// The event parameters, or `None` when there are none. An empty map is reported as `None`
    /// so platforms never have to tell the two apart.
    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref().filter(|params| !params.is_empty())
    }

    /// `"<category> - <event>"`, the name used by platforms without native categories.
    pub fn qualified_name(&self) -> String {
        format!("{} - {}", self.category, self.event)
    }
}
