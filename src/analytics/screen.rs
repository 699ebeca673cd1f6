//! Screen/view tracking capability.
//!
//! Anything the host considers a screen implements [`TrackableScreen`]. Platforms ask it for a
//! stable tracking title; implementors can override [`TrackableScreen::tracking_title`] when the
//! visible title depends on content and a constant name is wanted instead.

/// A screen or view that can be reported through `track_screen`.
pub trait TrackableScreen {
    /// The screen's declared title, if any.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Name of the screen's type, used when no title is available.
    fn type_name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// The title reported to analytics platforms: the declared title when it is non-empty,
    /// the type name otherwise.
    fn tracking_title(&self) -> String {
        match self.title() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => self.type_name().to_string(),
        }
    }
}

/// A plain screen description for hosts without their own screen types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScreenView {
    title: Option<String>,
    type_name: String,
}

impl ScreenView {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            title: None,
            type_name: type_name.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl TrackableScreen for ScreenView {
    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
