use crate::analytics::data::Parameters;
use crate::analytics::error::{invalid_argument, AnalyticsResult};

/// Identity of the user whose activity is being tracked.
#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    identifier: String,
    first_name: Option<String>,
    last_name: Option<String>,
    full_name: Option<String>,
    email_address: Option<String>,
    parameters: Option<Parameters>,
}

impl UserRecord {
    /// Creates a user record for `identifier`, which must not be blank.
    pub fn new(identifier: impl Into<String>) -> AnalyticsResult<Self> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(invalid_argument("User identifier must not be empty"));
        }
        Ok(Self {
            identifier,
            first_name: None,
            last_name: None,
            full_name: None,
            email_address: None,
            parameters: None,
        })
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    /// Overrides the full name otherwise derived from the first and last names.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_email_address(mut self, email_address: impl Into<String>) -> Self {
        self.email_address = Some(email_address.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// The explicit full name, or the first and last names joined by a space.
    pub fn full_name(&self) -> Option<String> {
        if let Some(full_name) = &self.full_name {
            return Some(full_name.clone());
        }
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn email_address(&self) -> Option<&str> {
        self.email_address.as_deref()
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref().filter(|params| !params.is_empty())
    }
}
