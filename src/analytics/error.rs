use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsErrorCode {
    InvalidArgument,
    InvalidConfig,
    MissingSetting,
    UnknownPlatform,
    AlreadyInitialized,
    Internal,
    Network,
    Io,
}

impl AnalyticsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsErrorCode::InvalidArgument => "analytics/invalid-argument",
            AnalyticsErrorCode::InvalidConfig => "analytics/invalid-config",
            AnalyticsErrorCode::MissingSetting => "analytics/missing-setting",
            AnalyticsErrorCode::UnknownPlatform => "analytics/unknown-platform",
            AnalyticsErrorCode::AlreadyInitialized => "analytics/already-initialized",
            AnalyticsErrorCode::Internal => "analytics/internal",
            AnalyticsErrorCode::Network => "analytics/network",
            AnalyticsErrorCode::Io => "analytics/io",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalyticsError {
    pub code: AnalyticsErrorCode,
    message: String,
}

impl AnalyticsError {
    pub fn new(code: AnalyticsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AnalyticsError {}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

pub fn invalid_argument(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidArgument, message)
}

pub fn invalid_config(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidConfig, message)
}

pub fn missing_setting(platform: &str, key: &str) -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::MissingSetting,
        format!("{platform} requires a non-empty `{key}` setting"),
    )
}

pub fn unknown_platform(name: &str) -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::UnknownPlatform,
        format!("no analytics platform is registered under `{name}`"),
    )
}

pub fn already_initialized(platform: &str) -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::AlreadyInitialized,
        format!("{platform} has already been initialized"),
    )
}

pub fn internal_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Internal, message)
}

pub fn network_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Network, message)
}

pub fn io_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Io, message)
}
