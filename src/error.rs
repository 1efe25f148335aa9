use crate::providers::ProviderKind;

/// Run-level failures. Each variant owns one process exit code, which is a
/// stable contract for the orchestration that launches the finder.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("zone '{zone}' is not part of region '{region}'")]
    ZoneNotInRegion { region: String, zone: String },
    #[error("no images matched in any of the {zones} requested zone(s)")]
    NoImagesMatched { zones: usize },
    #[error("{provider} authentication failed: {message}")]
    Authentication {
        provider: ProviderKind,
        message: String,
    },
    #[error("{provider} catalog query failed: {message}")]
    CatalogQuery {
        provider: ProviderKind,
        message: String,
    },
    #[error("provider tool '{program}' was not found on PATH")]
    ToolMissing { program: String },
    #[error("{provider} is not configured: {message}")]
    Configuration {
        provider: ProviderKind,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl FinderError {
    pub const EXIT_USAGE: i32 = 2;
    pub const EXIT_ZONE_NOT_IN_REGION: i32 = 3;
    pub const EXIT_NO_IMAGES_MATCHED: i32 = 4;
    pub const EXIT_AUTH_FAILURE: i32 = 5;
    pub const EXIT_TOOL_FAILURE: i32 = 6;
    pub const EXIT_TOOL_MISSING: i32 = 7;
    pub const EXIT_NOT_CONFIGURED: i32 = 8;
    pub const EXIT_UNKNOWN: i32 = 9;

    pub fn exit_code(&self) -> i32 {
        match self {
            FinderError::Usage(_) => Self::EXIT_USAGE,
            FinderError::ZoneNotInRegion { .. } => Self::EXIT_ZONE_NOT_IN_REGION,
            FinderError::NoImagesMatched { .. } => Self::EXIT_NO_IMAGES_MATCHED,
            FinderError::Authentication { .. } => Self::EXIT_AUTH_FAILURE,
            FinderError::CatalogQuery { .. } => Self::EXIT_TOOL_FAILURE,
            FinderError::ToolMissing { .. } => Self::EXIT_TOOL_MISSING,
            FinderError::Configuration { .. } => Self::EXIT_NOT_CONFIGURED,
            FinderError::Internal(_) => Self::EXIT_UNKNOWN,
        }
    }

    pub fn auth(provider: ProviderKind, message: impl Into<String>) -> Self {
        FinderError::Authentication {
            provider,
            message: message.into(),
        }
    }

    pub fn catalog(provider: ProviderKind, message: impl Into<String>) -> Self {
        FinderError::CatalogQuery {
            provider,
            message: message.into(),
        }
    }

    pub fn not_configured(provider: ProviderKind, message: impl Into<String>) -> Self {
        FinderError::Configuration {
            provider,
            message: message.into(),
        }
    }
}
