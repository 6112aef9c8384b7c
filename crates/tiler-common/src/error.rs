//! Error types for the band tiler.

use thiserror::Error;

/// Result type alias using TilerError.
pub type TilerResult<T> = Result<T, TilerError>;

/// Primary error type for tile operations.
#[derive(Debug, Error)]
pub enum TilerError {
    // === Request Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown ratio: {0}")]
    UnknownRatio(String),

    #[error("Unknown colormap: {0}")]
    UnknownColormap(String),

    #[error("Invalid expression: {0}")]
    Expression(String),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    // === Data Errors ===
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Band {band} not found for scene {scene}")]
    BandNotFound { scene: String, band: String },

    #[error("Tile {0} is outside the scene bounds")]
    TileOutsideBounds(String),

    #[error("Failed to read data: {0}")]
    DataReadError(String),

    // === Rendering Errors ===
    #[error("Encoding failed: {0}")]
    EncodeError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Request timeout")]
    Timeout,
}

impl TilerError {
    /// Shorthand for an invalid parameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        TilerError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable code for this error, used in JSON error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            TilerError::Validation(_) => "ValidationError",
            TilerError::MissingParameter(_) => "MissingParameterValue",
            TilerError::InvalidParameter { .. } => "InvalidParameterValue",
            TilerError::UnknownRatio(_) => "UnknownRatioError",
            TilerError::UnknownColormap(_) => "UnknownColormapError",
            TilerError::Expression(_) => "ExpressionError",
            TilerError::UnsupportedFormat(_) => "InvalidFormat",
            TilerError::SceneNotFound(_) => "SceneNotFoundError",
            TilerError::BandNotFound { .. } => "BandNotFoundError",
            TilerError::TileOutsideBounds(_) => "TileOutsideBounds",
            TilerError::Timeout => "Timeout",
            _ => "NoApplicableCode",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TilerError::Validation(_)
            | TilerError::MissingParameter(_)
            | TilerError::InvalidParameter { .. }
            | TilerError::UnknownRatio(_)
            | TilerError::UnknownColormap(_)
            | TilerError::Expression(_)
            | TilerError::UnsupportedFormat(_) => 400,

            TilerError::SceneNotFound(_)
            | TilerError::BandNotFound { .. }
            | TilerError::TileOutsideBounds(_) => 404,

            TilerError::Timeout => 504,

            _ => 500,
        }
    }

    /// Whether the error was caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }
}

impl From<std::io::Error> for TilerError {
    fn from(err: std::io::Error) -> Self {
        TilerError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for TilerError {
    fn from(err: serde_json::Error) -> Self {
        TilerError::InternalError(format!("JSON error: {}", err))
    }
}
