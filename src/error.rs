use crate::settings::SAMPLE_CONFIG;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(
        "Bad config ({message})! Ensure your file matches the following sample:\n\
         -----------SAMPLE START-----------\n{sample}\n-----------SAMPLE END-----------",
        sample = SAMPLE_CONFIG.trim()
    )]
    Config { message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Token signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Config parse error: {0}")]
    Ini(#[from] ini::ParseError),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Config {
            message: message.into(),
        }
    }
}
