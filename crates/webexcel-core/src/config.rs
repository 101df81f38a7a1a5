//! Configuration module
//!
//! Server and upload-adapter settings read from the environment (and a
//! `.env` file when present).

use std::env;

use crate::encoding::{Transcoder, DEFAULT_SOURCE_ENCODING, DEFAULT_TARGET_ENCODING};

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_FIELD_NAME: &str = "file";
const DEFAULT_SERVICE_NAME: &str = "webexcel";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub service_name: String,
    /// Multipart field read when a request does not name one.
    pub default_field_name: String,
    /// `None` when uploads are handed to the parser untouched.
    pub transcoder: Option<Transcoder>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            environment: "development".to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            default_field_name: DEFAULT_FIELD_NAME.to_string(),
            transcoder: Some(Transcoder::default()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let transcode_enabled = env::var("EXCEL_TRANSCODE_ENABLED")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let transcoder = if transcode_enabled {
            let source = env::var("EXCEL_SOURCE_ENCODING")
                .unwrap_or_else(|_| DEFAULT_SOURCE_ENCODING.to_string());
            let target = env::var("EXCEL_TARGET_ENCODING")
                .unwrap_or_else(|_| DEFAULT_TARGET_ENCODING.to_string());
            let transcoder = Transcoder::from_labels(&source, &target).map_err(|e| {
                anyhow::anyhow!("EXCEL_SOURCE_ENCODING/EXCEL_TARGET_ENCODING: {}", e)
            })?;
            Some(transcoder)
        } else {
            None
        };

        let default_field_name = env::var("EXCEL_FIELD_NAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FIELD_NAME.to_string());

        Ok(Self {
            server_port,
            environment,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
            default_field_name,
            transcoder,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
