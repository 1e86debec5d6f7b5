//! Configuration management for the Portage server
//!
//! Everything is loaded from the environment once at startup and passed
//! explicitly into the gateway and access guard at construction time; no
//! module reads ambient global state.

use serde::Deserialize;
use std::env;

/// Default folder prefix for uploaded objects
pub const DEFAULT_UPLOAD_FOLDER: &str = "uploads";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Optional custom endpoint (MinIO and other S3-compatible services)
    pub endpoint: Option<String>,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Shared secret checked against the `x-pass` header on every request
    pub upload_key: String,

    /// Folder prefix for object keys: `<folder>/<fileName>`
    pub folder: String,

    /// File count limit for the simple (non-multipart) upload path
    pub max_file_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3005,
            },
            storage: StorageConfig {
                endpoint: None,
                bucket: "uploads".to_string(),
                access_key: String::new(),
                secret_key: String::new(),
                region: Some("us-east-1".to_string()),
            },
            upload: UploadConfig {
                upload_key: String::new(),
                folder: DEFAULT_UPLOAD_FOLDER.to_string(),
                max_file_count: 1,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3005".to_string())
                    .parse()
                    .unwrap_or(3005),
            },
            storage: StorageConfig {
                endpoint: env::var("S3_ENDPOINT").ok(),
                bucket: env::var("AWS_BUCKET")?,
                access_key: env::var("AWS_ACCESS_KEY_ID")?,
                secret_key: env::var("AWS_SECRET_ACCESS_KEY")?,
                region: env::var("AWS_REGION").ok(),
            },
            upload: UploadConfig {
                upload_key: env::var("UPLOAD_KEY")?,
                folder: env::var("UPLOAD_FOLDER")
                    .unwrap_or_else(|_| DEFAULT_UPLOAD_FOLDER.to_string()),
                max_file_count: env::var("MAX_FILE_COUNT")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
            },
        })
    }

    /// Object key convention: `<folder>/<fileName>`
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.upload.folder, file_name)
    }
}
