//! Portage
//!
//! Multipart upload relay for S3-compatible object storage. The server half
//! exposes the protocol handshakes behind a shared-secret guard and
//! translates them into the store's multipart primitives; the client half
//! chunks a file, uploads the parts concurrently via presigned URLs, and
//! finalizes with a completion manifest.
//!
//! # Modules
//!
//! - `routes`/`auth`/`state`: the axum server surface
//! - `gateway`: the store's four multipart primitives
//! - `client`: chunker, upload coordinator, and progress aggregation
//! - `protocol`: wire types shared by both halves

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{Result, UploadError};
pub use state::AppState;
