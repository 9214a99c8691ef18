pub mod api;
pub mod auth;
pub mod clients;
pub mod config;
pub mod core;
pub mod document;
pub mod error;
pub mod extract;

// Convenient re-exports
pub use api::RobotApi;
pub use config::Settings;
pub use core::{GraphqlClient, QueryOutcome};
pub use document::Document;
pub use error::{ClientError, ErrorKind};
