use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category used to decide whether a failed query is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The access token could not be obtained.
    Credentials,
    /// Malformed document or server-reported GraphQL error.
    Query,
    /// The transport got an answer that is not a GraphQL result (usually a rejected token).
    Protocol,
    /// The connection to the endpoint is closed or could not be opened.
    Closed,
    /// The endpoint answered with a server error status.
    Server,
    /// Anything else.
    Unknown,
}

/// Location of a GraphQL error within the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// A single entry of the `errors` list of a GraphQL response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub locations: Vec<GraphqlErrorLocation>,
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Access token error: {0}")]
    Credentials(#[from] AuthError),
    #[error("Invalid GraphQL document: {message}")]
    Document { message: String },
    #[error("GraphQL errors: {}", join_messages(.errors))]
    Graphql { errors: Vec<GraphqlError> },
    #[error("Transport protocol error: {message}")]
    Protocol { message: String },
    #[error("Connection to the GraphQL endpoint is closed: {message}")]
    Closed { message: String },
    #[error("GraphQL server error (status {status:?}): {message}")]
    Server { status: Option<u16>, message: String },
    #[error("Unknown GraphQL client error: {message}")]
    Unknown { message: String },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Credentials(_) => ErrorKind::Credentials,
            Self::Document { .. } | Self::Graphql { .. } => ErrorKind::Query,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Closed { .. } => ErrorKind::Closed,
            Self::Server { .. } => ErrorKind::Server,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// GraphQL errors reported by the server, empty for every other kind.
    pub fn graphql_errors(&self) -> &[GraphqlError] {
        match self {
            Self::Graphql { errors } => errors,
            _ => &[],
        }
    }
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Token endpoint returned status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Nothing matching {0} in response")]
    NotFound(String),
    #[error("Unexpected response shape: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}
