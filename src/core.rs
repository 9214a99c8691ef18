//! Authenticated query client.
//!
//! [`GraphqlClient`] owns one transport session bound to a bearer token. A
//! transport-protocol error is taken as a sign that the token expired: the
//! session is rebuilt with a fresh token and the query is sent once more.
//! Every other failure is returned as is.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::auth::{AccessToken, TokenProvider};
use crate::clients::HttpConnector;
use crate::config::Settings;
use crate::document::{Document, OperationKind};
use crate::error::{ClientError, ErrorKind};

/// Network layer that sends one request and returns the `data` object of the answer.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn execute(
        &self,
        document: &Document,
        variables: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ClientError>;
}

/// Builds a transport session for an endpoint and token.
pub trait Connector: Send + Sync + Debug {
    fn connect(&self, endpoint: &str, token: &AccessToken) -> Result<Box<dyn Transport>, ClientError>;
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// The `data` object of the GraphQL response.
    pub data: Map<String, Value>,
    /// Whether the session was rebuilt with a new token during this call.
    pub reauthenticated: bool,
}

#[derive(Debug)]
pub struct GraphqlClient {
    endpoint: String,
    credentials: Box<dyn TokenProvider>,
    connector: Box<dyn Connector>,
    session: Box<dyn Transport>,
    generation: u64,
}

impl GraphqlClient {
    /// Connect to the configured endpoint over HTTP.
    pub async fn connect(settings: &Settings) -> Result<Self, ClientError> {
        let connector = HttpConnector::new(settings.timeout);
        Self::with_parts(settings.api_url.clone(), settings.credentials.provider(), Box::new(connector)).await
    }

    /// Build a client from explicit parts. Fails without creating a session
    /// when no token can be obtained.
    pub async fn with_parts(
        endpoint: impl Into<String>,
        credentials: Box<dyn TokenProvider>,
        connector: Box<dyn Connector>,
    ) -> Result<Self, ClientError> {
        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, "Creating GraphQL client");
        let session = open_session(&endpoint, credentials.as_ref(), connector.as_ref()).await?;
        Ok(Self {
            endpoint,
            credentials,
            connector,
            session,
            generation: 1,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of sessions built so far, including the initial one.
    pub fn session_generation(&self) -> u64 {
        self.generation
    }

    /// Replace the session with one bound to a newly fetched token.
    ///
    /// The current session is kept when the new one cannot be built.
    pub async fn reauthenticate(&mut self) -> Result<(), ClientError> {
        let session = open_session(&self.endpoint, self.credentials.as_ref(), self.connector.as_ref()).await?;
        self.session = session;
        self.generation += 1;
        debug!(generation = self.generation, "Rebuilt GraphQL session");
        Ok(())
    }

    /// Parse `query` and execute it with `parameters` (a JSON object, or null for none).
    ///
    /// Returns the `data` object of the response.
    #[instrument(skip(self, query, parameters), fields(endpoint = %self.endpoint))]
    pub async fn query(&mut self, query: &str, parameters: Value) -> Result<Map<String, Value>, ClientError> {
        let document = Document::parse(query).map_err(|e| {
            error!(error = %e, "Something went wrong while parsing the GraphQL query");
            e
        })?;
        let parameters = match parameters {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let err = ClientError::Document {
                    message: format!("query parameters must be a JSON object, got {other}"),
                };
                error!(error = %err, "Invalid query parameters");
                return Err(err);
            }
        };
        self.execute(&document, &parameters).await.map(|outcome| outcome.data)
    }

    /// Execute a parsed document, reauthenticating at most once on a protocol error.
    #[instrument(skip(self, document, parameters), fields(operation = document.operation_name().unwrap_or("<anonymous>")))]
    pub async fn execute(
        &mut self,
        document: &Document,
        parameters: &Map<String, Value>,
    ) -> Result<QueryOutcome, ClientError> {
        if document.kind() == OperationKind::Subscription {
            let err = ClientError::Document {
                message: "subscriptions are not supported by a request/response transport".to_string(),
            };
            error!(error = %err, "Something went wrong while sending the GraphQL query");
            return Err(err);
        }
        if let Err(err) = document.check_variables(parameters) {
            error!(error = %err, "Something went wrong while sending the GraphQL query");
            return Err(err);
        }

        let mut reauthenticated = false;
        loop {
            match self.session.execute(document, parameters).await {
                Ok(data) => {
                    info!(fields = data.len(), reauthenticated, "GraphQL query succeeded");
                    return Ok(QueryOutcome { data, reauthenticated });
                }
                Err(err) if err.kind() == ErrorKind::Protocol && !reauthenticated => {
                    warn!(error = %err, "Transport protocol error, access token may have expired; reauthenticating");
                    self.reauthenticate().await?;
                    reauthenticated = true;
                }
                Err(err) => {
                    log_failure(&err);
                    return Err(err);
                }
            }
        }
    }
}

async fn open_session(
    endpoint: &str,
    credentials: &dyn TokenProvider,
    connector: &dyn Connector,
) -> Result<Box<dyn Transport>, ClientError> {
    let token = credentials.access_token().await.map_err(|e| {
        error!(severity = "critical", error = %e, "Error getting access token");
        ClientError::Credentials(e)
    })?;
    connector.connect(endpoint, &token).map_err(|e| {
        error!(error = %e, endpoint = %endpoint, "Failed to build GraphQL transport");
        e
    })
}

fn log_failure(err: &ClientError) {
    match err {
        ClientError::Document { message } => {
            error!(detail = %message, "Something went wrong while sending the GraphQL query");
        }
        ClientError::Graphql { errors } => {
            error!(errors = ?errors, "The robot API server returned an error");
        }
        ClientError::Protocol { message } => {
            error!(
                severity = "critical",
                detail = %message,
                "Transport protocol error after reauthentication - error in configuration of GraphQL client"
            );
        }
        ClientError::Closed { message } => {
            error!(detail = %message, "The connection to the GraphQL endpoint is closed");
        }
        ClientError::Server { status, message } => {
            error!(status = ?status, detail = %message, "Error in robot API server");
        }
        ClientError::Credentials(e) => {
            error!(severity = "critical", error = %e, "Error getting access token");
        }
        ClientError::Unknown { message } => {
            error!(detail = %message, "Unknown error in GraphQL client");
        }
    }
}
