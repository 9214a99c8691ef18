use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::auth::AccessToken;
use crate::core::{Connector, Transport};
use crate::document::Document;
use crate::error::{AuthError, ClientError, GraphqlError};

const MAX_ERROR_BODY: usize = 4096;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

/// Builds reqwest-backed sessions with the bearer token as a default header.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    timeout: Option<Duration>,
}

impl HttpConnector {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, endpoint: &str, token: &AccessToken) -> Result<Box<dyn Transport>, ClientError> {
        let mut auth = HeaderValue::from_str(&token.bearer_header()).map_err(|_| {
            ClientError::Credentials(AuthError::MalformedResponse(
                "access token is not a valid header value".to_string(),
            ))
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ClientError::Unknown { message: e.to_string() })?;

        info!(endpoint = %endpoint, expires_at = ?token.expires_at(), "Opened GraphQL HTTP session");
        Ok(Box::new(HttpTransport { endpoint: endpoint.to_string(), client }))
    }
}

/// GraphQL over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: Client,
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, document, variables), fields(endpoint = %self.endpoint))]
    async fn execute(
        &self,
        document: &Document,
        variables: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ClientError> {
        let request = GraphqlRequest {
            query: document.source(),
            variables,
            operation_name: document.operation_name(),
        };

        debug!("Sending GraphQL request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        debug!(status = %status, "Received GraphQL response");
        let body = response.bytes().await.map_err(classify_reqwest)?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = %status, "GraphQL endpoint rejected the access token");
            return Err(ClientError::Protocol {
                message: format!("endpoint answered {status}: {}", truncate_body(&body)),
            });
        }
        if !status.is_success() {
            if let Ok(GraphqlResponse { errors: Some(errors), .. }) = serde_json::from_slice(&body) {
                if !errors.is_empty() {
                    warn!(status = %status, "GraphQL errors reported with an error status");
                    return Err(ClientError::Graphql { errors });
                }
            }
            return Err(ClientError::Server {
                status: Some(status.as_u16()),
                message: truncate_body(&body),
            });
        }

        parse_response(&body)
    }
}

/// Turn a successful HTTP body into the `data` object or a categorized error.
fn parse_response(body: &[u8]) -> Result<Map<String, Value>, ClientError> {
    let response: GraphqlResponse = serde_json::from_slice(body).map_err(|e| ClientError::Protocol {
        message: format!("server did not return a GraphQL result ({e}): {}", truncate_body(body)),
    })?;

    match (response.data, response.errors) {
        (_, Some(errors)) if !errors.is_empty() => Err(ClientError::Graphql { errors }),
        (Some(Value::Object(data)), _) => Ok(data),
        (Some(other), _) => Err(ClientError::Protocol {
            message: format!("\"data\" is not an object: {other}"),
        }),
        (None, _) => Err(ClientError::Protocol {
            message: "no \"data\" or \"errors\" in answer".to_string(),
        }),
    }
}

fn classify_reqwest(err: reqwest::Error) -> ClientError {
    let message = err.to_string();
    if err.is_connect() || err.is_body() {
        ClientError::Closed { message }
    } else {
        ClientError::Unknown { message }
    }
}

fn truncate_body(bytes: &[u8]) -> String {
    let mut body = String::from_utf8_lossy(bytes).to_string();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
