use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::auth::AccessToken;
use crate::core::{Connector, Transport};
use crate::document::Document;
use crate::error::{ClientError, GraphqlError};

/// One scripted answer of the mock transport.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Successful answer; must be a JSON object.
    Data(Value),
    /// Server-reported GraphQL error with this message.
    GraphqlError(String),
    Protocol,
    Closed,
    Server(u16),
    Unknown,
}

impl MockResponse {
    fn into_result(self) -> Result<Map<String, Value>, ClientError> {
        match self {
            Self::Data(Value::Object(data)) => Ok(data),
            Self::Data(other) => Err(ClientError::Protocol {
                message: format!("mock data is not an object: {other}"),
            }),
            Self::GraphqlError(message) => Err(ClientError::Graphql {
                errors: vec![GraphqlError { message, locations: vec![], path: vec![], extensions: None }],
            }),
            Self::Protocol => Err(ClientError::Protocol { message: "mock protocol error".to_string() }),
            Self::Closed => Err(ClientError::Closed { message: "mock connection closed".to_string() }),
            Self::Server(status) => Err(ClientError::Server {
                status: Some(status),
                message: "mock server error".to_string(),
            }),
            Self::Unknown => Err(ClientError::Unknown { message: "mock failure".to_string() }),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    script: Mutex<VecDeque<MockResponse>>,
    request_tokens: Mutex<Vec<String>>,
    connects: AtomicUsize,
}

/// Connector whose sessions replay one shared script of responses.
///
/// Clones share state, so a test can inspect connects and requests after
/// handing the connector to a client.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new(script: Vec<MockResponse>) -> Self {
        let state = MockState {
            script: Mutex::new(script.into()),
            ..MockState::default()
        };
        Self { state: Arc::new(state) }
    }

    /// Number of sessions built.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of requests sent across all sessions.
    pub fn requests(&self) -> usize {
        self.request_tokens().len()
    }

    /// Token of the session that sent each request, in order.
    pub fn request_tokens(&self) -> Vec<String> {
        self.state.request_tokens.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, _endpoint: &str, token: &AccessToken) -> Result<Box<dyn Transport>, ClientError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTransport {
            token: token.secret().to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
pub struct MockTransport {
    token: String,
    state: Arc<MockState>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(
        &self,
        _document: &Document,
        _variables: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ClientError> {
        self.state
            .request_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.token.clone());
        let next = self.state.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        next.unwrap_or(MockResponse::Unknown).into_result()
    }
}
