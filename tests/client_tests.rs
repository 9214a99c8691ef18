
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use robot_graphql::api::MISSION_REPORTS_QUERY;
use robot_graphql::auth::{ClientCredentials, ClientCredentialsConfig, MockTokenProvider};
use robot_graphql::clients::HttpConnector;
use robot_graphql::{ClientError, Document, ErrorKind, GraphqlClient, RobotApi};

use crate::test_utils::{graphql_url, http_client, load_fixture, GRAPHQL_PATH};

const ROBOTS: &str = "query robots { robots { id name } }";

fn graphql_ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

#[tokio::test]
async fn sends_bearer_token_and_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("authorization", "Bearer t1"))
        .and(body_partial_json(json!({
            "operationName": "missionReports",
            "variables": { "robotId": "robot-7" },
        })))
        .respond_with(graphql_ok(load_fixture("mission_report_response.json")))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1"]);
    let mut api = RobotApi::new(http_client(&server, &tokens).await.unwrap());
    let report_id = api.latest_mission_report_id("robot-7").await.unwrap();
    assert_eq!(report_id, "606dd56c023c8866b43f7f7e");
}

#[tokio::test]
async fn expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer expired"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(graphql_ok(json!({ "robots": [{ "id": "r1", "name": "spot" }] })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["expired", "fresh"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let outcome = client
        .execute(&Document::parse(ROBOTS).unwrap(), &serde_json::Map::new())
        .await
        .unwrap();

    assert!(outcome.reauthenticated);
    assert_eq!(outcome.data["robots"][0]["name"], "spot");
    assert_eq!(tokens.calls(), 2);
    assert_eq!(client.session_generation(), 2);
}

#[tokio::test]
async fn persistent_rejection_stops_after_one_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(2)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1", "t2", "t3"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let err = client.query(ROBOTS, Value::Null).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(tokens.calls(), 2);
}

#[tokio::test]
async fn non_graphql_answer_triggers_reauthentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>please log in</html>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer renewed"))
        .respond_with(graphql_ok(json!({ "robots": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["stale", "renewed"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let data = client.query(ROBOTS, Value::Null).await.unwrap();
    assert_eq!(data["robots"], json!([]));
}

#[tokio::test]
async fn graphql_errors_are_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{
                "message": "Cannot query field \"robots\" on type \"Query\".",
                "locations": [{ "line": 1, "column": 16 }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1", "t2"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let err = client.query(ROBOTS, Value::Null).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Query);
    let errors = err.graphql_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].locations[0].column, 16);
    assert_eq!(tokens.calls(), 1);
}

#[tokio::test]
async fn server_errors_are_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1", "t2"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let err = client.query(ROBOTS, Value::Null).await.unwrap_err();

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, Some(502));
            assert_eq!(message, "bad gateway");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    assert_eq!(tokens.calls(), 1);
}

#[tokio::test]
async fn graphql_errors_with_error_status_keep_query_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "message": "Variable \"$robotId\" got invalid value" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1", "t2"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let err = client.query(ROBOTS, Value::Null).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Query);
    assert_eq!(err.graphql_errors().len(), 1);
    assert!(err.graphql_errors()[0].message.contains("$robotId"));
    assert_eq!(tokens.calls(), 1);
}

#[tokio::test]
async fn error_status_without_graphql_errors_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "errors": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1"]);
    let mut client = http_client(&server, &tokens).await.unwrap();
    let err = client.query(ROBOTS, Value::Null).await.unwrap_err();

    assert!(matches!(err, ClientError::Server { status: Some(400), .. }));
}

#[tokio::test]
async fn refused_connection_is_closed_error() {
    let tokens = MockTokenProvider::new(["t1", "t2"]);
    let mut client = GraphqlClient::with_parts(
        "http://127.0.0.1:9/graphql",
        Box::new(tokens.clone()),
        Box::new(HttpConnector::default()),
    )
    .await
    .unwrap();

    let err = client.query(ROBOTS, Value::Null).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Closed);
    assert_eq!(tokens.calls(), 1);
}

#[tokio::test]
async fn client_credentials_token_is_used_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=fleet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "issued-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("authorization", "Bearer issued-token"))
        .respond_with(graphql_ok(json!({ "robots": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ClientCredentials::new(ClientCredentialsConfig {
        token_url: format!("{}/oauth/token", server.uri()),
        client_id: "fleet".to_string(),
        client_secret: "s3cret".to_string(),
        scope: None,
        audience: None,
    });
    let mut client = GraphqlClient::with_parts(graphql_url(&server), Box::new(provider), Box::new(HttpConnector::default()))
        .await
        .unwrap();
    assert!(client.query(ROBOTS, Value::Null).await.is_ok());
}

#[tokio::test]
async fn rejected_credentials_fail_construction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_client" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(graphql_ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let provider = ClientCredentials::new(ClientCredentialsConfig {
        token_url: format!("{}/oauth/token", server.uri()),
        client_id: "fleet".to_string(),
        client_secret: "wrong".to_string(),
        scope: Some("robots".to_string()),
        audience: None,
    });
    let result = GraphqlClient::with_parts(graphql_url(&server), Box::new(provider), Box::new(HttpConnector::default())).await;

    assert!(matches!(result, Err(ClientError::Credentials(_))));
}

#[tokio::test]
async fn built_in_report_query_reaches_the_server_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "query": MISSION_REPORTS_QUERY })))
        .respond_with(graphql_ok(json!({ "missionReports": { "page": { "edges": [] } } })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = MockTokenProvider::new(["t1"]);
    let mut api = RobotApi::new(http_client(&server, &tokens).await.unwrap());
    let err = api.latest_mission_report_id("robot-1").await.unwrap_err();
    assert!(err.to_string().contains("mission reports"));
}
