use super::*;
use crate::types::ToolDefinition;
use anyhow::Result;
use axum::http::{HeaderMap, StatusCode};
use axum::{response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

// Test scenario definition
#[derive(Clone)]
struct TestCase {
    name: String,
    request: LLMRequest,
    server_response: serde_json::Value,
    expected_response: LLMResponse,
}

impl TestCase {
    fn text_only() -> Self {
        Self {
            name: "Simple text response".to_string(),
            request: LLMRequest {
                messages: vec![Message::new_user("Hello")],
                tools: None,
                max_tokens: 1024,
            },
            server_response: json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [{
                    "type": "text",
                    "text": "Hi! How can I help you today?"
                }],
                "stop_reason": "end_turn",
                "usage": {
                    "input_tokens": 10,
                    "output_tokens": 8
                }
            }),
            expected_response: LLMResponse {
                content: vec![ContentBlock::new_text("Hi! How can I help you today?")],
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 8,
                },
            },
        }
    }

    fn with_tool() -> Self {
        Self {
            name: "Tool use response".to_string(),
            request: LLMRequest {
                messages: vec![Message::new_user("Find papers about quantum computing")],
                tools: Some(vec![ToolDefinition {
                    name: "search_papers".to_string(),
                    description: "Search arXiv".to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "topic": {"type": "string"}
                        },
                        "required": ["topic"]
                    }),
                }]),
                max_tokens: 2048,
            },
            server_response: json!({
                "content": [
                    {"type": "text", "text": "Let me search."},
                    {
                        "type": "tool_use",
                        "id": "toolu_01",
                        "name": "search_papers",
                        "input": {"topic": "quantum computing"}
                    }
                ],
                "stop_reason": "tool_use",
                "usage": {
                    "input_tokens": 15,
                    "output_tokens": 12
                }
            }),
            expected_response: LLMResponse {
                content: vec![
                    ContentBlock::new_text("Let me search."),
                    ContentBlock::new_tool_use(
                        "toolu_01",
                        "search_papers",
                        json!({"topic": "quantum computing"}),
                    ),
                ],
                usage: Usage {
                    input_tokens: 15,
                    output_tokens: 12,
                },
            },
        }
    }
}

#[derive(Clone, Default)]
struct CapturedRequests {
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    headers: Arc<Mutex<Vec<HeaderMap>>>,
}

async fn serve(app: Router) -> String {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", server_addr)
}

async fn create_mock_server(response: serde_json::Value, captured: CapturedRequests) -> String {
    let app = Router::new().route(
        "/*path",
        post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
            let response = response.clone();
            let captured = captured.clone();
            async move {
                captured.bodies.lock().unwrap().push(body);
                captured.headers.lock().unwrap().push(headers);
                Json(response)
            }
        }),
    );
    serve(app).await
}

async fn create_error_server(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route(
        "/*path",
        post(move || async move { (status, body).into_response() }),
    );
    serve(app).await
}

#[tokio::test]
async fn test_anthropic_provider() -> Result<()> {
    for case in [TestCase::text_only(), TestCase::with_tool()] {
        println!("Running Anthropic test case: {}", case.name);

        let captured = CapturedRequests::default();
        let base_url = create_mock_server(case.server_response.clone(), captured.clone()).await;
        let mut client = AnthropicClient::new(
            "test-key".to_string(),
            "claude-3-haiku-20240307".to_string(),
            base_url,
        );

        let response = client.send_message(case.request.clone()).await?;

        assert_eq!(response.content, case.expected_response.content);
        assert_eq!(response.usage, case.expected_response.usage);

        let bodies = captured.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["max_tokens"], case.request.max_tokens);
        assert_eq!(
            bodies[0]["tools"].as_array().map(|t| t.len()).unwrap_or(0),
            case.request.tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        let headers = captured.headers.lock().unwrap();
        assert_eq!(headers[0]["x-api-key"], "test-key");
        assert_eq!(headers[0]["anthropic-version"], "2023-06-01");
    }

    Ok(())
}

#[tokio::test]
async fn test_error_status_mapping() {
    let cases = [
        (StatusCode::UNAUTHORIZED, "Authentication failed"),
        (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
        (StatusCode::BAD_REQUEST, "Invalid request"),
        (StatusCode::INTERNAL_SERVER_ERROR, "Service error"),
        (StatusCode::NOT_FOUND, "Unknown error"),
    ];

    for (status, expected_prefix) in cases {
        let base_url = create_error_server(status, "{\"error\":\"nope\"}").await;
        let mut client =
            AnthropicClient::new("bad-key".to_string(), "claude-3".to_string(), base_url);

        let error = client
            .send_message(TestCase::text_only().request)
            .await
            .expect_err("request should fail");

        let api_error = error
            .downcast_ref::<ApiError>()
            .expect("error should be an ApiError");
        let message = api_error.to_string();
        assert!(
            message.starts_with(expected_prefix),
            "status {status}: unexpected message {message}"
        );
        assert!(message.contains("nope"));
    }
}

#[tokio::test]
async fn test_connection_failure_is_network_error() {
    // Nothing listens on this port once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = AnthropicClient::new(
        "test-key".to_string(),
        "claude-3".to_string(),
        format!("http://{addr}"),
    );
    let error = client
        .send_message(TestCase::text_only().request)
        .await
        .expect_err("request should fail");

    assert!(matches!(
        error.downcast_ref::<ApiError>(),
        Some(ApiError::NetworkError(_))
    ));
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let base_url = create_error_server(StatusCode::OK, "not json").await;
    let mut client = AnthropicClient::new("k".to_string(), "claude-3".to_string(), base_url);

    let error = client
        .send_message(TestCase::text_only().request)
        .await
        .expect_err("request should fail");
    assert!(error.to_string().contains("Failed to parse response"));
}
