use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tern::config::ChatCompletionConfig;
use tern::connector::ChatCompletion;
use tern::errors::ToolResult;
use tern::models::content::Content;
use tern::models::message::{Message, MessageContent};
use tern::models::tool::{Tool, ToolCall};
use tern::plugins::{Plugin, PluginRegistry};
use tern::settings::{ExecutionSettings, ToolCallBehavior};

struct WeatherPlugin {
    tools: Vec<Tool>,
}

impl WeatherPlugin {
    fn new() -> Self {
        Self {
            tools: vec![Tool::new(
                "get_forecast",
                "Gets the forecast for a city",
                json!({
                    "type": "object",
                    "properties": {
                        "city": { "type": "string" }
                    },
                    "required": ["city"]
                }),
            )],
        }
    }
}

#[async_trait]
impl Plugin for WeatherPlugin {
    fn name(&self) -> &str {
        "weather"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> ToolResult<Vec<Content>> {
        let city = tool_call.arguments["city"].as_str().unwrap_or("somewhere");
        Ok(vec![Content::text(format!("Sunny in {}", city))])
    }
}

fn connector(server: &MockServer) -> ChatCompletion {
    let config = ChatCompletionConfig::new(server.uri(), "test_api_key", "gpt-4o");
    ChatCompletion::new(config).unwrap()
}

/// Full exchange over HTTP: the first response requests a tool call, the
/// resubmission settles on text.
#[tokio::test]
async fn test_complete_runs_tool_loop_over_http() -> Result<()> {
    let server = MockServer::start().await;

    let tool_call_response = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "weather-get_forecast",
                        "arguments": "{\"city\": \"Paris\"}"
                    }
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": { "prompt_tokens": 20, "completion_tokens": 15, "total_tokens": 35 }
    });
    let final_response = json!({
        "id": "chatcmpl-2",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "It's sunny in Paris." },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 40, "completion_tokens": 8, "total_tokens": 48 }
    });

    // Mounted in order: the first mock is consumed by the first round trip.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_response))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(final_response))
        .mount(&server)
        .await;

    let mut registry = PluginRegistry::new();
    registry.add_plugin(Box::new(WeatherPlugin::new()));

    let settings =
        ExecutionSettings::default().with_tool_call_behavior(ToolCallBehavior::AutoInvoke);
    let mut history = vec![
        Message::system().with_text("You are a helpful assistant."),
        Message::user().with_text("Weather in Paris?"),
    ];

    let connector = connector(&server);
    let (messages, usage) = connector
        .complete(&mut history, &settings, Some(&registry))
        .await?;

    assert_eq!(registry.invocation_count(), 1);
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].content[0].as_text(),
        Some("It's sunny in Paris.")
    );
    assert_eq!(usage.total_tokens, Some(48));

    // system, user, assistant tool request, tool result
    assert_eq!(history.len(), 4);
    assert!(matches!(
        history[2].content[0],
        MessageContent::ToolRequest(_)
    ));
    let response = history[3].content[0].as_tool_response().unwrap();
    assert_eq!(
        response.result.as_ref().unwrap()[0].as_text(),
        Some("Sunny in Paris")
    );

    Ok(())
}

/// Streaming exchange over HTTP with the argument string fragmented across
/// SSE frames.
#[tokio::test]
async fn test_stream_runs_tool_loop_over_http() -> Result<()> {
    let server = MockServer::start().await;

    let first_round = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"weather-get_forecast\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"city\\\": \"}}]}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"Paris\\\"}\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    let second_round = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Sunny\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" today.\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(first_round, "text/event-stream"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(second_round, "text/event-stream"))
        .mount(&server)
        .await;

    let mut registry = PluginRegistry::new();
    registry.add_plugin(Box::new(WeatherPlugin::new()));

    let settings =
        ExecutionSettings::default().with_tool_call_behavior(ToolCallBehavior::AutoInvoke);
    let mut history = vec![Message::user().with_text("Weather in Paris?")];

    let connector = connector(&server);
    let mut text = String::new();
    {
        let mut stream = connector
            .stream(&mut history, &settings, Some(&registry))
            .await?;
        while let Some(chunk) = stream.next().await {
            if let Some(piece) = chunk?.text {
                text.push_str(&piece);
            }
        }
    }

    assert_eq!(text, "Sunny today.");
    assert_eq!(registry.invocation_count(), 1);

    // The fragmented arguments reassembled into one JSON string
    let request = history[1].tool_requests()[0].clone();
    assert_eq!(request.raw_arguments, "{\"city\": \"Paris\"}");
    assert_eq!(request.arguments, Some(json!({"city": "Paris"})));

    Ok(())
}
