//! The request/response/invoke loop.
//!
//! One `complete` or `stream` call is an exchange: however many round trips
//! it takes for the model to settle on a reply that requests no tools, or
//! for the auto-invoke ceiling to cut the loop short. The connector appends
//! assistant and tool messages to the caller's history as it goes but never
//! replaces or reorders what is already there.

use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::config::ChatCompletionConfig;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::plugins::PluginRegistry;
use crate::request::{build_request, ToolChoice};
use crate::response::{parse_response, Usage};
use crate::settings::{ExecutionSettings, ToolCallBehavior};
use crate::streaming::{parse_chunk, ChatChunk, ToolCallAccumulator};
use crate::transport::{ChatTransport, HttpTransport};

/// Ceiling on auto-invoke round trips within one exchange.
///
/// Reaching it is a soft stop, not an error: the response that would have
/// started the next round is returned to the caller as-is, tool requests
/// included.
pub const MAX_AUTO_INVOKE_ROUNDS: usize = 128;

/// Connector to a hosted chat completion endpoint
pub struct ChatCompletion {
    transport: Box<dyn ChatTransport>,
    model: String,
}

impl ChatCompletion {
    pub fn new(config: ChatCompletionConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.host, &config.api_key)?;
        Ok(Self::with_transport(config.model, Box::new(transport)))
    }

    /// Build a connector over a caller-supplied transport
    pub fn with_transport(model: impl Into<String>, transport: Box<dyn ChatTransport>) -> Self {
        Self {
            transport,
            model: model.into(),
        }
    }

    /// Which tools to advertise and what choice to force for one round trip.
    ///
    /// Required behavior forces its tool only on the round that starts the
    /// exchange; after that the choice is pinned to "none" because the
    /// required call has already been made. A required tool missing from the
    /// registry advertises nothing and forces nothing.
    fn tool_shape(
        behavior: &ToolCallBehavior,
        registry: Option<&PluginRegistry>,
        round: usize,
    ) -> (Vec<Tool>, ToolChoice) {
        match behavior {
            ToolCallBehavior::Disabled => (Vec::new(), ToolChoice::Auto),
            ToolCallBehavior::Advertised | ToolCallBehavior::AutoInvoke => (
                registry.map(|r| r.qualified_tools()).unwrap_or_default(),
                ToolChoice::Auto,
            ),
            ToolCallBehavior::Required { tool_name, .. } => {
                let tools: Vec<Tool> = registry
                    .map(|r| {
                        r.qualified_tools()
                            .into_iter()
                            .filter(|tool| tool.name == *tool_name)
                            .collect()
                    })
                    .unwrap_or_default();

                if tools.is_empty() {
                    (tools, ToolChoice::Auto)
                } else if round == 0 {
                    (tools, ToolChoice::Required(tool_name.clone()))
                } else {
                    (tools, ToolChoice::None)
                }
            }
        }
    }

    /// Run the requested calls and append one tool message per result, in
    /// request order
    async fn invoke_and_append(
        registry: &PluginRegistry,
        requests: &[ToolRequest],
        history: &mut Vec<Message>,
    ) {
        for request in requests {
            let result = registry.dispatch(request).await;
            history.push(Message::tool().with_tool_response(request.id.clone(), result));
        }
    }

    /// Complete the conversation, driving tool calls to completion when the
    /// behavior auto-invokes.
    ///
    /// Returns the final messages (one per choice) and the last round's
    /// usage. Intermediate assistant and tool messages are appended to
    /// `history`; the final messages are not.
    pub async fn complete(
        &self,
        history: &mut Vec<Message>,
        settings: &ExecutionSettings,
        registry: Option<&PluginRegistry>,
    ) -> Result<(Vec<Message>, Usage)> {
        let behavior = &settings.tool_call_behavior;
        let mut round: usize = 0;

        loop {
            let (tools, choice) = Self::tool_shape(behavior, registry, round);
            let payload = build_request(
                &self.model,
                history.as_slice(),
                settings,
                &tools,
                &choice,
                false,
            )?;
            let response = self.transport.send(payload).await?;
            let (messages, usage) = parse_response(&response)?;

            let requests: Vec<ToolRequest> = match messages.first() {
                Some(message) => message.tool_requests().into_iter().cloned().collect(),
                None => Vec::new(),
            };
            if requests.is_empty() {
                return Ok((messages, usage));
            }

            let registry = match registry {
                Some(registry) if behavior.auto_invokes() => registry,
                _ => return Ok((messages, usage)),
            };

            if round >= MAX_AUTO_INVOKE_ROUNDS {
                debug!(round, "auto-invoke ceiling reached, returning tool requests to caller");
                return Ok((messages, usage));
            }

            debug!(round, calls = requests.len(), "auto-invoking tool calls");
            history.push(messages[0].clone());
            Self::invoke_and_append(registry, &requests, history).await;
            round += 1;
        }
    }

    /// Stream the conversation, yielding every chunk as it arrives.
    ///
    /// When the behavior auto-invokes and a response settles into tool
    /// requests, the calls are run and the resubmission's chunks continue on
    /// the same stream. The stream ends after a response that requests no
    /// tools, after a non-auto-invoking response, or at the round ceiling.
    pub async fn stream<'a>(
        &'a self,
        history: &'a mut Vec<Message>,
        settings: &'a ExecutionSettings,
        registry: Option<&'a PluginRegistry>,
    ) -> Result<BoxStream<'a, Result<ChatChunk>>> {
        Ok(Box::pin(async_stream::try_stream! {
            let behavior = &settings.tool_call_behavior;
            let mut round: usize = 0;

            loop {
                let (tools, choice) = Self::tool_shape(behavior, registry, round);
                let payload = build_request(
                    &self.model,
                    history.as_slice(),
                    settings,
                    &tools,
                    &choice,
                    true,
                )?;
                let mut frames = self.transport.send_stream(payload).await?;

                // The accumulator lives here, not in the parser, so the
                // point where partial calls become whole ones is explicit:
                // when this response's frames run out.
                let mut accumulator = ToolCallAccumulator::new();
                let mut text = String::new();

                while let Some(frame) = frames.next().await {
                    let chunk = parse_chunk(&frame?)?;
                    if let Some(piece) = &chunk.text {
                        text.push_str(piece);
                    }
                    for delta in &chunk.tool_calls {
                        accumulator.apply(delta);
                    }
                    yield chunk;
                }

                let requests = accumulator.finish();
                if requests.is_empty() {
                    break;
                }

                let registry = match registry {
                    Some(registry) if behavior.auto_invokes() => registry,
                    _ => break,
                };

                if round >= MAX_AUTO_INVOKE_ROUNDS {
                    debug!(round, "auto-invoke ceiling reached, ending stream");
                    break;
                }

                debug!(round, calls = requests.len(), "auto-invoking tool calls");
                let mut assistant = Message::assistant();
                if !text.is_empty() {
                    assistant = assistant.with_text(text.clone());
                }
                for request in requests.iter().cloned() {
                    assistant = assistant.with_tool_request(request);
                }
                history.push(assistant);
                Self::invoke_and_append(registry, &requests, history).await;
                round += 1;
            }
        }))
    }
}
