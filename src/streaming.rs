//! Incremental response parsing.
//!
//! A streamed response arrives as a sequence of JSON frames, each carrying
//! deltas: a slice of text, a fragment of a tool call's argument string, a
//! finish reason, or usage totals. Tool call fragments for one call share an
//! index; the name arrives in the fragment that opens the call and the
//! argument string is appended across the rest. The accumulator that stitches
//! them back together is explicit state owned by whoever drives the stream,
//! so finalization happens at a known point (terminal finish reason or end of
//! stream), not inside the parser.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::models::message::ToolRequest;
use crate::models::role::Role;
use crate::response::{tool_call_to_request, Usage};

/// One parsed frame of a streamed response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatChunk {
    pub role: Option<Role>,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl ChatChunk {
    /// Whether this chunk carries a finish reason that closes the response
    pub fn is_terminal(&self) -> bool {
        matches!(self.finish_reason.as_deref(), Some("stop") | Some("tool_calls"))
    }
}

/// A fragment of one tool call within a streamed response
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallDelta {
    pub index: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    delta: Option<WireDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    role: Option<Role>,
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct WireToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<WireFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct WireFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Parse one wire frame into a chunk. Frames with no choices (usage-only
/// trailers) produce a chunk with just usage attached.
pub fn parse_chunk(frame: &Value) -> Result<ChatChunk> {
    let wire: WireFrame = serde_json::from_value(frame.clone())?;
    let mut chunk = ChatChunk::default();

    if let Some(choice) = wire.choices.into_iter().next() {
        chunk.finish_reason = choice.finish_reason;
        if let Some(delta) = choice.delta {
            chunk.role = delta.role;
            chunk.text = delta.content;
            chunk.tool_calls = delta
                .tool_calls
                .into_iter()
                .map(|delta| ToolCallDelta {
                    index: delta.index,
                    id: delta.id,
                    name: delta.function.as_ref().and_then(|f| f.name.clone()),
                    arguments: delta.function.and_then(|f| f.arguments),
                })
                .collect();
        }
    }

    if wire.usage.is_some() {
        chunk.usage = Some(crate::response::parse_usage(frame));
    }

    Ok(chunk)
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles tool calls from fragments spread across a response's chunks.
///
/// Keyed by the per-call index; iteration order is index order, which is the
/// order the calls appeared in. The accumulator never decides completeness
/// itself: call `finish` once the stream has signalled a terminal finish
/// reason or ended.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    partial: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }

    /// Fold one fragment in. A fragment carrying a name opens a new call at
    /// its index; later fragments at the same index append argument text.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        let entry = self.partial.entry(delta.index);
        match entry {
            std::collections::btree_map::Entry::Vacant(vacant) => {
                // Argument fragments for an index we never saw a name for
                // have nothing to attach to and are dropped.
                if let Some(name) = &delta.name {
                    vacant.insert(PartialCall {
                        id: delta.id.clone().unwrap_or_default(),
                        name: name.clone(),
                        arguments: delta.arguments.clone().unwrap_or_default(),
                    });
                }
            }
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                if let Some(arguments) = &delta.arguments {
                    occupied.get_mut().arguments.push_str(arguments);
                }
            }
        }
    }

    /// Close all in-progress calls, applying the same argument-parse policy
    /// as the atomic parser. A truncated stream surfaces as a plain parse
    /// failure on the affected call.
    pub fn finish(self) -> Vec<ToolRequest> {
        self.partial
            .into_values()
            .map(|call| tool_call_to_request(call.id, call.name, call.arguments))
            .collect()
    }
}
