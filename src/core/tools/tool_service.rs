// This is the tool dispatcher - it advertises the tool catalog and executes
// validated invocations. The actual document edit goes through the
// `DocumentWriter` port so the core stays testable without Google.
//
// Dispatch never raises past its own boundary: both success and failure come
// back as values, and the transport layer decides how to serialize them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The one tool this proxy exposes.
pub const APPEND_TOOL_NAME: &str = "append_text_to_doc";

const SUCCESS_MESSAGE: &str = "✅ Text appended successfully.";

// ============================================================================
// ERRORS
// ============================================================================

/// Failure surface of the external document API.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("Google rejected the credentials: {0}")]
    Auth(String),

    #[error("Google Docs API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request to Google Docs failed: {0}")]
    Http(String),
}

/// Why a tool invocation did not produce a result.
///
/// These are values handed back to the caller, never fatal to the server;
/// the invoking agent gets to decide how to react.
#[derive(Debug, Error, PartialEq)]
pub enum ToolFailure {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments: {}", violations.join("; "))]
    InvalidArguments { violations: Vec<String> },

    #[error("upstream call failed: {message}")]
    Upstream { message: String },
}

/// Successful tool invocation: a human-readable confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSuccess {
    pub message: String,
}

// ============================================================================
// DOCUMENT WRITER (PORT)
// ============================================================================
// The core defines WHAT it needs from the document API, not HOW it's done.
// The infra layer provides the real HTTP implementation; tests inject a
// recording fake.

#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Insert `content` at the end of the document's current body text.
    async fn append_text(&self, doc_id: &str, content: &str) -> Result<(), DocsError>;
}

#[async_trait]
impl<T> DocumentWriter for Arc<T>
where
    T: DocumentWriter + ?Sized,
{
    async fn append_text(&self, doc_id: &str, content: &str) -> Result<(), DocsError> {
        self.as_ref().append_text(doc_id, content).await
    }
}

// ============================================================================
// TOOL DESCRIPTORS
// ============================================================================

/// Declared type of one named parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub value_type: String,
}

/// JSON-schema-shaped input contract. Serializes verbatim to the wire shape
/// MCP clients expect under `inputSchema`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
}

/// One advertised tool. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

fn append_tool_descriptor() -> ToolDescriptor {
    let mut properties = BTreeMap::new();
    properties.insert(
        "docId".to_string(),
        PropertySchema {
            value_type: "string".to_string(),
        },
    );
    properties.insert(
        "content".to_string(),
        PropertySchema {
            value_type: "string".to_string(),
        },
    );

    ToolDescriptor {
        name: APPEND_TOOL_NAME.to_string(),
        description: "Append text to a Google Doc".to_string(),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties,
            required: vec!["docId".to_string(), "content".to_string()],
        },
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The dispatcher. Holds no mutable state of its own: the descriptor set is
/// built once at startup and shared read-only across every session.
pub struct ToolService<W: DocumentWriter> {
    writer: W,
    descriptors: Vec<ToolDescriptor>,
}

impl<W: DocumentWriter> ToolService<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            descriptors: vec![append_tool_descriptor()],
        }
    }

    /// The static catalog. Pure - identical no matter how many sessions are open.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Validate and execute one invocation.
    ///
    /// Validation order: tool name first, then arguments (all violations
    /// collected in one pass), and only then the upstream call. A single
    /// attempt, no automatic retry.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<ToolSuccess, ToolFailure> {
        let Some(descriptor) = self.descriptors.iter().find(|d| d.name == name) else {
            return Err(ToolFailure::UnknownTool {
                name: name.to_string(),
            });
        };

        validate_arguments(descriptor, arguments)?;

        // Only one tool is registered, so dispatch is a straight call.
        let doc_id = arguments.get("docId").and_then(Value::as_str).unwrap_or_default();
        let content = arguments
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match self.writer.append_text(doc_id, content).await {
            Ok(()) => Ok(ToolSuccess {
                message: SUCCESS_MESSAGE.to_string(),
            }),
            Err(err) => {
                tracing::warn!(tool = name, error = %err, "upstream call failed");
                Err(ToolFailure::Upstream {
                    message: err.to_string(),
                })
            }
        }
    }
}

/// Check the argument bag against the descriptor's schema.
///
/// Required keys must be present with the declared primitive type; unknown
/// keys are ignored so newer clients keep working against this server.
fn validate_arguments(descriptor: &ToolDescriptor, arguments: &Value) -> Result<(), ToolFailure> {
    let mut violations = Vec::new();

    let object = arguments.as_object();
    if object.is_none() && !arguments.is_null() {
        violations.push("arguments must be an object".to_string());
    }

    for name in &descriptor.input_schema.required {
        match object.and_then(|map| map.get(name)) {
            None => violations.push(format!("missing required argument: {name}")),
            Some(value) => {
                let expected = descriptor
                    .input_schema
                    .properties
                    .get(name)
                    .map(|property| property.value_type.as_str())
                    .unwrap_or("string");
                let type_matches = match expected {
                    "string" => value.is_string(),
                    "number" => value.is_number(),
                    "boolean" => value.is_boolean(),
                    _ => true,
                };
                if !type_matches {
                    violations.push(format!("argument {name} must be a {expected}"));
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ToolFailure::InvalidArguments { violations })
    }
}
