//! Core MCP Protocol Types
//!
//! Domain payload types shared by both protocol roles: implementation
//! descriptors, capability bundles, content parts, tools, prompts,
//! resources, roots, and logging levels.
//!
//! # Wire naming
//!
//! MCP uses camelCase on the wire; structs rename accordingly so the Rust
//! side stays snake_case.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// Layer 3: Internal module imports
use crate::protocol::constants::versions;
use crate::protocol::errors::{McpError, McpResult};

/// Protocol version with membership validation
///
/// Versions are date strings from a known set. Constructing from an unknown
/// string fails; [`ProtocolVersion::negotiate`] implements the server-side
/// selection rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    /// Create a protocol version, validating membership in the supported set
    pub fn new(version: impl Into<String>) -> McpResult<Self> {
        let version = version.into();
        if versions::SUPPORTED.contains(&version.as_str()) {
            Ok(Self(version))
        } else {
            Err(McpError::UnsupportedProtocolVersion { version })
        }
    }

    /// Latest version this runtime implements
    pub fn latest() -> Self {
        Self(versions::LATEST.to_string())
    }

    /// Version string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `version` is in the supported set
    pub fn is_supported(version: &str) -> bool {
        versions::SUPPORTED.contains(&version)
    }

    /// Server-side negotiation: echo the requested version when supported,
    /// otherwise offer the latest this runtime speaks
    pub fn negotiate(requested: &str) -> Self {
        if Self::is_supported(requested) {
            Self(requested.to_string())
        } else {
            Self::latest()
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::latest()
    }
}

/// Implementation descriptor exchanged during initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Implementation {
    /// Name of the implementation
    pub name: String,
    /// Version of the implementation
    pub version: String,
}

impl Implementation {
    /// Create a new implementation descriptor
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

// Deep, key-by-key union of two JSON values. `overlay` wins on scalar
// conflicts; objects recurse.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

macro_rules! impl_capability_merge {
    ($ty:ty) => {
        impl $ty {
            /// Deep, key-by-key union with another capability bundle
            ///
            /// `other` wins on scalar conflicts. Falls back to `self` when
            /// either side fails to serialize, which cannot happen for these
            /// derive-backed types.
            pub fn merged_with(&self, other: &$ty) -> $ty {
                let (Ok(mut base), Ok(overlay)) =
                    (serde_json::to_value(self), serde_json::to_value(other))
                else {
                    return self.clone();
                };
                deep_merge(&mut base, overlay);
                serde_json::from_value(base).unwrap_or_else(|_| self.clone())
            }
        }
    };
}

/// Capabilities advertised by a client during initialization
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Experimental, implementation-specific capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
    /// The client can service `sampling/createMessage`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    /// The client can service `roots/list`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
}

/// Capabilities advertised by a server during initialization
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Experimental, implementation-specific capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
    /// The server emits `notifications/message`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    /// Prompt operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Resource operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    /// Tool operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    /// Argument completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapability>,
}

impl_capability_merge!(ClientCapabilities);
impl_capability_merge!(ServerCapabilities);

/// Sampling capability flag bundle (currently empty on the wire)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SamplingCapability {}

/// Roots capability flags
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RootsCapability {
    /// The client emits `notifications/roots/list_changed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Logging capability flag bundle (currently empty on the wire)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LoggingCapability {}

/// Completions capability flag bundle (currently empty on the wire)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CompletionsCapability {}

/// Prompts capability flags
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    /// The server emits `notifications/prompts/list_changed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capability flags
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    /// The server accepts `resources/subscribe`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// The server emits `notifications/resources/list_changed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tools capability flags
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// The server emits `notifications/tools/list_changed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Multi-modal content part
///
/// A tagged sum over the MCP content kinds. Unrecognized `type` values are
/// preserved verbatim in the `Unknown` variant so foreign extensions survive
/// a round-trip through this runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Plain text
    Text {
        /// The text content
        text: String,
    },
    /// Base64-encoded image data
    Image {
        /// Base64 payload
        data: String,
        /// MIME type of the image
        mime_type: String,
    },
    /// Base64-encoded audio data
    Audio {
        /// Base64 payload
        data: String,
        /// MIME type of the audio
        mime_type: String,
    },
    /// Embedded resource contents
    Resource {
        /// The embedded resource
        resource: ResourceContents,
    },
    /// Unrecognized content kind, payload preserved verbatim
    Unknown(Map<String, Value>),
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// Create image content
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Content::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Extract text, if this part is textual
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            Content::Text { text } => serde_json::json!({"type": "text", "text": text}),
            Content::Image { data, mime_type } => {
                serde_json::json!({"type": "image", "data": data, "mimeType": mime_type})
            }
            Content::Audio { data, mime_type } => {
                serde_json::json!({"type": "audio", "data": data, "mimeType": mime_type})
            }
            Content::Resource { resource } => {
                let resource =
                    serde_json::to_value(resource).map_err(serde::ser::Error::custom)?;
                serde_json::json!({"type": "resource", "resource": resource})
            }
            Content::Unknown(map) => Value::Object(map.clone()),
        };
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        let kind = map.get("type").and_then(Value::as_str).unwrap_or_default();

        fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
            map.get(key).and_then(Value::as_str)
        }

        Ok(match kind {
            "text" => match field(&map, "text") {
                Some(text) => Content::Text {
                    text: text.to_string(),
                },
                None => Content::Unknown(map),
            },
            "image" | "audio" => match (field(&map, "data"), field(&map, "mimeType")) {
                (Some(data), Some(mime_type)) if kind == "image" => Content::Image {
                    data: data.to_string(),
                    mime_type: mime_type.to_string(),
                },
                (Some(data), Some(mime_type)) => Content::Audio {
                    data: data.to_string(),
                    mime_type: mime_type.to_string(),
                },
                _ => Content::Unknown(map),
            },
            "resource" => match map
                .get("resource")
                .cloned()
                .map(serde_json::from_value)
                .and_then(Result::ok)
            {
                Some(resource) => Content::Resource { resource },
                None => Content::Unknown(map),
            },
            _ => Content::Unknown(map),
        })
    }
}

/// Contents of a resource, inline in a read result or embedded in content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceContents {
    /// Textual resource contents
    Text {
        /// URI of the resource
        uri: String,
        /// MIME type, if known
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// The text
        text: String,
    },
    /// Binary resource contents
    Blob {
        /// URI of the resource
        uri: String,
        /// MIME type, if known
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// Base64 payload
        blob: String,
    },
}

// Serializer helper: omit `required` when absent *or* empty, so the encoded
// schema never carries an empty list.
fn required_is_empty(required: &Option<Vec<String>>) -> bool {
    required.as_ref().is_none_or(|r| r.is_empty())
}

/// JSON-schema-shaped tool parameter description
///
/// The runtime treats schemas as pass-through data: `type` is `"object"`,
/// `properties` and `required` travel untouched. `required` in particular
/// MUST survive a round-trip for well-behaved hosts to render arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolSchema {
    /// Always `"object"` for MCP tools
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Per-argument schemas, pass-through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Names of required arguments
    #[serde(default, skip_serializing_if = "required_is_empty")]
    pub required: Option<Vec<String>>,
}

impl ToolSchema {
    /// Create an object schema with the given properties and required list
    pub fn object(properties: Map<String, Value>, required: Vec<String>) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
        }
    }
}

/// Behavioral hints attached to a tool definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Human-readable title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The tool does not mutate its environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// The tool may perform destructive updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// Repeated calls with the same arguments have no additional effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    /// The tool interacts with an open world of external entities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// Tool definition advertised by a server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Schema of the arguments object
    pub input_schema: ToolSchema,
    /// Schema of `structuredContent` in the result, when the tool is structured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<ToolSchema>,
    /// Behavioral hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// Result of calling a tool
///
/// The two modes are mutually exclusive on the wire: `isError` is only
/// meaningful (and only emitted) in unstructured mode. Modeling the result
/// as a sum makes the exclusivity hold by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CallToolResult {
    /// Structured mode: a free-form JSON object, with optional content fallback
    #[serde(rename_all = "camelCase")]
    Structured {
        /// The structured payload
        structured_content: Map<String, Value>,
        /// Fallback content parts for hosts that cannot render structured data
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Vec<Content>>,
    },
    /// Unstructured mode: content parts plus an error flag
    #[serde(rename_all = "camelCase")]
    Unstructured {
        /// Content parts
        content: Vec<Content>,
        /// Whether the tool reported failure
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl CallToolResult {
    /// Create a successful unstructured result
    pub fn success(content: Vec<Content>) -> Self {
        CallToolResult::Unstructured {
            content,
            is_error: None,
        }
    }

    /// Create a failed unstructured result
    pub fn error(content: Vec<Content>) -> Self {
        CallToolResult::Unstructured {
            content,
            is_error: Some(true),
        }
    }

    /// Create a structured result
    pub fn structured(structured_content: Map<String, Value>) -> Self {
        CallToolResult::Structured {
            structured_content,
            content: None,
        }
    }

    /// Whether the tool reported failure (always false in structured mode)
    pub fn is_error(&self) -> bool {
        match self {
            CallToolResult::Unstructured { is_error, .. } => is_error.unwrap_or(false),
            CallToolResult::Structured { .. } => false,
        }
    }
}

/// Prompt template advertised by a server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    /// Unique prompt name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments the prompt accepts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// Argument accepted by a prompt template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    /// Name of the argument
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Role of a conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Host / end-user turn
    User,
    /// Model turn
    Assistant,
}

/// Message rendered from a prompt template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptMessage {
    /// Role of the message
    pub role: Role,
    /// Content of the message
    pub content: Content,
}

impl PromptMessage {
    /// Create a user message
    pub fn user(content: Content) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: Content) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }
}

/// Resource advertised by a server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    /// URI of the resource
    pub uri: String,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type, if known
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Parameterized resource advertised by a server
///
/// Identical to [`Resource`] except the fixed `uri` is replaced by an
/// RFC 6570 URI template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    /// RFC 6570 URI template
    pub uri_template: String,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of resources matching the template, if uniform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Filesystem root exposed by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Root {
    /// Root URI; always a `file://` URI
    pub uri: String,
    /// Human-readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    /// Create a root, validating the `file://` scheme
    pub fn new(uri: impl Into<String>, name: Option<String>) -> McpResult<Self> {
        let uri = uri.into();
        if !uri.starts_with("file://") {
            return Err(McpError::invalid_params(format!(
                "root uri must start with file://, got {uri}"
            )));
        }
        Ok(Self { uri, name })
    }
}

/// RFC 5424 logging severity levels used by `logging/setLevel`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    /// Wire string for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::Alert => "alert",
            LogLevel::Emergency => "emergency",
        }
    }
}

/// Reference target for argument completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Reference {
    /// Complete against a prompt's arguments
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// Prompt name
        name: String,
    },
    /// Complete against a resource template's variables
    #[serde(rename = "ref/resource")]
    Resource {
        /// Resource URI or template
        uri: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_set_membership() {
        assert!(ProtocolVersion::new("2025-03-26").is_ok());
        assert!(ProtocolVersion::new("2024-11-05").is_ok());
        assert!(ProtocolVersion::new("2024-10-07").is_ok());
        assert!(ProtocolVersion::new("1999-01-01").is_err());
        assert_eq!(ProtocolVersion::latest().as_str(), "2025-03-26");
    }

    #[test]
    fn version_negotiation_prefers_requested() {
        assert_eq!(ProtocolVersion::negotiate("2024-11-05").as_str(), "2024-11-05");
        assert_eq!(ProtocolVersion::negotiate("2030-01-01").as_str(), "2025-03-26");
    }

    #[test]
    fn capability_merge_is_deep_union() {
        let base = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            ..Default::default()
        };
        let overlay = ServerCapabilities {
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: None,
            }),
            ..Default::default()
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.tools.unwrap().list_changed, Some(true));
        assert_eq!(merged.resources.unwrap().subscribe, Some(true));
    }

    #[test]
    fn required_list_round_trips() {
        let schema = ToolSchema::object(
            Map::new(),
            vec!["operation".into(), "a".into(), "b".into()],
        );
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["required"], json!(["operation", "a", "b"]));
        let back: ToolSchema = serde_json::from_value(value).unwrap();
        assert_eq!(back.required, schema.required);
    }

    #[test]
    fn empty_required_is_omitted() {
        let schema = ToolSchema::object(Map::new(), vec![]);
        let value = serde_json::to_value(&schema).unwrap();
        assert!(value.get("required").is_none());

        let explicit_empty = ToolSchema {
            schema_type: "object".to_string(),
            properties: None,
            required: Some(vec![]),
        };
        let value = serde_json::to_value(&explicit_empty).unwrap();
        assert!(value.get("required").is_none());
    }

    #[test]
    fn structured_result_never_carries_is_error() {
        let mut payload = Map::new();
        payload.insert("result".to_string(), json!(5));
        let result = CallToolResult::structured(payload);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["structuredContent"]["result"], json!(5));
        assert!(value.get("isError").is_none());
    }

    #[test]
    fn unstructured_result_round_trips_error_flag() {
        let result = CallToolResult::error(vec![Content::text("boom")]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], json!(true));
        let back: CallToolResult = serde_json::from_value(value).unwrap();
        assert!(back.is_error());
    }

    #[test]
    fn structured_decode_wins_when_field_present() {
        let back: CallToolResult = serde_json::from_value(json!({
            "content": [],
            "structuredContent": {"result": 5}
        }))
        .unwrap();
        match back {
            CallToolResult::Structured {
                structured_content, ..
            } => assert_eq!(structured_content["result"], json!(5)),
            other => panic!("expected structured mode, got {other:?}"),
        }
    }

    #[test]
    fn content_round_trips_known_variants() {
        for content in [
            Content::text("hello"),
            Content::image("aGk=", "image/png"),
            Content::Audio {
                data: "aGk=".to_string(),
                mime_type: "audio/wav".to_string(),
            },
            Content::Resource {
                resource: ResourceContents::Text {
                    uri: "file:///tmp/a.txt".to_string(),
                    mime_type: Some("text/plain".to_string()),
                    text: "hi".to_string(),
                },
            },
        ] {
            let value = serde_json::to_value(&content).unwrap();
            let back: Content = serde_json::from_value(value).unwrap();
            assert_eq!(content, back);
        }
    }

    #[test]
    fn unknown_content_is_preserved() {
        let raw = json!({"type": "video", "url": "https://example.com/v.mp4"});
        let content: Content = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(content, Content::Unknown(_)));
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn roots_require_file_scheme() {
        assert!(Root::new("file:///home/user", None).is_ok());
        assert!(Root::new("https://example.com", None).is_err());
    }
}
