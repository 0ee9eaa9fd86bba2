use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ids::ToolCallId;
use crate::outcome::QueryOutcome;

/// One role-tagged entry of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "user")]
    User(UserMessage),
    #[serde(rename = "assistant")]
    Assistant(AssistantMessage),
    #[serde(rename = "tool_result")]
    ToolResult(ToolResultMessage),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: AssistantContent,
}

/// Output of a tool, as seen by later steps. `is_error` is the typed failure
/// flag; `content` is the text the model gets to read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: ToolCallId,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    #[serde(rename = "text")]
    Text { text: String },
    /// A turn that completed a full run.
    #[serde(rename = "answer")]
    Answer(AnswerBundle),
}

/// The record the presentation layer renders for a completed turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerBundle {
    pub final_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart_artifact: Option<ChartArtifact>,
    pub generated_query: Option<String>,
    pub raw_result: Option<QueryOutcome>,
}

/// Encoded raster image of a chart. Serialized as base64.
#[derive(Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    bytes: Vec<u8>,
}

impl ChartArtifact {
    pub const MIME_TYPE: &'static str = "image/png";

    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ChartArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChartArtifact({} bytes)", self.bytes.len())
    }
}

impl Serialize for ChartArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.bytes))
    }
}

impl<'de> Deserialize<'de> for ChartArtifact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self::new)
            .map_err(serde::de::Error::custom)
    }
}

// --- Convenience constructors ---

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User(UserMessage { text: text.into() })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage {
            content: AssistantContent::Text { text: text.into() },
        })
    }

    pub fn assistant_answer(bundle: AnswerBundle) -> Self {
        Message::Assistant(AssistantMessage {
            content: AssistantContent::Answer(bundle),
        })
    }

    pub fn tool_result(
        tool_call_id: ToolCallId,
        name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Message::ToolResult(ToolResultMessage {
            tool_call_id,
            name: name.into(),
            content: content.into(),
            is_error,
        })
    }

    /// Role tag as it appears on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Message::User(_) => "user",
            Message::Assistant(_) => "assistant",
            Message::ToolResult(_) => "tool_result",
        }
    }

    /// Plain-text rendering used when a message is embedded in a prompt.
    pub fn text(&self) -> String {
        match self {
            Message::User(user) => user.text.clone(),
            Message::Assistant(asst) => asst.content.text(),
            Message::ToolResult(tr) => tr.content.clone(),
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultMessage> {
        match self {
            Message::ToolResult(tr) => Some(tr),
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User(_))
    }
}

impl AssistantContent {
    pub fn text(&self) -> String {
        match self {
            AssistantContent::Text { text } => text.clone(),
            AssistantContent::Answer(bundle) => {
                let mut out = bundle.final_answer.clone().unwrap_or_default();
                if let Some(query) = &bundle.generated_query {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str("SQL: ");
                    out.push_str(query);
                }
                out
            }
        }
    }
}
