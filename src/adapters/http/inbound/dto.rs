use serde::{Deserialize, Serialize};

/// A message pushed by the chat gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    pub chat_id: String,
    #[serde(default)]
    pub text: String,
    /// Media references; the gateway stores the files.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundDisposition {
    Queued,
    AdminCommand,
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboundResponse {
    pub status: InboundDisposition,
}
