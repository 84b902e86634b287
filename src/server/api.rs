//! Request and response types for the HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Query parameters for the streaming chat endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub chat_id: String,
}

/// Body of POST /ai/pdf/upload/:chatId.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Original file name, if known.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Text already extracted from the document.
    pub text: String,
}

/// Response for POST /ai/pdf/upload/:chatId.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub chat_id: String,
    pub file_name: String,
    /// Stored text length in characters.
    pub text_length: usize,
}

impl From<&Document> for UploadResponse {
    fn from(document: &Document) -> Self {
        Self {
            chat_id: document.conversation_id.clone(),
            file_name: document.file_name.clone(),
            text_length: document.text_len(),
        }
    }
}

/// Error body returned for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_query_uses_camel_case() {
        let query: ChatQuery =
            serde_json::from_str(r#"{"prompt":"你好","chatId":"c-1"}"#).unwrap();
        assert_eq!(query.prompt, "你好");
        assert_eq!(query.chat_id, "c-1");
    }

    #[test]
    fn test_upload_response_from_document() {
        let document = Document::new("c-2", Some("手册.pdf".to_string()), "  十个字的中文内容呀  ");
        let response = UploadResponse::from(&document);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["chatId"], "c-2");
        assert_eq!(json["fileName"], "手册.pdf");
        assert_eq!(json["textLength"], 9);
    }
}
