//! Google Gemini provider implementation
//!
//! Uses `streamGenerateContent` with `alt=sse`, so each response increment
//! arrives as one `data:` line carrying a partial `GenerateContentResponse`.

use super::types::{ChunkStream, LlmRequest, StreamChunk, Usage};
use super::{LlmError, LlmErrorKind, LlmService};
use crate::conversation::{Message, ToolCall};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(api_key: Option<String>, model_id: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: model_id.into(),
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model_id
        )
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = Vec::new();

        for msg in &request.messages {
            match msg {
                Message::User { text } => {
                    if !text.is_empty() {
                        contents.push(GeminiContent::new("user", vec![GeminiPart::text(text)]));
                    }
                }
                Message::Assistant(assistant) => {
                    let mut parts = Vec::new();
                    if !assistant.text.is_empty() {
                        parts.push(GeminiPart::text(&assistant.text));
                    }
                    parts.extend(assistant.tool_calls.iter().map(|call| {
                        GeminiPart::FunctionCall {
                            function_call: GeminiFunctionCall {
                                id: None,
                                name: call.name.clone(),
                                args: call.arguments.clone(),
                            },
                        }
                    }));
                    if !parts.is_empty() {
                        contents.push(GeminiContent::new("model", parts));
                    }
                }
                Message::ToolResult(result) => {
                    let output = serde_json::from_str::<Value>(&result.payload)
                        .unwrap_or_else(|_| Value::String(result.payload.clone()));
                    let part = GeminiPart::FunctionResponse {
                        function_response: GeminiFunctionResponse {
                            name: result.tool_name.clone(),
                            response: serde_json::json!({
                                "result": output,
                                "error": result.is_error,
                            }),
                        },
                    };
                    // Responses to one model turn travel together in a single content
                    match contents.last_mut() {
                        Some(last) if last.is_function_responses() => last.parts.push(part),
                        _ => contents.push(GeminiContent::new("user", vec![part])),
                    }
                }
            }
        }

        let system_instruction = request.system.as_ref().map(|system| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(system)],
        });

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            }),
        }
    }

    /// Decode one `data:` payload into response increments
    fn normalize_chunk(data: &str) -> Vec<Result<StreamChunk, LlmError>> {
        let resp: GeminiStreamResponse = match serde_json::from_str(data) {
            Ok(r) => r,
            Err(e) => {
                return vec![Err(LlmError::malformed(format!(
                    "Failed to parse stream chunk: {e} - data: {data}"
                )))]
            }
        };

        if let Some(error) = resp.error {
            return vec![Err(LlmError::new(LlmErrorKind::ServerError, error.message))];
        }

        let mut chunks = Vec::new();
        if let Some(candidate) = resp.candidates.into_iter().next() {
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                match part {
                    GeminiPart::Text { text } => {
                        if !text.is_empty() {
                            chunks.push(Ok(StreamChunk::Text(text)));
                        }
                    }
                    GeminiPart::FunctionCall { function_call } => {
                        let id = function_call
                            .id
                            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                        chunks.push(Ok(StreamChunk::ToolUse(ToolCall::new(
                            id,
                            function_call.name,
                            function_call.args,
                        ))));
                    }
                    GeminiPart::FunctionResponse { .. } | GeminiPart::Other(_) => {}
                }
            }
        }

        if let Some(usage) = resp.usage_metadata {
            chunks.push(Ok(StreamChunk::Usage(Usage {
                input_tokens: u64::from(usage.prompt_token_count),
                output_tokens: u64::from(usage.candidates_token_count),
            })));
        }

        chunks
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmError::new(
                LlmErrorKind::NotConfigured,
                "GOOGLE_API_KEY is not set",
            ));
        };

        let gemini_request = Self::translate_request(request);

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", api_key)
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let stream = response
            .bytes_stream()
            .scan(SseDataBuffer::default(), |buffer, item| {
                let out: Vec<Result<StreamChunk, LlmError>> = match item {
                    Ok(bytes) => buffer
                        .push(&bytes)
                        .iter()
                        .flat_map(|data| Self::normalize_chunk(data))
                        .collect(),
                    Err(e) => vec![Err(LlmError::network(format!("Stream read failed: {e}")))],
                };
                futures::future::ready(Some(futures::stream::iter(out)))
            })
            .flatten()
            .boxed();

        Ok(stream)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Reassembles server-sent event `data` payloads from arbitrary byte chunks
#[derive(Debug, Default)]
struct SseDataBuffer {
    pending: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDataBuffer {
    /// Feed bytes, returning every event payload completed by them
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    events.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data_lines
                    .push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
            // Comments, `event:`, `id:` and `retry:` lines carry nothing we use
        }

        events
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn new(role: &str, parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }

    fn is_function_responses(&self) -> bool {
        !self.parts.is_empty()
            && self
                .parts
                .iter()
                .all(|p| matches!(p, GeminiPart::FunctionResponse { .. }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    /// Part kinds this client does not use (thoughts, inline data, ...)
    Other(Value),
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        GeminiPart::Text {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
