use super::{config, errors::ApiError, ChunkCallback, ModelClient, ModelOutcome, ModelRequest};
use crate::utils::cancel::CancellationToken;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

/// HTTP client for an OpenAI-style chat-completions endpoint.
pub struct ApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ApiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    /// Streams a chat completion, invoking `on_chunk` with the byte length of
    /// each content delta. Returns the accumulated text with any enclosing
    /// code fence stripped.
    async fn send_request(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
        on_chunk: Option<&ChunkCallback>,
    ) -> Result<ModelOutcome, ApiError> {
        log::debug!("Requesting update of {}", request.file_path);

        let file_block = format!(
            "<file path=\"{}\">\n<![CDATA[\n{}\n]]>\n</file>",
            request.file_path, request.file_content
        );
        let content = format!(
            "{}\n{} {}",
            file_block,
            config::REFACTORING_INSTRUCTION,
            request.instruction
        );

        let messages = vec![json!({"role": "user", "content": content})];

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": request.model,
                "messages": messages,
                "temperature": request.temperature,
                "stream": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Ok(ModelOutcome::RateLimited);
        }
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ApiError::Api(error_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Ok(ModelOutcome::Cancelled);
            }
            let bytes = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // SSE frames are newline-delimited `data: {...}` lines.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').trim().to_string();
                buffer.drain(..=pos);

                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                let payload = payload.trim();
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }
                let value: Value = serde_json::from_str(payload)?;
                if let Some(delta) = value["choices"][0]["delta"]["content"].as_str() {
                    accumulated.push_str(delta);
                    if let Some(callback) = on_chunk {
                        callback(delta.len());
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(ModelOutcome::Cancelled);
        }

        Ok(ModelOutcome::Content(strip_enclosing_fence(&accumulated)))
    }
}

#[async_trait]
impl ModelClient for ApiClient {
    async fn send(
        &self,
        request: ModelRequest,
        cancel: &CancellationToken,
        on_chunk: Option<ChunkCallback>,
    ) -> ModelOutcome {
        match self.send_request(&request, cancel, on_chunk.as_ref()).await {
            Ok(outcome) => outcome,
            Err(e) if cancel.is_cancelled() => {
                log::debug!("Request for {} cancelled: {}", request.file_path, e);
                ModelOutcome::Cancelled
            }
            Err(e) => {
                log::error!("API request for {} failed: {}", request.file_path, e);
                ModelOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Models often wrap the whole file in a markdown fence; drop it so the
/// returned text is the bare file content.
fn strip_enclosing_fence(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            // Skip the language tag on the opening line, if any.
            let body = match inner.find('\n') {
                Some(idx) => &inner[idx + 1..],
                None => inner,
            };
            return body.trim_end().to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fence_with_language_tag() {
        let wrapped = "```rust\nfn main() {}\n```";
        assert_eq!(strip_enclosing_fence(wrapped), "fn main() {}");
    }

    #[test]
    fn passes_through_bare_content() {
        assert_eq!(strip_enclosing_fence("fn main() {}\n"), "fn main() {}");
    }

    #[test]
    fn keeps_interior_fences() {
        let text = "intro\n```\ncode\n```\noutro";
        assert_eq!(strip_enclosing_fence(text), text);
    }
}
