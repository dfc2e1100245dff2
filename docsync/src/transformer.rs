//! `LlmTransformer`: turns a unit's raw material into a finished Markdown document
//! through an OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use docsync_core::contract::{TransformRequest, Transformer};
use docsync_core::error::ClientError;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::LazyLock;

const SYSTEM_PROMPT: &str = "You maintain pages of a documentation site. \
Rewrite the supplied source material into one well-structured Markdown page. \
Keep every fact from the source, do not invent content, and embed each listed \
image exactly once with Markdown image syntax using the given path. \
When a previous version of the page is supplied, keep its structure and wording \
wherever the source material has not changed. Answer with the Markdown page only.";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("static regex")
});

pub struct LlmTransformer {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl LlmTransformer {
    pub fn new(api_url: &str, model: &str, api_key: &str) -> Self {
        tracing::info!(api_url, model, "Initialised LLM transformer");
        LlmTransformer {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url)
    }

    pub fn payload(&self, request: &TransformRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(request) },
            ],
        })
    }
}

/// Everything the model sees about one unit, in a fixed section order.
pub fn user_prompt(request: &TransformRequest) -> String {
    let mut prompt = format!("# Page: {}\n\n", request.unit_name);

    if !request.references.is_empty() {
        prompt.push_str("## Reference material\n\n");
        for reference in &request.references {
            prompt.push_str(&format!("### {}\n\n{}\n\n", reference.name, reference.content.trim()));
        }
    }

    if let Some(existing) = &request.existing_body {
        prompt.push_str(&format!("## Previous version\n\n{}\n\n", existing.trim()));
    }

    prompt.push_str(&format!("## Source material\n\n{}\n\n", request.raw_text.trim()));

    if !request.image_paths.is_empty() {
        prompt.push_str("## Images\n\n");
        for path in &request.image_paths {
            prompt.push_str(&format!("- {path}\n"));
        }
    }
    prompt
}

/// Remove a Markdown code fence wrapping the whole answer, if there is one.
pub fn strip_code_fence(answer: &str) -> String {
    let trimmed = answer.trim();
    match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Content of the first choice of a chat completion response.
pub fn parse_completion(body: &Value) -> Result<String, ClientError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .ok_or("completion response has no choices[0].message.content")?;
    if content.trim().is_empty() {
        return Err("completion response content is empty".into());
    }
    Ok(strip_code_fence(content))
}

#[async_trait]
impl Transformer for LlmTransformer {
    async fn transform(&self, request: &TransformRequest) -> Result<String, ClientError> {
        tracing::info!(
            unit = %request.unit_name,
            images = request.image_paths.len(),
            references = request.references.len(),
            "Requesting transformation"
        );
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Transformer API returned error");
            return Err(format!("transformer API returned {status}: {body}").into());
        }
        let body: Value = response.json().await?;
        parse_completion(&body)
    }
}
