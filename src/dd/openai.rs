use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::dd::context::DdContext;
use crate::error::{check_status, Result};

const MAX_OUTPUT_TOKENS: u32 = 800;

const INSTRUCTIONS: &str = "You are an analyst generating a DD memo for a short-horizon trade candidate.
Return markdown with:
- Recommendation tier: Favorable, Neutral, Unfavorable
- Confidence: Low, Medium, High
- Setup fit: earnings anticipation or post-earnings continuation
- Key positives (bullets)
- Key risks (bullets), especially dilution and financing
- What would invalidate the thesis (bullets)
Do not predict price targets. Do not mention placing trades.
";

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: serde_json::Value,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// OpenAI Responses API client for DD notes.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Markdown DD memo for one candidate. The text is returned as-is.
    pub async fn note_from_context(&self, ctx: &DdContext) -> Result<String> {
        let context_json = ctx.to_json()?;
        let body = ResponsesRequest {
            model: &self.model,
            input: json!([
                {"role": "developer", "content": INSTRUCTIONS},
                {"role": "user", "content": format!("Context JSON:\n{context_json}")},
            ]),
            max_output_tokens: MAX_OUTPUT_TOKENS,
        };

        let resp = self
            .client
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let reply: ResponsesReply = check_status("OpenAI", resp).await?.json().await?;
        let note = join_output_text(&reply);
        debug!(symbol = %ctx.symbol, chars = note.len(), "DD note received");
        Ok(note)
    }
}

/// Joins every `output_text` part of every output item, newline-separated.
fn join_output_text(reply: &ResponsesReply) -> String {
    reply
        .output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|part| part.kind == "output_text")
        .map(|part| part.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::types::{Components, FeatureSet, GateSet, SetupClass};

    fn ctx() -> DdContext {
        DdContext {
            symbol: "SOUN".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            score_total: 90.0,
            setup_class: SetupClass::EarningsAnticipation,
            components: Components::default(),
            features: FeatureSet::default(),
            gates: GateSet::default(),
        }
    }

    #[tokio::test]
    async fn joins_output_text_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-test", "max_output_tokens": 800})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": [
                    {"type": "reasoning", "content": []},
                    {"type": "message", "content": [
                        {"type": "output_text", "text": "  ## Tier: Neutral"},
                        {"type": "refusal", "text": "ignored"},
                        {"type": "output_text", "text": "- Key risk: dilution  "}
                    ]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "gpt-test", &server.uri()).unwrap();
        let note = client.note_from_context(&ctx()).await.unwrap();
        assert_eq!(note, "## Tier: Neutral\n- Key risk: dilution");
    }

    #[tokio::test]
    async fn empty_output_is_empty_note() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "resp_1"})))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "gpt-test", &server.uri()).unwrap();
        assert_eq!(client.note_from_context(&ctx()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn server_error_is_external() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test", "gpt-test", &server.uri()).unwrap();
        assert!(client.note_from_context(&ctx()).await.unwrap_err().is_external());
    }
}
