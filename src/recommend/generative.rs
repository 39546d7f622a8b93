use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::retry::with_retry;
use super::{Recommendation, RecommendationProvider, RecommendationRequest};
use crate::config::GenerativeConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Asks a `generateContent`-style text model for a recommendation JSON
/// object built around the computed projection.
pub struct GenerativeRecommendationProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    temperature: f64,
    retries: usize,
    retry_delay_ms: u64,
}

impl GenerativeRecommendationProvider {
    pub fn new(config: &GenerativeConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            client,
            endpoint,
            api_key,
            temperature: config.temperature,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }
}

#[async_trait]
impl RecommendationProvider for GenerativeRecommendationProvider {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn recommend(&self, request: &RecommendationRequest) -> Result<Recommendation> {
        let prompt = build_prompt(request);
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: self.temperature,
            },
        };

        debug!(endpoint = %self.endpoint, "Requesting generative recommendation");
        let response = with_retry(
            || async {
                self.client
                    .post(&self.endpoint)
                    .header("x-goog-api-key", &self.api_key)
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()
            },
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .context("Recommendation request failed")?;

        let response_text = response
            .text()
            .await
            .context("Failed to read recommendation response")?;

        let parsed: GenerateContentResponse = match serde_json::from_str(&response_text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse generateContent response"
                );
                return Err(e).context("Failed to parse generateContent response");
            }
        };

        let candidate_text = first_candidate_text(parsed)
            .ok_or_else(|| anyhow!("Response contained no candidate text"))?;
        let recommendation: Recommendation =
            serde_json::from_str(strip_code_fence(&candidate_text))
                .context("Candidate text is not a recommendation JSON object")?;
        recommendation.validate()?;
        Ok(recommendation)
    }
}

fn first_candidate_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.text)
}

/// Models sometimes wrap JSON in a Markdown code block despite the mime type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub fn build_prompt(request: &RecommendationRequest) -> String {
    let profile = &request.profile;
    let projection = &request.projection;
    format!(
        r#"You are a financial planner specialised in Dutch personal finance and FIRE (financial independence, retire early).

Client profile:
- current age: {current_age}
- target retirement age: {retirement_age} (year {retirement_year})
- current savings and investments: EUR {current_wealth:.0}
- monthly expenses today: EUR {monthly_expenses:.0}
- assumed inflation: {inflation:.1}% per year

Computed projection (do not recompute):
- monthly need at retirement: EUR {monthly_need}
- target nest egg: EUR {target}
- gap to fill: EUR {gap}
- required monthly savings: EUR {savings}
- estimated Box 3 tax this year: EUR {box3}

Respond with a single JSON object and nothing else, using exactly these keys:
{{
  "allocation": {{"stocks": int, "bonds": int, "realEstate": int, "cash": int}},
  "allocationRationale": string,
  "personalizedStrategy": {{
    "summary": string,
    "feasibility": string,
    "actionSteps": [{{"priority": "High" | "Medium" | "Low", "title": string, "description": string, "tag": string}}]
  }},
  "dutchProducts": [{{"name": string, "category": string, "description": string}}],
  "wealthJourney": [{{"year": int, "wealth": int, "milestone": string}}],
  "taxOptimization": {{"box3Strategy": string, "pensionRecommendations": string, "estimatedAnnualSavings": int}}
}}

Allocation percentages must be whole numbers summing to 100. The wealth journey starts in {as_of_year} and ends in {retirement_year}. Mention Jaarruimte, lijfrente and Box 3 where relevant."#,
        current_age = profile.current_age,
        retirement_age = profile.retirement_age,
        retirement_year = request.retirement_year(),
        current_wealth = profile.current_wealth,
        monthly_expenses = profile.monthly_expenses,
        inflation = profile.inflation_rate * 100.0,
        monthly_need = projection.monthly_need_future,
        target = projection.target_nest_egg,
        gap = projection.gap_to_fill,
        savings = projection.monthly_savings,
        box3 = projection.estimated_wealth_tax,
        as_of_year = request.as_of_year,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WealthTaxRules;
    use crate::recommend::StaticRecommendationProvider;
    use crate::recommend::tests::sample_request;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/test-model:generateContent";

    fn provider_for(server: &MockServer) -> GenerativeRecommendationProvider {
        let config = GenerativeConfig {
            base_url: server.uri(),
            model: "test-model".to_string(),
            retries: 0,
            ..GenerativeConfig::default()
        };
        GenerativeRecommendationProvider::new(&config, "test-key".to_string())
            .expect("client builds")
    }

    fn candidate_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": text}]}}
            ]
        })
    }

    fn model_recommendation() -> Recommendation {
        let mut recommendation = StaticRecommendationProvider::new(&WealthTaxRules::default())
            .build(&sample_request());
        recommendation.details.allocation_rationale = "From the model.".to_string();
        recommendation
    }

    async fn mount(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn parses_candidate_json() {
        let server = MockServer::start().await;
        let expected = model_recommendation();
        let text = serde_json::to_string(&expected).expect("serializes");
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(candidate_body(&text)),
        )
        .await;

        let recommendation = provider_for(&server)
            .recommend(&sample_request())
            .await
            .expect("valid response");
        assert_eq!(recommendation, expected);
    }

    #[tokio::test]
    async fn accepts_fenced_candidate_json() {
        let server = MockServer::start().await;
        let expected = model_recommendation();
        let text = format!(
            "```json\n{}\n```",
            serde_json::to_string_pretty(&expected).expect("serializes")
        );
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(candidate_body(&text)),
        )
        .await;

        let recommendation = provider_for(&server)
            .recommend(&sample_request())
            .await
            .expect("fenced JSON accepted");
        assert_eq!(recommendation.details.allocation_rationale, "From the model.");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(500)).await;

        let err = provider_for(&server)
            .recommend(&sample_request())
            .await
            .expect_err("500 must fail");
        assert!(err.to_string().contains("Recommendation request failed"));
    }

    #[tokio::test]
    async fn malformed_candidate_text_is_reported() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(candidate_body("Here is your plan: save more")),
        )
        .await;

        let err = provider_for(&server)
            .recommend(&sample_request())
            .await
            .expect_err("prose must fail");
        assert!(err.to_string().contains("not a recommendation JSON object"));
    }

    #[tokio::test]
    async fn missing_candidates_are_reported() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({"candidates": []})),
        )
        .await;

        let err = provider_for(&server)
            .recommend(&sample_request())
            .await
            .expect_err("empty candidates must fail");
        assert!(err.to_string().contains("no candidate text"));
    }

    #[tokio::test]
    async fn invalid_allocation_is_rejected() {
        let server = MockServer::start().await;
        let mut bad = model_recommendation();
        bad.allocation.stocks = 90;
        let text = serde_json::to_string(&bad).expect("serializes");
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(candidate_body(&text)),
        )
        .await;

        let err = provider_for(&server)
            .recommend(&sample_request())
            .await
            .expect_err("allocation over 100 must fail");
        assert!(err.to_string().contains("sum to 100"));
    }

    #[test]
    fn strip_code_fence_handles_plain_and_fenced_text() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn prompt_carries_computed_numbers() {
        let request = sample_request();
        let prompt = build_prompt(&request);
        assert!(prompt.contains(&format!(
            "target nest egg: EUR {}",
            request.projection.target_nest_egg
        )));
        assert!(prompt.contains("current age: 30"));
        assert!(prompt.contains("(year 2046)"));
        assert!(prompt.contains("\"allocationRationale\": string"));
    }
}
