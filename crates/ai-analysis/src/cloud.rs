//! Hosted model backend (Gemini `generateContent`).

use async_trait::async_trait;
use data_providers::HttpClient;
use market_core::{
    require_key, AiAnalysis, AiProvider, AiService, AnalysisKind, Clock, IndicatorBundle,
    MarketError, Pattern, PriceBar, Quote, GEMINI_API_KEY,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use technical_analysis::compute_bundle;
use uuid::Uuid;

use crate::parse::{parse_analysis, parse_patterns};
use crate::prompts;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER_ID: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: Option<String>,
}

pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    http: HttpClient,
    clock: Arc<dyn Clock>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
            http: HttpClient::unthrottled(PROVIDER_ID),
            clock,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sends one prompt and returns the first candidate's text.
    async fn generate_content(&self, prompt: &str) -> Result<String, MarketError> {
        let key = require_key(self.api_key.as_deref(), GEMINI_API_KEY)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [Content { parts: [Part { text: prompt }] }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        tracing::debug!("Calling Gemini model {} ({} prompt chars)", self.model, prompt.len());
        let request = self.http.post(&url).query(&[("key", key)]).json(&body);
        let response: GenerateResponse = self.http.send_json(request).await?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                MarketError::MalformedUpstreamResponse("gemini: response has no candidate text".into())
            })
    }
}

#[async_trait]
impl AiService for GeminiClient {
    fn provider(&self) -> AiProvider {
        AiProvider::Cloud
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Levels are left empty; the orchestrator derives them locally.
    async fn analyze(&self, quote: &Quote, history: &[PriceBar], kind: AnalysisKind) -> Result<AiAnalysis, MarketError> {
        require_key(self.api_key.as_deref(), GEMINI_API_KEY)?;

        let indicators = compute_bundle(history);
        let quote = quote.with_range_from(history);
        let prompt = prompts::analysis_prompt(&quote, &indicators, kind);

        let text = self.generate_content(&prompt).await?;
        let partial = parse_analysis(&text)?;

        Ok(AiAnalysis {
            id: Uuid::new_v4(),
            ticker: quote.ticker.clone(),
            kind,
            summary: partial.summary,
            sentiment: partial.sentiment,
            key_points: partial.key_points,
            patterns: partial.patterns,
            technical_levels: Vec::new(),
            recommendation: partial.recommendation,
            confidence: partial.confidence,
            provider: AiProvider::Cloud,
            fetched_at: self.clock.now(),
        })
    }

    async fn detect_patterns(&self, history: &[PriceBar]) -> Result<Vec<Pattern>, MarketError> {
        let text = self.generate_content(&prompts::pattern_prompt(history)).await?;
        parse_patterns(&text)
    }

    async fn generate_insights(&self, quote: &Quote, indicators: &IndicatorBundle) -> Result<String, MarketError> {
        self.generate_content(&prompts::insights_prompt(quote, indicators)).await
    }

    async fn answer_question(&self, question: &str, quote: &Quote, context: &str) -> Result<String, MarketError> {
        self.generate_content(&prompts::question_prompt(question, quote, context)).await
    }
}
