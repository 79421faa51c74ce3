//! Tolerant extraction of structured analysis from model free text.
//!
//! Models wrap JSON in code fences or prose. The object is taken from the
//! first `{` to the last `}` (or `[` .. `]` for pattern lists) and decoded
//! into a shape without technical levels; levels are always derived locally.

use market_core::{MarketError, Pattern, Sentiment};
use serde::Deserialize;

/// Analysis fields a model is asked to produce.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAnalysis {
    pub summary: String,
    pub sentiment: Sentiment,
    pub key_points: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    pub recommendation: String,
    pub confidence: f64,
}

fn malformed(detail: impl std::fmt::Display) -> MarketError {
    MarketError::MalformedUpstreamResponse(format!("gemini: {}", detail))
}

fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        trimmed.replace("```json", "").replace("```", "").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start < end).then(|| &text[start..=end])
}

pub fn parse_analysis(text: &str) -> Result<PartialAnalysis, MarketError> {
    let cleaned = strip_fences(text);
    let json = slice_between(&cleaned, '{', '}').ok_or_else(|| malformed("no JSON object in response"))?;

    let mut partial: PartialAnalysis = serde_json::from_str(json).map_err(malformed)?;
    if !partial.confidence.is_finite() {
        return Err(malformed("confidence is not a number"));
    }
    partial.confidence = partial.confidence.clamp(0.0, 1.0);
    Ok(partial)
}

pub fn parse_patterns(text: &str) -> Result<Vec<Pattern>, MarketError> {
    let cleaned = strip_fences(text);
    let json = slice_between(&cleaned, '[', ']').ok_or_else(|| malformed("no JSON array in response"))?;
    serde_json::from_str(json).map_err(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{ErrorKind, PatternSignificance};

    const BODY: &str = r#"{
        "summary": "Apple holds its range.",
        "sentiment": "cautiously bullish",
        "keyPoints": ["RSI is 55", "Above the 50-day"],
        "patterns": [{"name": "Flag", "description": "Continuation", "significance": "Medium"}],
        "recommendation": "Hold.",
        "confidence": 0.72
    }"#;

    #[test]
    fn test_parses_fenced_json_with_prose() {
        let text = format!("Here is the analysis:\n```json\n{}\n```\nLet me know!", BODY);
        let partial = parse_analysis(&text).unwrap();
        assert_eq!(partial.sentiment, Sentiment::Bullish);
        assert_eq!(partial.key_points.len(), 2);
        assert_eq!(partial.patterns[0].significance, PatternSignificance::Medium);
        assert_eq!(partial.confidence, 0.72);
    }

    #[test]
    fn test_prose_around_bare_object() {
        let text = format!("Sure. {} Hope that helps.", BODY);
        assert_eq!(parse_analysis(&text).unwrap().summary, "Apple holds its range.");
    }

    #[test]
    fn test_confidence_is_clamped() {
        let text = BODY.replace("0.72", "85");
        assert_eq!(parse_analysis(&text).unwrap().confidence, 1.0);
        let text = BODY.replace("0.72", "-0.2");
        assert_eq!(parse_analysis(&text).unwrap().confidence, 0.0);
    }

    #[test]
    fn test_missing_patterns_default_empty() {
        let text = r#"{"summary":"s","sentiment":"neutral","keyPoints":[],"recommendation":"r","confidence":0.5}"#;
        assert!(parse_analysis(text).unwrap().patterns.is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        for text in ["", "no json here", "} backwards {", r#"{"summary": 1}"#] {
            let err = parse_analysis(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedUpstreamResponse, "input: {:?}", text);
        }
    }

    #[test]
    fn test_pattern_array() {
        let text = r#"Patterns found:
[{"name": "Double Bottom", "description": "Reversal", "significance": "high"}]"#;
        let patterns = parse_patterns(text).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].name, "Double Bottom");
        assert_eq!(
            parse_patterns("none").unwrap_err().kind(),
            ErrorKind::MalformedUpstreamResponse
        );
    }
}
