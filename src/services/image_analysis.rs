use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Confidence (0 to 100) a detection must exceed to count as a real issue.
pub const CONFIDENCE_THRESHOLD: f64 = 60.0;

const SYSTEM_PROMPT: &str = r#"You are an expert in maintaining urban infrastructure for electric vehicles.
Analyse images taken by surveillance drones and identify precisely the problems they show.

Fault categories to identify:
- Faulty charging station (broken screen, damaged cable, socket out of order)
- Damaged parking spot (worn markings, damaged surface, obstacle)
- Obstacle on the road (debris, badly parked vehicle, broken barrier)
- Failing lighting (street lamp off, broken bulb)
- Abandoned vehicle (no plate, poor condition)
- Electrical infrastructure (exposed cable, damaged transformer)

Reply in JSON with:
{
  "issue_type": "detected fault type",
  "severity": "low" | "medium" | "high" | "critical",
  "description": "detailed description of the problem",
  "recommended_action": "recommended action to fix it",
  "confidence": 0-100
}"#;

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("Image URL is required")]
    MissingImageUrl,

    #[error("Image analysis is not configured")]
    NotConfigured,

    #[error("Rate limit exceeded, try again in a moment")]
    RateLimited,

    #[error("Analysis credits exhausted")]
    QuotaExhausted,

    #[error("Vision gateway returned {0}")]
    Gateway(StatusCode),

    #[error("No content in vision gateway response")]
    EmptyResponse,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub issue_type: String,
    pub severity: Severity,
    pub description: String,
    pub recommended_action: String,
    pub confidence: f64,
}

impl ImageAnalysis {
    /// Whether the detection is worth an alert.
    pub fn is_real_issue(&self) -> bool {
        self.confidence > CONFIDENCE_THRESHOLD && self.severity != Severity::Low
    }

    fn manual_review(content: &str) -> Self {
        Self {
            issue_type: "Manual analysis required".to_string(),
            severity: Severity::Medium,
            description: content.to_string(),
            recommended_action: "Manual inspection recommended".to_string(),
            confidence: 70.0,
        }
    }

    fn unparseable(content: &str) -> Self {
        Self {
            issue_type: "Analysis error".to_string(),
            severity: Severity::Medium,
            description: content.to_string(),
            recommended_action: "Manual verification needed".to_string(),
            confidence: 50.0,
        }
    }
}

/// Successful analysis, as returned by the analysis endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub analysis: ImageAnalysis,
    pub raw_response: String,
}

impl AnalysisReport {
    pub fn new(analysis: ImageAnalysis, raw_response: String) -> Self {
        Self {
            success: true,
            analysis,
            raw_response,
        }
    }
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image_url: &str,
        context: Option<&str>,
    ) -> Result<AnalysisReport, AnalysisError>;
}

// Fenced ```json block first, then the outermost {...} span.
fn extract_json(content: &str) -> Option<&str> {
    if let Some(start) = content.find("```json") {
        let body = &content[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start + 1).then(|| &content[start..=end])
}

/// Turns the model's free-text reply into an analysis, never failing.
pub fn parse_analysis(content: &str) -> ImageAnalysis {
    match extract_json(content) {
        Some(json) => serde_json::from_str(json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not parse analysis JSON");
            ImageAnalysis::unparseable(content)
        }),
        None => ImageAnalysis::manual_review(content),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for an OpenAI-style chat completions endpoint with vision support.
pub struct VisionGatewayAnalyzer {
    client: Client,
    endpoint: String,
    api_key: Secret<String>,
    model: String,
}

impl VisionGatewayAnalyzer {
    pub fn new(endpoint: impl Into<String>, api_key: Secret<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ImageAnalyzer for VisionGatewayAnalyzer {
    #[tracing::instrument(skip(self, context))]
    async fn analyze(
        &self,
        image_url: &str,
        context: Option<&str>,
    ) -> Result<AnalysisReport, AnalysisError> {
        if image_url.trim().is_empty() {
            return Err(AnalysisError::MissingImageUrl);
        }

        let prompt = match context {
            Some(context) => format!("Context: {}\n\nAnalyse this image and identify the problems.", context),
            None => "Analyse this image and identify the problems.".to_string(),
        };

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        { "type": "image_url", "image_url": { "url": image_url } }
                    ]
                }
            ],
            "temperature": 0.3,
            "max_tokens": 500
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(status = %status, body = %error_text, "Vision gateway error");

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => AnalysisError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => AnalysisError::QuotaExhausted,
                other => AnalysisError::Gateway(other),
            });
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)?;

        let analysis = parse_analysis(&content);

        tracing::info!(
            issue_type = %analysis.issue_type,
            severity = ?analysis.severity,
            confidence = analysis.confidence,
            "Image analysed"
        );

        Ok(AnalysisReport::new(analysis, content))
    }
}

/// Stand-in used when no gateway credentials are configured.
pub struct UnconfiguredAnalyzer;

#[async_trait]
impl ImageAnalyzer for UnconfiguredAnalyzer {
    async fn analyze(
        &self,
        _image_url: &str,
        _context: Option<&str>,
    ) -> Result<AnalysisReport, AnalysisError> {
        Err(AnalysisError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn analysis(confidence: f64, severity: Severity) -> ImageAnalysis {
        ImageAnalysis {
            issue_type: "Faulty charging station".to_string(),
            severity,
            description: "Cracked screen".to_string(),
            recommended_action: "Replace screen".to_string(),
            confidence,
        }
    }

    #[test]
    fn test_decision_boundary() {
        assert!(analysis(75.0, Severity::Medium).is_real_issue());
        assert!(!analysis(80.0, Severity::Low).is_real_issue());
        assert!(!analysis(50.0, Severity::Critical).is_real_issue());
        assert!(!analysis(60.0, Severity::High).is_real_issue());
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "Here is my analysis:\n```json\n{\"issue_type\": \"Failing lighting\", \"severity\": \"high\", \"description\": \"Lamp off\", \"recommended_action\": \"Replace bulb\", \"confidence\": 85}\n```";
        let parsed = parse_analysis(content);
        assert_eq!(parsed.issue_type, "Failing lighting");
        assert_eq!(parsed.severity, Severity::High);
        assert_eq!(parsed.confidence, 85.0);
    }

    #[test]
    fn test_parse_raw_json() {
        let content = "Result {\"issue_type\": \"Obstacle on the road\", \"severity\": \"low\", \"description\": \"Branch\", \"recommended_action\": \"Remove\", \"confidence\": 40} done";
        let parsed = parse_analysis(content);
        assert_eq!(parsed.severity, Severity::Low);
        assert!(!parsed.is_real_issue());
    }

    #[test]
    fn test_parse_fallbacks() {
        let plain = parse_analysis("The street looks fine.");
        assert_eq!(plain.issue_type, "Manual analysis required");
        assert_eq!(plain.confidence, 70.0);
        assert_eq!(plain.description, "The street looks fine.");

        let broken = parse_analysis("{ not json at all }");
        assert_eq!(broken.issue_type, "Analysis error");
        assert_eq!(broken.confidence, 50.0);
    }

    fn analyzer(server: &MockServer) -> VisionGatewayAnalyzer {
        VisionGatewayAnalyzer::new(
            format!("{}/v1/chat/completions", server.uri()),
            Secret::new("test-key".to_string()),
            DEFAULT_MODEL,
        )
    }

    #[tokio::test]
    async fn test_gateway_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "content": "```json\n{\"issue_type\": \"Damaged parking spot\", \"severity\": \"medium\", \"description\": \"Worn markings\", \"recommended_action\": \"Repaint\", \"confidence\": 75}\n```"
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = analyzer(&server)
            .analyze("https://img.example/1.jpg", Some("Patrol"))
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.analysis.issue_type, "Damaged parking spot");
        assert!(report.analysis.is_real_issue());
        assert!(report.raw_response.contains("Worn markings"));
    }

    async fn error_for(status: u16) -> AnalysisError {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        analyzer(&server)
            .analyze("https://img.example/1.jpg", None)
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_gateway_status_mapping() {
        assert!(matches!(error_for(429).await, AnalysisError::RateLimited));
        assert!(matches!(error_for(402).await, AnalysisError::QuotaExhausted));
        assert!(matches!(
            error_for(500).await,
            AnalysisError::Gateway(StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }

    #[tokio::test]
    async fn test_missing_image_url() {
        let server = MockServer::start().await;
        let err = analyzer(&server).analyze("  ", None).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingImageUrl));
    }
}
