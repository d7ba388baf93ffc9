//! OpenAI API content generator.
//!
//! Every operation is one chat-completions call instructed to answer with
//! bare JSON; the payload structs here are the wire contract between the
//! prompt and the parser.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use simulado_core::error::GeneratorError;
use simulado_core::model::{CutoffEstimate, EssayPrompt, EssayResult, Question};
use simulado_core::traits::{ContentGenerator, QuestionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const SYSTEM_PROMPT: &str = "You are an ENEM exam content engine. Respond ONLY with the JSON \
    asked for. No markdown fences, no explanations, no text outside the JSON.";

/// OpenAI-compatible API content generator.
pub struct OpenAiGenerator {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, base_url: Option<String>, model: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client,
        }
    }

    /// One chat-completions round trip; returns the first choice's content.
    async fn chat(&self, user_prompt: String) -> Result<String, GeneratorError> {
        let body = ChatRequest {
            model: self.model.clone(),
            temperature: 0.7,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    GeneratorError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(GeneratorError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if status == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::AuthenticationFailed(body));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status,
                message: body,
            });
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            GeneratorError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GeneratorError::InvalidResponse("response had no choices".into()))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct QuestionPayload {
    subject: String,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    topic: String,
}

#[derive(Deserialize)]
struct EssayPromptPayload {
    theme: String,
    #[serde(default)]
    supporting_text: String,
}

#[derive(Deserialize)]
struct EssayGradePayload {
    total: u32,
    #[serde(default)]
    competencies: Vec<u32>,
    #[serde(default)]
    feedback: String,
}

#[derive(Deserialize)]
struct CutoffPayload {
    course: String,
    cutoff: f64,
}

/// Models occasionally wrap the JSON in a markdown fence despite the system
/// prompt; strip it before parsing.
fn strip_json_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_payload<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, GeneratorError> {
    serde_json::from_str(strip_json_fences(content))
        .map_err(|e| GeneratorError::InvalidResponse(format!("bad JSON payload: {e}")))
}

#[async_trait]
impl ContentGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(area = %request.area, count = request.count))]
    async fn fetch_questions(
        &self,
        request: &QuestionRequest,
    ) -> Result<Vec<Question>, GeneratorError> {
        let mut prompt = format!(
            "Generate exactly {} multiple-choice ENEM questions for the knowledge area \
             \"{}\". Each question has 5 options and exactly one correct answer.",
            request.count, request.area
        );
        if let Some(language) = request.language {
            prompt.push_str(&format!(
                " These are foreign-language questions in {language}: reading comprehension \
                 of a short text in that language."
            ));
        }
        if let Some(topics) = &request.topic_filter {
            prompt.push_str(&format!(
                " Restrict every question to these topics: {}.",
                topics.join(", ")
            ));
        }
        prompt.push_str(
            " Respond with a JSON array where each element is \
             {\"subject\": string, \"prompt\": string, \"options\": [5 strings], \
             \"correct_index\": 0-4, \"topic\": string}.",
        );

        let content = self.chat(prompt).await?;
        let payloads: Vec<QuestionPayload> = parse_payload(&content)?;

        payloads
            .into_iter()
            .map(|p| {
                if p.options.is_empty() || p.correct_index >= p.options.len() {
                    return Err(GeneratorError::InvalidResponse(format!(
                        "correct_index {} out of range for {} options",
                        p.correct_index,
                        p.options.len()
                    )));
                }
                Ok(Question {
                    area: request.area,
                    subject: p.subject,
                    prompt: p.prompt,
                    options: p.options,
                    correct_index: p.correct_index,
                    topic: p.topic,
                    source: self.model.clone(),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn fetch_essay_prompt(&self) -> Result<EssayPrompt, GeneratorError> {
        let prompt = "Generate one ENEM-style argumentative essay prompt on a current \
             Brazilian social issue. Respond with a JSON object \
             {\"theme\": string, \"supporting_text\": string}."
            .to_string();
        let content = self.chat(prompt).await?;
        let payload: EssayPromptPayload = parse_payload(&content)?;
        Ok(EssayPrompt {
            theme: payload.theme,
            supporting_text: payload.supporting_text,
        })
    }

    #[instrument(skip(self, text, prompt), fields(chars = text.chars().count()))]
    async fn grade_essay(
        &self,
        text: &str,
        prompt: Option<&EssayPrompt>,
    ) -> Result<EssayResult, GeneratorError> {
        let theme = prompt.map(|p| p.theme.as_str()).unwrap_or("free theme");
        let user_prompt = format!(
            "Grade this ENEM essay on the theme \"{theme}\" using the five official \
             competencies (each 0-200, total 0-1000). Respond with a JSON object \
             {{\"total\": 0-1000, \"competencies\": [5 integers], \"feedback\": string}}.\n\
             Essay:\n{text}"
        );
        let content = self.chat(user_prompt).await?;
        let payload: EssayGradePayload = parse_payload(&content)?;
        if payload.total > 1000 {
            return Err(GeneratorError::InvalidResponse(format!(
                "essay total {} exceeds 1000",
                payload.total
            )));
        }
        Ok(EssayResult {
            total: payload.total,
            competencies: payload.competencies,
            feedback: payload.feedback,
        })
    }

    #[instrument(skip(self, courses), fields(courses = courses.len()))]
    async fn estimate_cutoffs(
        &self,
        courses: &[String],
    ) -> Result<Vec<CutoffEstimate>, GeneratorError> {
        let user_prompt = format!(
            "Estimate typical SISU admission cutoff scores (0-1000 scale) at Brazilian \
             federal universities for these courses: {}. Respond with a JSON array of \
             {{\"course\": string, \"cutoff\": number}}, one element per course.",
            courses.join(", ")
        );
        let content = self.chat(user_prompt).await?;
        let payloads: Vec<CutoffPayload> = parse_payload(&content)?;
        Ok(payloads
            .into_iter()
            .map(|p| CutoffEstimate {
                course: p.course,
                cutoff: p.cutoff,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulado_core::model::Area;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_body(content: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"content": content.to_string(), "role": "assistant"}, "index": 0}],
            "model": "gpt-4.1-mini"
        })
    }

    fn question_json(topic: &str) -> serde_json::Value {
        serde_json::json!({
            "subject": "algebra",
            "prompt": "2 + 2 = ?",
            "options": ["2", "3", "4", "5", "6"],
            "correct_index": 2,
            "topic": topic
        })
    }

    fn request(count: usize) -> QuestionRequest {
        QuestionRequest {
            area: Area::Mathematics,
            count,
            topic_filter: None,
            language: None,
        }
    }

    #[tokio::test]
    async fn fetches_and_parses_questions() {
        let server = MockServer::start().await;
        let payload = serde_json::json!([question_json("fractions"), question_json("geometry")]);

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&payload)))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("test-key", Some(server.uri()), None);
        let questions = generator.fetch_questions(&request(2)).await.unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].area, Area::Mathematics);
        assert_eq!(questions[0].correct_index, 2);
        assert_eq!(questions[1].topic, "geometry");
    }

    #[tokio::test]
    async fn strips_markdown_fences_from_payload() {
        let server = MockServer::start().await;
        let fenced = format!("```json\n[{}]\n```", question_json("fractions"));
        let body = serde_json::json!({
            "choices": [{"message": {"content": fenced, "role": "assistant"}, "index": 0}],
            "model": "gpt-4.1-mini"
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("key", Some(server.uri()), None);
        let questions = generator.fetch_questions(&request(1)).await.unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_correct_index_is_invalid() {
        let server = MockServer::start().await;
        let payload = serde_json::json!([{
            "subject": "s", "prompt": "p", "options": ["a", "b"],
            "correct_index": 5, "topic": "t"
        }]);

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&payload)))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("key", Some(server.uri()), None);
        let err = generator.fetch_questions(&request(1)).await.unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn rate_limit_maps_with_retry_hint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("key", Some(server.uri()), None);
        let err = generator.fetch_questions(&request(1)).await.unwrap_err();
        assert_eq!(err.retry_after_ms(), Some(2000));
    }

    #[tokio::test]
    async fn auth_failure_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("bad-key", Some(server.uri()), None);
        let err = generator.fetch_essay_prompt().await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("key", Some(server.uri()), None);
        let err = generator
            .estimate_cutoffs(&["medicine".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Api { status: 500, .. }));
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn grades_an_essay() {
        let server = MockServer::start().await;
        let payload = serde_json::json!({
            "total": 820,
            "competencies": [160, 180, 160, 160, 160],
            "feedback": "solid structure"
        });

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&payload)))
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new("key", Some(server.uri()), None);
        let result = generator.grade_essay("my essay", None).await.unwrap();
        assert_eq!(result.total, 820);
        assert_eq!(result.competencies.len(), 5);
    }
}
