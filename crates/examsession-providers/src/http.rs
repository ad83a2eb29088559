//! HTTP client for the exam platform's content and scoring endpoints.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use examsession_core::error::ServiceError;
use examsession_core::model::{AnswerOption, AnswerVerdict, Question, SubmissionResult};
use examsession_core::traits::{ContentService, ScoringService, SubmitRequest};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Talks to `/tests/questions` and `/tests/submit`.
pub struct HttpExamService {
    base_url: String,
    api_token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpExamService {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };
        let timeout_secs = timeout.map_or(DEFAULT_TIMEOUT_SECS, |t| t.as_secs().max(1));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ServiceError::Network(format!("exam service not reachable at {}", self.base_url))
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDto {
    id: String,
    #[serde(default)]
    subject_id: Option<String>,
    question: String,
    #[serde(default)]
    options: Vec<OptionDto>,
}

#[derive(Deserialize)]
struct OptionDto {
    id: String,
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultDto {
    id: String,
    #[serde(default)]
    user_id: Option<String>,
    subject_id: String,
    subject_name: String,
    score: u32,
    max_score: u32,
    total_questions: u32,
    correct_answers: u32,
    date: DateTime<Utc>,
    #[serde(default)]
    answers: Vec<AnswerResultDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResultDto {
    question_id: String,
    #[serde(default)]
    selected_option_id: Option<String>,
    is_correct: bool,
    #[serde(default)]
    correct_option_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn a non-success response into a `ServiceError`.
async fn error_from_response(response: reqwest::Response, what: &str) -> ServiceError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    if status == 404 {
        ServiceError::NotFound(if message.is_empty() {
            what.to_string()
        } else {
            message
        })
    } else {
        ServiceError::Api { status, message }
    }
}

#[async_trait]
impl ContentService for HttpExamService {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self))]
    async fn get_questions(&self, subject_id: &str) -> Result<Vec<Question>, ServiceError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/tests/questions", self.base_url),
            &[("subjectId", subject_id)],
        )
        .map_err(|e| ServiceError::Network(format!("invalid URL: {e}")))?;

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response, subject_id).await);
        }

        let questions: Vec<QuestionDto> = response.json().await.map_err(|e| {
            ServiceError::InvalidResponse(format!("failed to parse questions: {e}"))
        })?;

        Ok(questions
            .into_iter()
            .map(|q| Question {
                id: q.id,
                subject_id: q.subject_id.unwrap_or_else(|| subject_id.to_string()),
                prompt: q.question,
                options: q
                    .options
                    .into_iter()
                    .map(|o| AnswerOption {
                        id: o.id,
                        text: o.text,
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl ScoringService for HttpExamService {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(subject = %request.subject_id))]
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionResult, ServiceError> {
        let response = self
            .authorize(self.client.post(format!("{}/tests/submit", self.base_url)))
            .json(request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &request.subject_id).await);
        }

        let dto: ResultDto = response.json().await.map_err(|e| {
            ServiceError::InvalidResponse(format!("failed to parse result: {e}"))
        })?;

        Ok(SubmissionResult {
            id: dto.id,
            subject_id: dto.subject_id,
            subject_name: dto.subject_name,
            score: dto.score,
            max_score: dto.max_score,
            total_questions: dto.total_questions,
            correct_answers: dto.correct_answers,
            timestamp: dto.date,
            user_id: dto.user_id.unwrap_or_default(),
            answers: dto
                .answers
                .into_iter()
                .map(|a| AnswerVerdict {
                    question_id: a.question_id,
                    selected_option_id: a.selected_option_id,
                    is_correct: a.is_correct,
                    correct_option_id: a.correct_option_id,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examsession_core::traits::AnswerEntry;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer, token: Option<&str>) -> HttpExamService {
        HttpExamService::new(&server.uri(), token.map(str::to_string), None).unwrap()
    }

    #[tokio::test]
    async fn fetches_questions() {
        let server = MockServer::start().await;

        let body = serde_json::json!([
            {
                "id": "101",
                "subjectId": "math",
                "question": "2 + 2 = ?",
                "options": [{"id": "1", "text": "3"}, {"id": "2", "text": "4"}]
            },
            {
                "id": "102",
                "question": "3 * 3 = ?",
                "options": [{"id": "3", "text": "9"}]
            }
        ]);

        Mock::given(method("GET"))
            .and(path("/tests/questions"))
            .and(query_param("subjectId", "math"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let questions = service(&server, Some("secret"))
            .get_questions("math")
            .await
            .unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].prompt, "2 + 2 = ?");
        assert_eq!(questions[0].options[1].id, "2");
        // Missing subjectId falls back to the requested subject.
        assert_eq!(questions[1].subject_id, "math");
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tests/questions"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"message": "Subject not found"})),
            )
            .mount(&server)
            .await;

        let err = service(&server, None)
            .get_questions("astrology")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound("Subject not found".into()));
    }

    #[tokio::test]
    async fn malformed_questions_are_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tests/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = service(&server, None).get_questions("math").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn submits_answers() {
        let server = MockServer::start().await;

        let expected_body = serde_json::json!({
            "subjectId": "math",
            "answers": [
                {"questionId": "101", "selectedOptionId": "2"},
                {"questionId": "102"}
            ]
        });
        let response_body = serde_json::json!({
            "id": "77",
            "userId": "5",
            "subjectId": "math",
            "subjectName": "Mathematics",
            "score": 5,
            "maxScore": 10,
            "totalQuestions": 2,
            "correctAnswers": 1,
            "date": "2026-05-01T10:00:00Z",
            "answers": [
                {"questionId": "101", "selectedOptionId": "2", "isCorrect": true, "correctOptionId": "2"}
            ]
        });

        Mock::given(method("POST"))
            .and(path("/tests/submit"))
            .and(body_json(&expected_body))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .expect(1)
            .mount(&server)
            .await;

        let request = SubmitRequest {
            subject_id: "math".into(),
            answers: vec![
                AnswerEntry {
                    question_id: "101".into(),
                    selected_option_id: Some("2".into()),
                },
                AnswerEntry {
                    question_id: "102".into(),
                    selected_option_id: None,
                },
            ],
        };
        let result = service(&server, None).submit(&request).await.unwrap();
        assert_eq!(result.id, "77");
        assert_eq!(result.score, 5);
        assert_eq!(result.max_score, 10);
        assert_eq!(result.user_id, "5");
        assert_eq!(result.answers.len(), 1);
        assert!(result.answers[0].is_correct);
    }

    #[tokio::test]
    async fn submit_error_carries_server_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/tests/submit"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"message": "Option does not match question"})),
            )
            .mount(&server)
            .await;

        let request = SubmitRequest {
            subject_id: "math".into(),
            answers: vec![],
        };
        let err = service(&server, None).submit(&request).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::Api {
                status: 400,
                message: "Option does not match question".into()
            }
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        // Nothing listens on this port.
        let service = HttpExamService::new("http://127.0.0.1:9", None, None).unwrap();
        let err = service.get_questions("math").await.unwrap_err();
        assert!(matches!(err, ServiceError::Network(_)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let service = HttpExamService::new("http://example.test/api/", None, None).unwrap();
        assert_eq!(service.base_url(), "http://example.test/api");
        let service = HttpExamService::new("", None, None).unwrap();
        assert_eq!(service.base_url(), DEFAULT_BASE_URL);
    }
}
