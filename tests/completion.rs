//! Gemini completion and token counting against a mock HTTP server

use std::sync::Arc;

use mockito::Matcher;
use secrecy::SecretString;

use chatterbox::context::{ContextLimits, ConversationContext, TokenEstimator, Turn};
use chatterbox::llm::{
    CompletionClient, CompletionError, CompletionOutcome, GeminiClient, OVERLOADED_REPLY,
};

const MODEL: &str = "gemini-2.0-flash-lite";
const GENERATE: &str = "/v1beta/models/gemini-2.0-flash-lite:generateContent";
const COUNT: &str = "/v1beta/models/gemini-2.0-flash-lite:countTokens";

fn gemini(server: &mockito::Server) -> Arc<GeminiClient> {
    Arc::new(
        GeminiClient::new(SecretString::from("test-key".to_string()), MODEL)
            .unwrap()
            .with_base_url(server.url()),
    )
}

fn error_body(code: u16, message: &str) -> String {
    serde_json::json!({ "error": { "code": code, "message": message, "status": "UNAVAILABLE" } })
        .to_string()
}

#[tokio::test]
async fn test_generate_sends_history_and_system_instruction() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE)
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::Json(serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "Hi" }] },
                { "role": "model", "parts": [{ "text": "Hello!" }] },
                { "role": "user", "parts": [{ "text": "What's 2+2?" }] },
            ],
            "systemInstruction": { "parts": [{ "text": "You are a helpful AI assistant." }] },
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": "4" }] } }],
                "usageMetadata": { "promptTokenCount": 20, "candidatesTokenCount": 1, "totalTokenCount": 21 }
            }"#,
        )
        .create_async()
        .await;

    let client = CompletionClient::new(gemini(&server));
    let history = vec![Turn::user("Hi"), Turn::assistant("Hello!")];
    let outcome = client
        .complete("You are a helpful AI assistant.", &history, "What's 2+2?")
        .await;

    assert!(matches!(outcome, CompletionOutcome::Success(ref text) if text == "4"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_overloaded_model_yields_fallback_reply() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE)
        .with_status(503)
        .with_body(error_body(503, "The model is overloaded. Please try again later."))
        .create_async()
        .await;

    let client = CompletionClient::new(gemini(&server));
    let outcome = client.complete("sys", &[], "Hi").await;

    assert!(matches!(outcome, CompletionOutcome::TransientFailure(_)));
    assert_eq!(outcome.reply(), Some(OVERLOADED_REPLY));
    assert_eq!(outcome.into_result().unwrap(), OVERLOADED_REPLY);
}

#[tokio::test]
async fn test_quota_error_without_capacity_wording_is_hard_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE)
        .with_status(429)
        .with_body(error_body(429, "Resource has been exhausted (e.g. check quota)."))
        .create_async()
        .await;

    let client = CompletionClient::new(gemini(&server));
    let outcome = client.complete("sys", &[], "Hi").await;

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, CompletionError::Provider(_)));
    assert!(err.to_string().contains("Resource has been exhausted"));
}

#[tokio::test]
async fn test_blocked_prompt_is_empty_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", GENERATE)
        .with_status(200)
        .with_body(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
        .create_async()
        .await;

    let client = CompletionClient::new(gemini(&server));
    let outcome = client.complete("sys", &[], "Hi").await;

    assert!(matches!(
        outcome,
        CompletionOutcome::HardFailure(CompletionError::EmptyResponse)
    ));
}

#[tokio::test]
async fn test_count_tokens_uses_provider_total() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", COUNT)
        .match_body(Matcher::PartialJsonString(
            r#"{"contents": [{"role": "user", "parts": [{"text": "Hi"}]}]}"#.to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"totalTokens": 42}"#)
        .create_async()
        .await;

    let estimator = TokenEstimator::new(gemini(&server), 1.33);
    assert_eq!(estimator.estimate(&[Turn::user("Hi")]).await, 42);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_count_tokens_failure_falls_back_to_words() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", COUNT)
        .with_status(500)
        .with_body(error_body(500, "An internal error has occurred."))
        .create_async()
        .await;

    let estimator = TokenEstimator::new(gemini(&server), 1.33);
    let turns = vec![Turn::user("Hi"), Turn::assistant("Hello!")];

    // 2 words × 1.33 rounds to 3
    assert_eq!(estimator.estimate(&turns).await, 3);
}

#[tokio::test]
async fn test_count_text_failure_falls_back_to_words() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", COUNT)
        .with_status(500)
        .with_body(error_body(500, "An internal error has occurred."))
        .expect(1)
        .create_async()
        .await;

    let estimator = TokenEstimator::new(gemini(&server), 1.33);

    // 4 words × 1.33 rounds to 5
    assert_eq!(estimator.estimate_text("four score and seven").await, 5);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_history_is_not_counted_remotely() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", COUNT)
        .expect(0)
        .create_async()
        .await;

    let estimator = TokenEstimator::new(gemini(&server), 1.33);
    assert_eq!(estimator.estimate(&[]).await, 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_context_trims_with_provider_counts() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", COUNT)
        .with_status(200)
        .with_body(r#"{"totalTokens": 12}"#)
        .create_async()
        .await;

    let limits = ContextLimits {
        max_context_tokens: 10,
        trim_trigger_fraction: 0.9,
    };
    let estimator = TokenEstimator::new(gemini(&server), 1.33);
    let mut context = ConversationContext::new("sys", limits, estimator);

    let report = context.append("Explain", "a very long answer").await;

    assert!(context.is_empty());
    assert_eq!(report.turns_evicted, 2);
    assert_eq!(report.estimated_tokens, 0);
    assert_eq!(context.system_instruction(), "sys");
}
