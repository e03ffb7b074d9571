//! OpenAI backend implementation.
//!
//! Talks to the chat completions endpoint of the OpenAI API or any
//! compatible server.

use super::{clean_response, CompletionClient, LlmError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "OpenAI";

/// OpenAI backend for GPT models.
pub struct OpenAIClient {
    model: String,
    api_key: String,
    api_base: String,
    client: Client,
}

impl OpenAIClient {
    /// Create a new OpenAI client.
    pub fn new(model: String, api_key: String, api_base: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_http_client(model, api_key, api_base, client))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_http_client(model: String, api_key: String, api_base: String, client: Client) -> Self {
        Self {
            model,
            api_key,
            api_base,
            client,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: &self.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: 300,
            temperature: 0.2,
        };

        debug!("Requesting completion from {}", self.completions_url());

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to connect to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Result<OpenAIError, _> = response.json().await;
            let message = body
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api {
                provider: PROVIDER,
                status,
                message,
            }
            .into());
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        let text = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| clean_response(&content))
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse(PROVIDER))?;

        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answer a single HTTP request with `status` and `body`.
    ///
    /// Returns the base URL to use and a handle yielding the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (base, handle)
    }

    fn client_for(base: String) -> OpenAIClient {
        let http = Client::builder().no_proxy().build().unwrap();
        OpenAIClient::with_http_client("gpt-4o-mini".to_string(), "sk-test".to_string(), base, http)
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let client = OpenAIClient::new(
            "gpt-4o-mini".to_string(),
            "sk-test".to_string(),
            "http://localhost:8080/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(client.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_complete_sends_request_and_cleans_answer() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"content":"```\nfeat: add parser\n```"}}]}"#,
        );
        let client = client_for(base);

        let text = client.complete("the diff").await.unwrap();
        assert_eq!(text, "feat: add parser");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1/chat/completions "));
        assert!(request.to_lowercase().contains("authorization: bearer sk-test"));

        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "the diff");
        assert_eq!(json["max_tokens"], 300);
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_message() {
        let (base, server) = serve_once(
            "401 Unauthorized",
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        let err = client_for(base).complete("p").await.unwrap_err();
        server.join().unwrap();

        match err.downcast_ref::<LlmError>() {
            Some(LlmError::Api {
                status, message, ..
            }) => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_error_without_json_body() {
        let (base, server) = serve_once("502 Bad Gateway", "upstream down");
        let err = client_for(base).complete("p").await.unwrap_err();
        server.join().unwrap();

        assert!(matches!(
            err.downcast_ref::<LlmError>(),
            Some(LlmError::Api { message, .. }) if message == "Unknown error"
        ));
    }

    #[tokio::test]
    async fn test_no_choices_is_empty_response() {
        let (base, server) = serve_once("200 OK", r#"{"choices":[]}"#);
        let err = client_for(base).complete("p").await.unwrap_err();
        server.join().unwrap();
        assert!(matches!(err.downcast_ref::<LlmError>(), Some(LlmError::EmptyResponse(_))));
    }

    #[tokio::test]
    async fn test_null_content_is_empty_response() {
        let (base, server) = serve_once("200 OK", r#"{"choices":[{"message":{"content":null}}]}"#);
        let err = client_for(base).complete("p").await.unwrap_err();
        server.join().unwrap();
        assert!(matches!(err.downcast_ref::<LlmError>(), Some(LlmError::EmptyResponse(_))));
    }

    #[tokio::test]
    async fn test_blank_content_is_empty_response() {
        let (base, server) = serve_once("200 OK", r#"{"choices":[{"message":{"content":"  `` \n"}}]}"#);
        let err = client_for(base).complete("p").await.unwrap_err();
        server.join().unwrap();
        assert!(matches!(err.downcast_ref::<LlmError>(), Some(LlmError::EmptyResponse(_))));
    }
}
