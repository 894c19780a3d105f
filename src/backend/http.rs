use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::GenerationBackend;
use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

/// Wire format of the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAi,
}

impl ApiFormat {
    pub fn detect(api_url: &str) -> Self {
        if api_url.contains("anthropic.com") {
            Self::Anthropic
        } else {
            Self::OpenAi
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
    api_format: ApiFormat,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> ServiceResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "generation backend api key is empty (set VOCAB_LLM_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                ServiceError::UpstreamUnavailable(format!("failed to build http client: {err}"))
            })?;
        let api_format = ApiFormat::detect(&config.api_url);

        Ok(Self {
            client,
            config,
            api_format,
        })
    }

    fn complete_anthropic(&self, prompt: &str) -> ServiceResult<String> {
        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(transport_error)?;

        let response = ensure_success(response)?;
        let completion: AnthropicResponse = response.json().map_err(transport_error)?;

        anthropic_text(completion).ok_or_else(|| empty_response(&self.config.api_url))
    }

    fn complete_openai(&self, prompt: &str) -> ServiceResult<String> {
        let request = OpenAiRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(transport_error)?;

        let response = ensure_success(response)?;
        let completion: OpenAiResponse = response.json().map_err(transport_error)?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| empty_response(&self.config.api_url))
    }
}

impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        match self.api_format {
            ApiFormat::Anthropic => "anthropic",
            ApiFormat::OpenAi => "openai-compatible",
        }
    }

    fn generate(&self, prompt: &str) -> ServiceResult<String> {
        debug!(
            backend = self.name(),
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "sending generation request"
        );

        let text = match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(prompt)?,
            ApiFormat::OpenAi => self.complete_openai(prompt)?,
        };

        trace!(response = %text, "generation response received");
        Ok(text)
    }
}

fn ensure_success(
    response: reqwest::blocking::Response,
) -> ServiceResult<reqwest::blocking::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(ServiceError::UpstreamUnavailable(format!(
        "generation backend returned {status}: {body}"
    )))
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::UpstreamUnavailable(format!("generation backend timed out: {err}"));
    }
    ServiceError::UpstreamUnavailable(format!("generation backend request failed: {err}"))
}

/// The first non-empty text block; thinking and tool blocks are skipped.
fn anthropic_text(completion: AnthropicResponse) -> Option<String> {
    completion
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .filter(|text| !text.is_empty())
}

fn empty_response(api_url: &str) -> ServiceError {
    ServiceError::UpstreamUnavailable(format!("generation backend {api_url} returned no text"))
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;

    fn config(api_url: &str, api_key: &str) -> HttpBackendConfig {
        HttpBackendConfig {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: "test-model".to_string(),
            max_tokens: 512,
            temperature: 1.0,
            timeout: Duration::from_millis(50),
        }
    }

    /// Serves one canned response on a local port and returns the request body.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut content_length = 0_usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request_body = vec![0_u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            String::from_utf8(request_body).unwrap()
        });

        (url, handle)
    }

    fn local_backend(url: &str) -> HttpBackend {
        let mut config = config(url, "test-key");
        config.timeout = Duration::from_secs(5);
        HttpBackend::new(config).unwrap()
    }

    #[test]
    fn detects_api_format_from_url() {
        assert_eq!(ApiFormat::detect(DEFAULT_API_URL), ApiFormat::Anthropic);
        assert_eq!(
            ApiFormat::detect("https://api.deepseek.com/chat/completions"),
            ApiFormat::OpenAi
        );
    }

    #[test]
    fn empty_api_key_is_a_validation_error() {
        let err = HttpBackend::new(config(DEFAULT_API_URL, "  ")).err().unwrap();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn unreachable_endpoint_is_upstream_unavailable() {
        let backend = HttpBackend::new(config("http://127.0.0.1:9/v1/chat", "key")).unwrap();
        let err = backend.generate("hello").unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[test]
    fn chat_completion_text_is_returned() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let (url, server) = serve_once("200 OK", body);
        let backend = local_backend(&url);

        assert_eq!(backend.generate("write a passage").unwrap(), "hello");

        let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(request["model"], "test-model");
        assert_eq!(request["messages"][0]["content"], "write a passage");
    }

    #[test]
    fn server_error_status_is_upstream_unavailable() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"overloaded"}"#);
        let err = local_backend(&url).generate("hello").unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), "upstream_unavailable");
        assert!(err.message().contains("500"));
    }

    #[test]
    fn empty_completion_text_is_upstream_unavailable() {
        let (url, server) = serve_once("200 OK", r#"{"choices":[{"message":{"content":""}}]}"#);
        let err = local_backend(&url).generate("hello").unwrap_err();
        server.join().unwrap();

        assert_eq!(err.kind(), "upstream_unavailable");
        assert!(err.message().contains("returned no text"));
    }

    #[test]
    fn anthropic_response_takes_first_text_block() {
        let raw = r#"{"content":[{"type":"thinking"},{"type":"text","text":"{\"a\":1}"}]}"#;
        let parsed: AnthropicResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(anthropic_text(parsed).as_deref(), Some("{\"a\":1}"));

        let empty: AnthropicResponse =
            serde_json::from_str(r#"{"content":[{"type":"text","text":""}]}"#).unwrap();
        assert_eq!(anthropic_text(empty), None);
    }
}
