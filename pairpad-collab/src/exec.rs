//! Stateless passthrough to an external code-execution service.
//!
//! The server forwards `{language, source}` and relays the service's output
//! to the requesting session only. The call touches no room state; when the
//! service is unreachable the failure is the requester's alone, never
//! broadcast and never fatal to the room.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request body sent to the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub language: String,
    pub source: String,
}

/// Response body returned by the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecResponse {
    pub output: String,
}

/// Errors from the execution passthrough.
#[derive(Debug)]
pub enum ExecError {
    /// The service could not be reached or the exchange failed in transit.
    RequestFailed(String),
    /// The service answered with a non-success status.
    ServiceStatus(u16),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "Execution request failed: {e}"),
            Self::ServiceStatus(code) => write!(f, "Execution service returned status {code}"),
        }
    }
}

impl std::error::Error for ExecError {}

/// Client for the execution service.
#[derive(Debug)]
pub struct ExecClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ExecClient {
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build http client");
        Self { client, endpoint }
    }

    /// Run a buffer through the service and return its output.
    pub async fn run(&self, language: &str, source: &str) -> Result<String, ExecError> {
        log::debug!("forwarding {language} buffer ({} bytes) for execution", source.len());
        let request = ExecRequest {
            language: language.to_string(),
            source: source.to_string(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExecError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExecError::ServiceStatus(response.status().as_u16()));
        }
        let body: ExecResponse = response
            .json()
            .await
            .map_err(|e| ExecError::RequestFailed(e.to_string()))?;
        Ok(body.output)
    }

    /// Get the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = ExecRequest {
            language: "python".into(),
            source: "print(1)".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"language": "python", "source": "print(1)"})
        );
    }

    #[test]
    fn test_response_wire_shape() {
        let body: ExecResponse = serde_json::from_str(r#"{"output": "1\n"}"#).unwrap();
        assert_eq!(body.output, "1\n");
    }

    #[test]
    fn test_client_creation() {
        let client = ExecClient::new("http://localhost:2000/execute".to_string());
        assert_eq!(client.endpoint(), "http://localhost:2000/execute");
    }

    #[test]
    fn test_error_display() {
        let err = ExecError::ServiceStatus(503);
        assert_eq!(err.to_string(), "Execution service returned status 503");
        let err = ExecError::RequestFailed("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
