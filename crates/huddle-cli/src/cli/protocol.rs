use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Output envelope printed for every command
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// CLI command parsed from arguments
#[derive(Debug, Clone)]
pub enum CliCommand {
    /// Run several clients against one in-memory store and check they converge
    Simulate {
        clients: Option<usize>,
        tasks: usize,
        /// Make every n-th task write fail to exercise rollback
        fail_every: Option<usize>,
    },
    /// Admit display names in order against one roster
    Presence { names: Vec<String> },
    /// Import a CSV file onto a fresh board and export it again
    CsvRoundTrip { input: PathBuf },
    /// Print the effective configuration
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_omits_result() {
        let json = serde_json::to_string(&Response::error("write_failed", "boom")).unwrap();
        assert_eq!(json, r#"{"error":{"code":"write_failed","message":"boom"}}"#);
    }

    #[test]
    fn test_success_response_omits_error() {
        let response = Response::success(serde_json::json!({"ok": true}));
        assert!(!response.is_error());
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"result":{"ok":true}}"#);
    }
}
