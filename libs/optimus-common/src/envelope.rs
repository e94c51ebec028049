use serde::{Deserialize, Serialize};

/// Response envelope wrapping every backend payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub result: Option<T>,
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn ok(result: T) -> Self {
        Self {
            result: Some(result),
            code: 200,
            message: "success".to_string(),
        }
    }

    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self {
            result: None,
            code,
            message: message.into(),
        }
    }

    /// Envelope codes follow HTTP semantics: 2xx is success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}
