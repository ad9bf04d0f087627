use std::fmt;

use async_trait::async_trait;
use reqwest::{Error, Response, StatusCode};
use serde_json::Value;

use super::envelope::ApiEnvelope;

const UNAUTHORIZED_NAME_PREFIXES: [&str; 2] = ["unauthorized", "tokenexpired"];

/// Structured reason the backend gave for refusing a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejection {
    pub name: Option<String>,
    pub message: Option<String>,
    pub details: Vec<String>,
}

impl Rejection {
    pub fn from_envelope(envelope: &ApiEnvelope<Value>) -> Self {
        Self {
            name: envelope.name.clone().filter(|name| !name.trim().is_empty()),
            message: envelope
                .message
                .clone()
                .filter(|message| !message.trim().is_empty()),
            details: envelope.detail_messages(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.name.as_deref().is_some_and(|name| {
            let lowered = name.to_ascii_lowercase();
            UNAUTHORIZED_NAME_PREFIXES
                .iter()
                .any(|prefix| lowered.starts_with(prefix))
        })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("unnamed");
        match (&self.message, self.details.is_empty()) {
            (_, false) => write!(f, "{name}: {}", self.details.join("; ")),
            (Some(message), true) => write!(f, "{name}: {message}"),
            (None, true) => f.write_str(name),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("request rejected with status {status}: {rejection}")]
    Rejected { status: u16, rejection: Rejection },
    #[error("session is no longer authorized")]
    Unauthorized,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unable to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Transport-level failures worth replaying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Decode(_))
    }
}

#[async_trait]
pub trait ResponseExt {
    /// Read the body and split it into a successful envelope or a classified error.
    async fn into_envelope(self) -> Result<ApiEnvelope<Value>, ClientError>;
}

#[async_trait]
impl ResponseExt for Response {
    async fn into_envelope(self) -> Result<ApiEnvelope<Value>, ClientError> {
        let status = self.status();
        let body = self
            .bytes()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        classify(status, &body)
    }
}

#[async_trait]
impl ResponseExt for Result<Response, Error> {
    async fn into_envelope(self) -> Result<ApiEnvelope<Value>, ClientError> {
        match self {
            Ok(response) => response.into_envelope().await,
            Err(err) => Err(ClientError::Transport(err.to_string())),
        }
    }
}

pub(crate) fn classify(status: StatusCode, body: &[u8]) -> Result<ApiEnvelope<Value>, ClientError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    let parsed = serde_json::from_slice::<ApiEnvelope<Value>>(body);
    match parsed {
        Ok(envelope) if status.is_success() && envelope.success => Ok(envelope),
        Ok(envelope) => Err(rejected(status, &envelope)),
        Err(err) if status.is_success() => Err(ClientError::Decode(err.to_string())),
        Err(_) if status.is_server_error() => Err(ClientError::Transport(format!(
            "backend responded with status {}",
            status.as_u16()
        ))),
        Err(_) => Err(ClientError::Rejected {
            status: status.as_u16(),
            rejection: Rejection::default(),
        }),
    }
}

fn rejected(status: StatusCode, envelope: &ApiEnvelope<Value>) -> ClientError {
    let rejection = Rejection::from_envelope(envelope);
    if rejection.is_unauthorized() {
        return ClientError::Unauthorized;
    }
    ClientError::Rejected {
        status: status.as_u16(),
        rejection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_passes_through() {
        let envelope = classify(StatusCode::OK, br#"{"success":true,"data":{"id":"m1"}}"#)
            .expect("accepted");
        assert_eq!(envelope.data.expect("data")["id"], "m1");
    }

    #[test]
    fn success_false_on_2xx_is_a_rejection() {
        let err = classify(
            StatusCode::OK,
            br#"{"success":false,"name":"validationError","data":[{"message":"Tax Identification Number is required"}]}"#,
        )
        .expect_err("rejected");
        match err {
            ClientError::Rejected { status, rejection } => {
                assert_eq!(status, 200);
                assert_eq!(rejection.name.as_deref(), Some("validationError"));
                assert_eq!(rejection.details, vec!["Tax Identification Number is required"]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn unauthorized_status_and_names_map_to_session_errors() {
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, b"nope"),
            Err(ClientError::Unauthorized)
        ));
        assert!(matches!(
            classify(
                StatusCode::FORBIDDEN,
                br#"{"success":false,"name":"tokenExpiredError","message":"jwt expired"}"#
            ),
            Err(ClientError::Unauthorized)
        ));
    }

    #[test]
    fn unparseable_bodies_split_by_status_class() {
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, b"<html>"),
            Err(ClientError::Transport(_))
        ));
        assert!(matches!(
            classify(StatusCode::OK, b"<html>"),
            Err(ClientError::Decode(_))
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, b""),
            Err(ClientError::Rejected { status: 400, .. })
        ));
    }
}
