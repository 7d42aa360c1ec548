use thiserror::Error;

/// Rejected input at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid email")]
    InvalidEmail,
}

/// Failure talking to the forecast or geocoding upstream.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} request failed with status {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed {service} payload: {reason}")]
    Malformed { service: &'static str, reason: String },
}

/// Failure reading or writing the subscriber list.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("subscriber store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("subscriber store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("subscriber store unavailable: {0}")]
    Unavailable(String),
}

/// Failure sending one message.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mailbox '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("mail rejected for {recipient}: {reason}")]
    Rejected { recipient: String, reason: String },
}

/// Umbrella error for operations spanning several collaborators.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Keep upstream error bodies short enough for a log line.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("bad key"), "bad key");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "न".repeat(100);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
    }

    #[test]
    fn validation_error_message_matches_api_contract() {
        assert_eq!(ValidationError::InvalidEmail.to_string(), "Invalid email");
    }
}
