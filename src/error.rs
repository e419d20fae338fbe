//! Error taxonomy shared by the HTTP routes, the service clients, and the
//! batch pipeline.
//!
//! Every failure crossing a service boundary is classified into one of these
//! variants so the HTTP layer can map it to a status code and the pipeline can
//! retain a human-readable message per item.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required credential or endpoint is absent from the environment/config.
    #[error("missing configuration: {name}")]
    ConfigurationMissing { name: &'static str },

    /// An upstream service (OpenRouter, Supabase) answered with a non-success
    /// status. Carries the upstream status and response body verbatim.
    #[error("{service} request failed ({status}): {detail}")]
    UpstreamRequestFailed {
        service: &'static str,
        status: u16,
        detail: String,
    },

    /// The upstream answered 2xx but the payload was missing an expected field
    /// or was not parseable.
    #[error("{service} returned a malformed response: {detail}")]
    MalformedUpstreamResponse {
        service: &'static str,
        detail: String,
    },

    /// A required request field was absent or invalid.
    #[error("{0}")]
    InputValidation(String),

    /// The image normalizer could not decode the input or encode the output.
    #[error("image encoding failed: {0}")]
    LocalEncoding(String),
}

impl Error {
    /// Shorthand for an upstream failure built from a reqwest response.
    pub async fn from_upstream(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Self::UpstreamRequestFailed {
            service,
            status,
            detail,
        }
    }

    pub fn malformed(service: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedUpstreamResponse {
            service,
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamRequestFailed {
            service: "http",
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_upstream_detail() {
        let err = Error::UpstreamRequestFailed {
            service: "openrouter",
            status: 429,
            detail: "rate limited".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("openrouter"));
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = Error::InputValidation("description and embedding are required".into());
        assert_eq!(err.to_string(), "description and embedding are required");
    }
}
