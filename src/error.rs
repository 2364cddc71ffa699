use std::{fmt, time::Duration};

use crate::api::Problem;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a protocol operation.
///
/// Every variant maps to an [`ErrorKind`] and, where one exists, carries the URL the failing
/// request was directed at so a diagnostic view can point at the offending endpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("directory at {url} is unreachable: {reason}")]
    DirectoryUnreachable { url: String, reason: String },

    #[error("directory has no entry for {0}")]
    MissingDirectoryEntry(&'static str),

    #[error("newAccount response from {url} has no Location header")]
    MissingAccountLocation { url: String },

    #[error("response from {url} carried no Replay-Nonce header")]
    MissingNonce { url: String },

    #[error("unsupported key: {0}")]
    UnsupportedKey(String),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signing failed: {0}")]
    SigningFailure(String),

    #[error("challenge at {url} returned a response without a recognized status")]
    MalformedChallengeResponse { url: String },

    #[error("challenge at {url} is invalid{}", problem_suffix(.problem))]
    ChallengeInvalid {
        url: String,
        problem: Option<Problem>,
    },

    #[error("challenge at {url} did not settle within {timeout:?}")]
    PollTimeout { url: String, timeout: Duration },

    #[error("polling of challenge at {url} was cancelled")]
    PollCancelled { url: String },

    #[error("certificate is not valid hex-encoded DER: {0}")]
    InvalidCertificate(#[from] hex::FromHexError),

    #[error("{url} answered {status}: {problem}")]
    Server {
        url: String,
        status: u16,
        problem: Problem,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Stable, renderable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DirectoryUnreachable,
    MissingDirectoryEntry,
    MissingAccountLocation,
    MissingNonce,
    UnsupportedKey,
    UnsupportedAlgorithm,
    SigningFailure,
    MalformedChallengeResponse,
    ChallengeInvalid,
    PollTimeout,
    PollCancelled,
    InvalidCertificate,
    ServerProblem,
    TransportError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DirectoryUnreachable => "directory-unreachable",
            ErrorKind::MissingDirectoryEntry => "missing-directory-entry",
            ErrorKind::MissingAccountLocation => "missing-account-location",
            ErrorKind::MissingNonce => "missing-nonce",
            ErrorKind::UnsupportedKey => "unsupported-key",
            ErrorKind::UnsupportedAlgorithm => "unsupported-algorithm",
            ErrorKind::SigningFailure => "signing-failure",
            ErrorKind::MalformedChallengeResponse => "malformed-challenge-response",
            ErrorKind::ChallengeInvalid => "challenge-invalid",
            ErrorKind::PollTimeout => "poll-timeout",
            ErrorKind::PollCancelled => "poll-cancelled",
            ErrorKind::InvalidCertificate => "invalid-certificate",
            ErrorKind::ServerProblem => "server-problem",
            ErrorKind::TransportError => "transport-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn problem_suffix(problem: &Option<Problem>) -> String {
    problem
        .as_ref()
        .map(|problem| format!(": {problem}"))
        .unwrap_or_default()
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DirectoryUnreachable { .. } => ErrorKind::DirectoryUnreachable,
            Error::MissingDirectoryEntry(_) => ErrorKind::MissingDirectoryEntry,
            Error::MissingAccountLocation { .. } => ErrorKind::MissingAccountLocation,
            Error::MissingNonce { .. } => ErrorKind::MissingNonce,
            Error::UnsupportedKey(_) => ErrorKind::UnsupportedKey,
            Error::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Error::SigningFailure(_) => ErrorKind::SigningFailure,
            Error::MalformedChallengeResponse { .. } => ErrorKind::MalformedChallengeResponse,
            Error::ChallengeInvalid { .. } => ErrorKind::ChallengeInvalid,
            Error::PollTimeout { .. } => ErrorKind::PollTimeout,
            Error::PollCancelled { .. } => ErrorKind::PollCancelled,
            Error::InvalidCertificate(_) => ErrorKind::InvalidCertificate,
            Error::Server { .. } => ErrorKind::ServerProblem,
            Error::Transport { .. } | Error::Json { .. } | Error::HttpClient(_) => {
                ErrorKind::TransportError
            }
        }
    }

    /// URL of the request that failed, if the failure is tied to one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::DirectoryUnreachable { url, .. }
            | Error::MissingAccountLocation { url }
            | Error::MissingNonce { url }
            | Error::MalformedChallengeResponse { url }
            | Error::ChallengeInvalid { url, .. }
            | Error::PollTimeout { url, .. }
            | Error::PollCancelled { url }
            | Error::Server { url, .. }
            | Error::Transport { url, .. }
            | Error::Json { url, .. } => Some(url),

            Error::MissingDirectoryEntry(_)
            | Error::UnsupportedKey(_)
            | Error::UnsupportedAlgorithm(_)
            | Error::SigningFailure(_)
            | Error::InvalidCertificate(_)
            | Error::HttpClient(_) => None,
        }
    }

    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        Error::Transport {
            url: url.to_owned(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let err = Error::ChallengeInvalid {
            url: "https://ca/chall/1".to_owned(),
            problem: None,
        };
        assert_eq!(err.kind().to_string(), "challenge-invalid");
        assert_eq!(err.url(), Some("https://ca/chall/1"));

        let err = Error::UnsupportedKey("kty oct".to_owned());
        assert_eq!(err.kind().as_str(), "unsupported-key");
        assert_eq!(err.url(), None);
    }

    #[test]
    fn test_challenge_invalid_display() {
        let err = Error::ChallengeInvalid {
            url: "https://ca/chall/1".to_owned(),
            problem: Some(Problem {
                _type: "urn:ietf:params:acme:error:unauthorized".to_owned(),
                detail: Some("bad token".to_owned()),
                ..Default::default()
            }),
        };
        assert_eq!(
            err.to_string(),
            "challenge at https://ca/chall/1 is invalid: urn:ietf:params:acme:error:unauthorized: bad token"
        );
    }
}
