//! Per-provider classification of remote errors
//!
//! Each provider signals rate limiting and missing permissions its own
//! way, so the predicates are decided per provider rather than unified:
//! - [`is_transient`] feeds the [`RetryPolicy`](super::retry::RetryPolicy)
//! - [`is_access_denied`] feeds the enumeration error handler

use crate::domain::errors::RemoteError;
use crate::domain::models::Provider;

const TOO_MANY_REQUESTS: u16 = 429;
const FORBIDDEN: u16 = 403;
const BAD_REQUEST: u16 = 400;

const AWS_THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "ProvisionedThroughputExceededException",
];

const GITHUB_MISSING_SCOPES: &str =
    "Your token has not been granted the required scopes to execute this query.";

/// Whether the error is a rate-limit signal worth retrying
pub fn is_transient(err: &RemoteError) -> bool {
    if err.status_code() == Some(TOO_MANY_REQUESTS) {
        return true;
    }
    match err.provider() {
        Provider::Aws => err
            .code()
            .is_some_and(|code| AWS_THROTTLING_CODES.contains(&code)),
        Provider::Azure => err.message().contains("TooManyRequests"),
        Provider::Google => {
            err.message().contains("rateLimitExceeded")
                || err.message().contains("RESOURCE_EXHAUSTED")
                || err.code() == Some("ResourceExhausted")
        }
        Provider::Github => {
            err.message().contains("API rate limit exceeded")
                || err.message().contains("secondary rate limit")
        }
    }
}

/// Whether the error means the credentials may not list or read the resource
pub fn is_access_denied(err: &RemoteError) -> bool {
    match err.provider() {
        Provider::Aws => {
            let code_denied = err.code().is_some_and(|code| code.contains("AccessDenied"));
            match err.status_code() {
                Some(FORBIDDEN) => true,
                Some(BAD_REQUEST) => code_denied,
                _ => code_denied || err.message().contains("AccessDenied"),
            }
        }
        Provider::Google => {
            err.code() == Some("PermissionDenied")
                || err.status_code() == Some(FORBIDDEN)
                || (err.message().contains("googleapi") && err.message().contains("Error 403"))
        }
        Provider::Azure => {
            err.status_code() == Some(FORBIDDEN)
                || err.code() == Some("AuthorizationFailed")
                || err.message().contains("AuthorizationFailed")
        }
        Provider::Github => err.message().starts_with(GITHUB_MISSING_SCOPES),
    }
}

impl RemoteError {
    /// See [`is_transient`]
    pub fn is_transient(&self) -> bool {
        is_transient(self)
    }

    /// See [`is_access_denied`]
    pub fn is_access_denied(&self) -> bool {
        is_access_denied(self)
    }
}
