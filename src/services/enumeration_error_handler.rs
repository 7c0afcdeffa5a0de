//! Turns enumeration and details-fetching errors into diagnostics.
//!
//! Every failure of a single type degrades to exactly one [`Diagnostic`]:
//! access denials are reported as ignored types, rate limiting that
//! survived the retry policy as [`DiagnosticCode::RateLimited`], anything
//! else as a plain failure of the phase.

use tracing::debug;

use crate::domain::errors::{EnumerationError, RemoteError};
use crate::domain::models::{Diagnostic, DiagnosticCode, Resource, ResourceType};

/// Scan phase an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanningPhase {
    Enumeration,
    DetailsFetching,
}

impl ScanningPhase {
    fn forbidden_action(self) -> &'static str {
        match self {
            Self::Enumeration => "Listing",
            Self::DetailsFetching => "Reading details of",
        }
    }

    fn failure_code(self) -> DiagnosticCode {
        match self {
            Self::Enumeration => DiagnosticCode::EnumerationFailed,
            Self::DetailsFetching => DiagnosticCode::DetailsFetchFailed,
        }
    }
}

/// Diagnostic for an enumerator of `resource_type` that failed
pub fn handle_enumeration_error(resource_type: &ResourceType, err: &EnumerationError) -> Diagnostic {
    let subject = err
        .resource()
        .map_or_else(|| resource_type.to_string(), |res| res.to_string());
    classify(ScanningPhase::Enumeration, resource_type, &subject, err)
        .with_resource_type(resource_type.clone())
}

/// Diagnostic for a details fetch of `resource` that failed
pub fn handle_details_fetching_error(resource: &Resource, err: &EnumerationError) -> Diagnostic {
    let resource_type = resource.resource_type();
    classify(
        ScanningPhase::DetailsFetching,
        resource_type,
        &resource.to_string(),
        err,
    )
    .with_resource_type(resource_type.clone())
    .with_resource(err.resource().unwrap_or_else(|| resource.clone()))
}

fn classify(
    phase: ScanningPhase,
    resource_type: &ResourceType,
    subject: &str,
    err: &EnumerationError,
) -> Diagnostic {
    let root_message = err.root_message();
    let listed_type = err.listed_type().unwrap_or(resource_type);

    // Some providers throttle with a 403, so rate limiting wins.
    if err.root_cause().is_some_and(RemoteError::is_transient) {
        return Diagnostic::new(
            DiagnosticCode::RateLimited,
            format!("Rate limited while processing {subject}: {root_message}"),
        );
    }

    if is_access_denied(err) {
        debug!(
            resource = subject,
            listed_type = %listed_type,
            error = %err,
            "got an access denied error"
        );
        let message = format!(
            "Ignoring {subject} from drift calculation: {} {listed_type} is forbidden: {root_message}",
            phase.forbidden_action()
        );
        let diagnostic = Diagnostic::new(DiagnosticCode::AccessDenied, message);
        return match Resource::from_reference(subject) {
            Some(resource) => diagnostic.with_resource(resource),
            None => diagnostic,
        };
    }

    Diagnostic::new(
        phase.failure_code(),
        format!("Error while processing {subject}: {err}"),
    )
}

fn is_access_denied(err: &EnumerationError) -> bool {
    match err.root_cause() {
        Some(remote) => remote.is_access_denied(),
        None => err.root_message().contains("AccessDenied"),
    }
}
