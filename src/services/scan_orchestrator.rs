//! Scan orchestrator: enumerate, refresh and list resources.
//!
//! Runs the registered enumerators of the requested types concurrently and
//! merges their results into one [`EnumerateOutput`]. Only selection errors
//! are fatal; every failure of a single type, including a panic or an
//! abandoned worker, becomes a diagnostic for that type.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::domain::errors::{ScanError, ScanResult};
use crate::domain::models::{
    Diagnostic, DiagnosticCode, Diagnostics, EnumerateInput, EnumerateOutput, EnumerationOutcome,
    ListOutput, RefreshInput, RefreshOutput, Resource, ResourceType, ScanConfig,
};
use crate::services::enumeration_error_handler::{
    handle_details_fetching_error, handle_enumeration_error,
};
use crate::services::enumerator_registry::EnumeratorRegistry;
use crate::services::parallel_runner::{JobEnd, JobReport, ParallelRunner};

/// Runs scans over the enumerators of a registry
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    registry: Arc<EnumeratorRegistry>,
    config: ScanConfig,
    cancellation: CancellationToken,
}

impl ScanOrchestrator {
    pub fn new(registry: Arc<EnumeratorRegistry>, config: ScanConfig) -> Self {
        Self {
            registry,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Abandon in-flight work once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn registry(&self) -> &EnumeratorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Enumerate every requested type
    ///
    /// Every requested type gets a `resources` and a `timings` entry. A
    /// failed type has no resources and exactly one diagnostic.
    ///
    /// # Errors
    /// [`ScanError::UnknownResourceType`] when a requested type has no
    /// enumerator, before any enumerator runs
    pub async fn enumerate(&self, input: EnumerateInput) -> ScanResult<EnumerateOutput> {
        self.enumerate_with(input, &self.runner()).await
    }

    async fn enumerate_with(
        &self,
        input: EnumerateInput,
        runner: &ParallelRunner,
    ) -> ScanResult<EnumerateOutput> {
        let enumerators = self.registry.resolve(&input.resource_types)?;

        for ignored in self
            .registry
            .supported_types()
            .filter(|resource_type| !input.resource_types.contains(*resource_type))
        {
            debug!(resource_type = %ignored, "Ignored enumeration of resources since it is not requested");
        }

        let scan_id = Uuid::new_v4();
        let mut output = EnumerateOutput::new(scan_id, Utc::now());
        let span = info_span!("scan", %scan_id, types = enumerators.len());

        async {
            info!("starting enumeration");
            let jobs = enumerators.into_iter().map(|enumerator| {
                let resource_type = enumerator.supported_type();
                let job_type = resource_type.clone();
                let job = async move {
                    match enumerator.enumerate().await {
                        Ok(resources) => {
                            for resource in &resources {
                                debug!(id = resource.id(), resource_type = %resource.resource_type(), "Found cloud resource");
                            }
                            EnumerationOutcome::Success(resources)
                        }
                        Err(err) => {
                            EnumerationOutcome::Failure(handle_enumeration_error(&job_type, &err))
                        }
                    }
                };
                (resource_type, job)
            });

            for report in runner.run(jobs).await {
                merge_enumeration(&mut output, report);
            }

            info!(
                resources = output.resource_count(),
                diagnostics = output.diagnostics.len(),
                "enumeration finished"
            );
        }
        .instrument(span)
        .await;

        Ok(output)
    }

    /// Read the details of every resource
    ///
    /// Types without a details fetcher pass through unchanged. A resource
    /// whose fetch fails is dropped with a diagnostic; the other resources
    /// keep their input order within their type.
    pub async fn refresh(&self, input: RefreshInput) -> ScanResult<RefreshOutput> {
        self.refresh_with(input, &self.runner()).await
    }

    async fn refresh_with(
        &self,
        input: RefreshInput,
        runner: &ParallelRunner,
    ) -> ScanResult<RefreshOutput> {
        let mut slots: BTreeMap<ResourceType, Vec<Option<Resource>>> = BTreeMap::new();
        let mut jobs = Vec::new();

        for (resource_type, resources) in input.resources {
            let fetcher = self.registry.details_fetcher(resource_type.as_str()).cloned();
            let type_slots = slots.entry(resource_type.clone()).or_default();
            for resource in resources {
                let index = type_slots.len();
                match &fetcher {
                    None => type_slots.push(Some(resource)),
                    Some(fetcher) => {
                        type_slots.push(None);
                        let fetcher = Arc::clone(fetcher);
                        let key = (resource_type.clone(), index, resource.clone());
                        jobs.push((key, async move { fetcher.read_details(&resource).await }));
                    }
                }
            }
        }

        let mut diagnostics = Diagnostics::new();
        let span = info_span!("refresh", resources = jobs.len());
        let reports = runner.run(jobs).instrument(span).await;

        for JobReport { key, end, .. } in reports {
            let (resource_type, index, resource) = key;
            let refreshed = match end {
                JobEnd::Completed(Ok(refreshed)) => refreshed,
                JobEnd::Completed(Err(err)) => {
                    diagnostics.push(handle_details_fetching_error(&resource, &err));
                    continue;
                }
                JobEnd::Panicked(message) => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::Panicked,
                            format!("Reading details of {resource} panicked: {message}"),
                        )
                        .with_resource_type(resource_type)
                        .with_resource(resource),
                    );
                    continue;
                }
                JobEnd::Abandoned(reason) => {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::Cancelled,
                            format!("Reading details of {resource} did not complete: {reason}"),
                        )
                        .with_resource_type(resource_type)
                        .with_resource(resource),
                    );
                    continue;
                }
            };

            if let Some(slot) = slots
                .get_mut(&resource_type)
                .and_then(|type_slots| type_slots.get_mut(index))
            {
                *slot = Some(refreshed);
            }
        }

        let resources = slots
            .into_iter()
            .map(|(resource_type, type_slots)| {
                (resource_type, type_slots.into_iter().flatten().collect())
            })
            .collect();

        Ok(RefreshOutput {
            resources,
            diagnostics,
        })
    }

    /// Enumerate then refresh a single type
    ///
    /// Both phases share one timeout, measured from the call.
    ///
    /// # Errors
    /// [`ScanError::UnknownResourceType`] when the type has no enumerator
    pub async fn list(&self, resource_type: impl Into<ResourceType>) -> ScanResult<ListOutput> {
        let resource_type = resource_type.into();
        if self.registry.enumerator(resource_type.as_str()).is_none() {
            return Err(ScanError::UnknownResourceType(resource_type));
        }

        let runner = self.runner().measured_from(Instant::now());
        let enumerated = self
            .enumerate_with(EnumerateInput::new([resource_type.clone()]), &runner)
            .await?;
        let mut diagnostics = enumerated.diagnostics.clone();

        let mut refreshed = self
            .refresh_with(RefreshInput::from(enumerated), &runner)
            .await?;
        diagnostics.extend(refreshed.diagnostics);

        Ok(ListOutput {
            resources: refreshed.resources.remove(&resource_type).unwrap_or_default(),
            diagnostics,
        })
    }

    fn runner(&self) -> ParallelRunner {
        ParallelRunner::new(self.config.max_concurrency, self.cancellation.clone())
            .with_timeout(self.config.timeout())
    }
}

fn merge_enumeration(output: &mut EnumerateOutput, report: JobReport<ResourceType, EnumerationOutcome>) {
    let JobReport {
        key: resource_type,
        end,
        elapsed,
    } = report;

    let outcome = match end {
        JobEnd::Completed(outcome) => outcome,
        JobEnd::Panicked(message) => EnumerationOutcome::Failure(Diagnostic::new(
            DiagnosticCode::Panicked,
            format!("Enumeration of {resource_type} panicked: {message}"),
        )),
        JobEnd::Abandoned(reason) => EnumerationOutcome::Failure(Diagnostic::new(
            DiagnosticCode::Cancelled,
            format!("Enumeration of {resource_type} did not complete: {reason}"),
        )),
    };

    record_timing(output, &resource_type, elapsed);
    match outcome {
        EnumerationOutcome::Success(resources) => {
            output.resources.insert(resource_type, resources);
        }
        EnumerationOutcome::Failure(diagnostic) => {
            debug!(resource_type = %resource_type, code = diagnostic.code(), "enumeration failed");
            output
                .diagnostics
                .push(diagnostic.with_resource_type(resource_type.clone()));
            output.resources.insert(resource_type, Vec::new());
        }
    }
}

fn record_timing(output: &mut EnumerateOutput, resource_type: &ResourceType, elapsed: Duration) {
    debug!(resource_type = %resource_type, ?elapsed, "enumeration timing");
    output.timings.insert(resource_type.clone(), elapsed);
}
