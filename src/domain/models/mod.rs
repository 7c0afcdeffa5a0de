pub mod config;
pub mod diagnostic;
pub mod provider;
pub mod resource;
pub mod scan;

pub use config::{
    CacheConfig, Config, LogFormat, LoggingConfig, RetryConfig, RotationPolicy, ScanConfig,
};
pub use diagnostic::{Diagnostic, DiagnosticCode, Diagnostics};
pub use provider::Provider;
pub use resource::{Attributes, Resource, ResourceType};
pub use scan::{
    EnumerateInput, EnumerateOutput, EnumerationOutcome, ListOutput, RefreshInput, RefreshOutput,
    ResourcesByType,
};
