//! Error taxonomy for release train orchestration.

use thiserror::Error;

/// Errors produced by the release engine and its collaborators.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A version string did not match any known suffix pattern.
    #[error("unrecognized version format: {version}")]
    UnrecognizedVersionFormat { version: String },

    /// The release train BOM could not be read or is missing coordinates.
    #[error("failed to resolve release train BOM: {0}")]
    BomResolution(String),

    /// A build descriptor could not be updated.
    #[error("descriptor update failed: {0}")]
    DescriptorUpdate(String),

    /// A version control operation failed.
    #[error("git error: {0}")]
    Vcs(String),

    /// A build tool invocation failed.
    #[error("build failed for `{command}`: {reason}")]
    Build { command: String, reason: String },

    /// A bounded collaborator call exceeded its wait time.
    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    /// A template could not be rendered or written.
    #[error("template error: {0}")]
    Template(String),

    /// The project catalog API rejected or failed a request.
    #[error("project catalog error: {0}")]
    Catalog(String),

    /// A documentation update failed.
    #[error("documentation error: {0}")]
    Documentation(String),

    /// A post-release action failed.
    #[error("post-release action failed: {0}")]
    PostRelease(String),

    /// The version set has no entry for a project that needs one.
    #[error("no version resolved for project {project}")]
    MissingVersion { project: String },

    /// The collaborator does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReleaseError {
    /// Short machine-readable category, used in reports and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            ReleaseError::UnrecognizedVersionFormat { .. } => "classification",
            ReleaseError::BomResolution(_) => "resolution",
            ReleaseError::DescriptorUpdate(_) => "descriptor",
            ReleaseError::Vcs(_) => "vcs",
            ReleaseError::Build { .. } => "build",
            ReleaseError::Timeout { .. } => "timeout",
            ReleaseError::Template(_) => "template",
            ReleaseError::Catalog(_) => "catalog",
            ReleaseError::Documentation(_) => "documentation",
            ReleaseError::PostRelease(_) => "post_release",
            ReleaseError::MissingVersion { .. } => "missing_version",
            ReleaseError::Unsupported(_) => "unsupported",
            ReleaseError::Config(_) => "config",
            ReleaseError::Serialization(_) => "serialization",
            ReleaseError::Io(_) => "io",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ReleaseError::Timeout { .. })
    }
}

/// Result type for release engine operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_version_displays_input() {
        let err = ReleaseError::UnrecognizedVersionFormat {
            version: "1.0.0.FOO".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("unrecognized version format"));
        assert!(msg.contains("1.0.0.FOO"));
    }

    #[test]
    fn test_build_error_displays_command_and_reason() {
        let err = ReleaseError::Build {
            command: "./mvnw deploy".to_string(),
            reason: "exit code 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("./mvnw deploy"));
        assert!(msg.contains("exit code 1"));
        assert_eq!(err.category(), "build");
    }

    #[test]
    fn test_timeout_error() {
        let err = ReleaseError::Timeout {
            operation: "deploy".to_string(),
            secs: 1200,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("1200 seconds"));
        assert!(!ReleaseError::Vcs("rejected".to_string()).is_timeout());
    }

    #[test]
    fn test_missing_version_error() {
        let err = ReleaseError::MissingVersion {
            project: "spring-cloud-sleuth".to_string(),
        };
        assert!(err.to_string().contains("spring-cloud-sleuth"));
        assert_eq!(err.category(), "missing_version");
    }
}
