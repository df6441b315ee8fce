//! Unified error taxonomy with stable error codes for the agent coordination hub.
//!
//! Every hub error carries an [`ErrorCode`] (a machine-readable, stable string
//! tag), a human-readable message, an optional cause chain, and arbitrary
//! key-value context. Use the builder returned by [`HubError::new`] to
//! construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Message/blob length-limit violations.
    Validation,
    /// Response-mode and polling-discipline guards.
    Guard,
    /// Task state-machine and done-gate failures.
    TaskState,
    /// Dependency graph validation.
    Dependency,
    /// Claim/lease lifecycle failures.
    Claim,
    /// Artifact access control.
    Artifact,
    /// No such row.
    NotFound,
    /// Catch-all for unexpected internal/store-layer errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Guard => "guard",
            Self::TaskState => "task_state",
            Self::Dependency => "dependency",
            Self::Claim => "claim",
            Self::Artifact => "artifact",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Validation --
    /// Message content exceeds the configured character cap.
    ContentTooLong,
    /// Message metadata exceeds the configured character cap.
    MetadataTooLong,
    /// Blob payload exceeds the configured character cap.
    BlobTooLong,

    // -- Guard --
    /// Full response mode was requested from a polling call.
    FullModeForbiddenInPolling,

    // -- Task state --
    /// Confidence/verification/evidence preconditions for `done` were not met.
    DoneGateFailed,
    /// Strict consistency mode requires an independent verifier.
    VerifierRequired,
    /// The requested status is not reachable from the task's current status.
    InvalidTransition,

    // -- Dependency --
    /// `depends_on` introduces a cycle.
    DependencyCycle,
    /// `depends_on` references a task id that does not exist.
    DependencyMissing,

    // -- Claim --
    /// Agent runtime profile is incompatible with the task's execution mode.
    ProfileMismatch,
    /// Another live claim already holds the task.
    ClaimConflict,
    /// The caller's claim lease has expired.
    ClaimExpired,
    /// The caller does not hold a claim on the task.
    ClaimNotHeld,

    // -- Artifact --
    /// Caller lacks access to the referenced artifact.
    ArtifactAccessDenied,

    // -- Not found --
    /// No such task, message, or agent.
    NotFound,

    // -- Internal --
    /// Catch-all for store-layer failures, fatal to the request.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ContentTooLong | Self::MetadataTooLong | Self::BlobTooLong => {
                ErrorCategory::Validation
            }

            Self::FullModeForbiddenInPolling => ErrorCategory::Guard,

            Self::DoneGateFailed | Self::VerifierRequired | Self::InvalidTransition => {
                ErrorCategory::TaskState
            }

            Self::DependencyCycle | Self::DependencyMissing => ErrorCategory::Dependency,

            Self::ProfileMismatch
            | Self::ClaimConflict
            | Self::ClaimExpired
            | Self::ClaimNotHeld => ErrorCategory::Claim,

            Self::ArtifactAccessDenied => ErrorCategory::Artifact,

            Self::NotFound => ErrorCategory::NotFound,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"CONTENT_TOO_LONG"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentTooLong => "CONTENT_TOO_LONG",
            Self::MetadataTooLong => "METADATA_TOO_LONG",
            Self::BlobTooLong => "BLOB_TOO_LONG",
            Self::FullModeForbiddenInPolling => "FULL_MODE_FORBIDDEN_IN_POLLING",
            Self::DoneGateFailed => "DONE_GATE_FAILED",
            Self::VerifierRequired => "VERIFIER_REQUIRED",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::DependencyCycle => "DEPENDENCY_CYCLE",
            Self::DependencyMissing => "DEPENDENCY_MISSING",
            Self::ProfileMismatch => "PROFILE_MISMATCH",
            Self::ClaimConflict => "CLAIM_CONFLICT",
            Self::ClaimExpired => "CLAIM_EXPIRED",
            Self::ClaimNotHeld => "CLAIM_NOT_HELD",
            Self::ArtifactAccessDenied => "ARTIFACT_ACCESS_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HubError
// ---------------------------------------------------------------------------

/// Unified hub error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use hub_error::{HubError, ErrorCode};
///
/// let err = HubError::new(ErrorCode::ClaimExpired, "lease expired 4s ago")
///     .with_context("task_id", 42)
///     .with_context("agent_id", "agent-7");
/// ```
pub struct HubError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl HubError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for [`ErrorCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("HubError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`HubError`] (without the opaque source).
///
/// This is the shape every tool's `{success: false, ...}` response embeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&HubError> for HubErrorDto {
    fn from(err: &HubError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<HubErrorDto> for HubError {
    fn from(dto: HubErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

/// Convenient alias for fallible hub operations.
pub type HubResult<T> = Result<T, HubError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// All error codes for exhaustive iteration in tests.
    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::ContentTooLong,
        ErrorCode::MetadataTooLong,
        ErrorCode::BlobTooLong,
        ErrorCode::FullModeForbiddenInPolling,
        ErrorCode::DoneGateFailed,
        ErrorCode::VerifierRequired,
        ErrorCode::InvalidTransition,
        ErrorCode::DependencyCycle,
        ErrorCode::DependencyMissing,
        ErrorCode::ProfileMismatch,
        ErrorCode::ClaimConflict,
        ErrorCode::ClaimExpired,
        ErrorCode::ClaimNotHeld,
        ErrorCode::ArtifactAccessDenied,
        ErrorCode::NotFound,
        ErrorCode::Internal,
    ];

    // -- Construction & Display -----------------------------------------

    #[test]
    fn basic_construction() {
        let err = HubError::new(ErrorCode::Internal, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = HubError::new(ErrorCode::NotFound, "no such task");
        assert_eq!(err.to_string(), "[NOT_FOUND] no such task");
    }

    #[test]
    fn display_with_context() {
        let err =
            HubError::new(ErrorCode::ClaimExpired, "lease gone").with_context("task_id", 42);
        let s = err.to_string();
        assert!(s.starts_with("[CLAIM_EXPIRED] lease gone"));
        assert!(s.contains("task_id"));
        assert!(s.contains("42"));
    }

    #[test]
    fn debug_impl() {
        let err = HubError::new(ErrorCode::ProfileMismatch, "nope");
        let dbg = format!("{err:?}");
        assert!(dbg.contains("ProfileMismatch"));
        assert!(dbg.contains("nope"));
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let err = HubError::new(ErrorCode::Internal, "init failed").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("source"));
        assert!(dbg.contains("file missing"));
    }

    // -- Error code categorization --------------------------------------

    #[test]
    fn validation_codes_categorised() {
        assert_eq!(ErrorCode::ContentTooLong.category(), ErrorCategory::Validation);
        assert_eq!(ErrorCode::MetadataTooLong.category(), ErrorCategory::Validation);
        assert_eq!(ErrorCode::BlobTooLong.category(), ErrorCategory::Validation);
    }

    #[test]
    fn guard_code_categorised() {
        assert_eq!(
            ErrorCode::FullModeForbiddenInPolling.category(),
            ErrorCategory::Guard
        );
    }

    #[test]
    fn task_state_codes_categorised() {
        assert_eq!(ErrorCode::DoneGateFailed.category(), ErrorCategory::TaskState);
        assert_eq!(ErrorCode::VerifierRequired.category(), ErrorCategory::TaskState);
        assert_eq!(ErrorCode::InvalidTransition.category(), ErrorCategory::TaskState);
    }

    #[test]
    fn dependency_codes_categorised() {
        assert_eq!(ErrorCode::DependencyCycle.category(), ErrorCategory::Dependency);
        assert_eq!(ErrorCode::DependencyMissing.category(), ErrorCategory::Dependency);
    }

    #[test]
    fn claim_codes_categorised() {
        assert_eq!(ErrorCode::ProfileMismatch.category(), ErrorCategory::Claim);
        assert_eq!(ErrorCode::ClaimConflict.category(), ErrorCategory::Claim);
        assert_eq!(ErrorCode::ClaimExpired.category(), ErrorCategory::Claim);
        assert_eq!(ErrorCode::ClaimNotHeld.category(), ErrorCategory::Claim);
    }

    #[test]
    fn artifact_code_categorised() {
        assert_eq!(
            ErrorCode::ArtifactAccessDenied.category(),
            ErrorCategory::Artifact
        );
    }

    #[test]
    fn not_found_code_categorised() {
        assert_eq!(ErrorCode::NotFound.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn internal_code_categorised() {
        assert_eq!(ErrorCode::Internal.category(), ErrorCategory::Internal);
    }

    // -- Builder pattern ------------------------------------------------

    #[test]
    fn builder_with_context_multiple_keys() {
        let err = HubError::new(ErrorCode::ClaimConflict, "taken")
            .with_context("task_id", 7)
            .with_context("agent_id", "a1")
            .with_context("retries", 3);
        assert_eq!(err.context.len(), 3);
        assert_eq!(err.context["task_id"], serde_json::json!(7));
        assert_eq!(err.context["agent_id"], serde_json::json!("a1"));
        assert_eq!(err.context["retries"], serde_json::json!(3));
    }

    #[test]
    fn builder_with_source() {
        let src = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = HubError::new(ErrorCode::ArtifactAccessDenied, "denied").with_source(src);
        assert!(err.source.is_some());
        let displayed = err.source.as_ref().unwrap().to_string();
        assert_eq!(displayed, "access denied");
    }

    #[test]
    fn not_found_shorthand() {
        let err = HubError::not_found("no such message");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn internal_shorthand() {
        let err = HubError::internal("store write failed");
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn category_shorthand() {
        let err = HubError::new(ErrorCode::DependencyMissing, "no such dep");
        assert_eq!(err.category(), ErrorCategory::Dependency);
    }

    // -- Serialization / Deserialization --------------------------------

    #[test]
    fn error_code_serde_roundtrip() {
        let code = ErrorCode::FullModeForbiddenInPolling;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#""FULL_MODE_FORBIDDEN_IN_POLLING""#);
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn error_category_serde_roundtrip() {
        let cat = ErrorCategory::Claim;
        let json = serde_json::to_string(&cat).unwrap();
        assert_eq!(json, r#""claim""#);
        let back: ErrorCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat);
    }

    #[test]
    fn dto_roundtrip_without_source() {
        let err = HubError::new(ErrorCode::DoneGateFailed, "gate failed")
            .with_context("task_id", 9);
        let dto: HubErrorDto = (&err).into();
        let json = serde_json::to_string(&dto).unwrap();
        let back: HubErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        assert!(back.source_message.is_none());
    }

    #[test]
    fn dto_roundtrip_with_source() {
        let src = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        let err = HubError::new(ErrorCode::Internal, "crash").with_source(src);
        let dto: HubErrorDto = (&err).into();
        assert_eq!(dto.source_message.as_deref(), Some("pipe broke"));
        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("pipe broke"));
    }

    #[test]
    fn dto_to_hub_error() {
        let dto = HubErrorDto {
            code: ErrorCode::VerifierRequired,
            message: "bad".into(),
            context: BTreeMap::new(),
            source_message: Some("inner".into()),
        };
        let err: HubError = dto.into();
        assert_eq!(err.code, ErrorCode::VerifierRequired);
        // Source is lost in DTO -> HubError conversion (opaque type).
        assert!(err.source.is_none());
    }

    // -- Error chain (source) preservation ------------------------------

    #[test]
    fn std_error_source_chain() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = HubError::new(ErrorCode::Internal, "staging").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "not found");
    }

    #[test]
    fn std_error_source_none_by_default() {
        let err = HubError::new(ErrorCode::Internal, "oops");
        assert!(std::error::Error::source(&err).is_none());
    }

    // -- Unique string representations ----------------------------------

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            let s = code.as_str();
            assert!(seen.insert(s), "duplicate as_str value: {s}");
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn all_codes_display_matches_as_str() {
        for code in ALL_CODES {
            assert_eq!(code.to_string(), code.as_str());
        }
    }

    #[test]
    fn error_code_count() {
        // Ensure we don't silently drop a variant from ALL_CODES.
        assert_eq!(ALL_CODES.len(), 16);
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(code).unwrap();
            let expected = format!(r#""{}""#, code.as_str());
            assert_eq!(json, expected, "mismatch for {code:?}");
        }
    }

    #[test]
    fn error_category_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Claim.to_string(), "claim");
        assert_eq!(ErrorCategory::Internal.to_string(), "internal");
    }

    #[test]
    fn context_with_nested_json() {
        let err = HubError::new(ErrorCode::Internal, "nested")
            .with_context("details", serde_json::json!({"a": 1, "b": [2, 3]}));
        assert_eq!(
            err.context["details"],
            serde_json::json!({"a": 1, "b": [2, 3]})
        );
    }
}
