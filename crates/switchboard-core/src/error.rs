//! Unified error types for the switchboard core.
//!
//! Pipeline stages use an early-return pattern on `Err`; the webhook
//! pipeline is the single point that converts errors into a typed
//! [`WebhookResponse`](crate::model::WebhookResponse). Everywhere else,
//! errors surface to the caller unchanged.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Validation Errors
// =============================================================================

/// A single field-level schema failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field (e.g. `"author.user_id"`).
    pub path: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Schema rejection raised by a value constructor.
///
/// Carries the subject type, the offending input, and per-field error
/// records so callers can report exactly which paths failed.
#[derive(Debug, Clone, Error)]
#[error("validation failed for {subject}: {}", format_field_errors(errors))]
pub struct ValidationError {
    /// The canonical type that rejected the input (e.g. `"incoming"`).
    pub subject: &'static str,
    /// The input value that failed validation.
    pub input: Value,
    /// Per-field failures.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(subject: &'static str, input: Value, errors: Vec<FieldError>) -> Self {
        Self {
            subject,
            input,
            errors,
        }
    }

    /// Single-field convenience constructor.
    pub fn field(
        subject: &'static str,
        input: Value,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(subject, input, vec![FieldError::new(path, message)])
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Core Errors
// =============================================================================

/// Errors surfaced by the routing, capability, and webhook layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema rejection at a value constructor.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The named adapter is not configured on this chat.
    #[error("unknown adapter: {name}")]
    UnknownAdapter { name: String },

    /// The requested operation is not available on this adapter.
    ///
    /// Callers are expected to branch on the capability matrix before
    /// relying on optional operations.
    #[error("operation not supported by this adapter")]
    Unsupported,

    /// A payload could not be coerced into the named event kind.
    #[error("invalid {kind} payload")]
    InvalidInput { kind: &'static str, value: Value },

    /// An explicit event type string the envelope union does not cover.
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// Webhook verification rejected the shared secret.
    #[error("invalid webhook secret")]
    InvalidWebhookSecret,

    /// Webhook verification rejected the request signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// The adapter's own response formatter failed.
    #[error("webhook response format error")]
    WebhookResponseFormat,

    /// A failure reported by an adapter callback, propagated as-is.
    #[error("adapter error: {reason}")]
    Adapter { reason: String },

    /// A revived adapter name with no registered implementation.
    ///
    /// Produced on first use of a placeholder adapter, never during
    /// revival itself.
    #[error("adapter '{name}' is not bound to an implementation")]
    UnboundAdapter { name: String },

    /// Transport-level failure classification for cross-transport
    /// diagnostics.
    #[error("ingress failure on {transport}: {reason}")]
    Ingress {
        transport: String,
        adapter_name: Option<String>,
        reason: String,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn adapter(reason: impl std::fmt::Display) -> Self {
        Self::Adapter {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_adapter(name: impl Into<String>) -> Self {
        Self::UnknownAdapter { name: name.into() }
    }

    #[must_use]
    pub fn invalid_input(kind: &'static str, value: Value) -> Self {
        Self::InvalidInput { kind, value }
    }

    #[must_use]
    pub fn ingress(
        transport: impl Into<String>,
        adapter_name: Option<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Ingress {
            transport: transport.into(),
            adapter_name,
            reason: reason.to_string(),
        }
    }

    /// True for the two webhook verification rejections that map to 401.
    pub fn is_verification_rejection(&self) -> bool {
        matches!(self, Self::InvalidWebhookSecret | Self::InvalidSignature)
    }
}
