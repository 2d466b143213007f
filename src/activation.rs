//! Access key authorization.
//!
//! The authorization check is an opaque collaborator: the engine only needs
//! a pass/fail answer with a reason. [`AccessValidator`] is the seam; the
//! default [`OfflineValidator`] checks key shape locally. Outcomes that
//! only a remote licensing service can produce (throttled, limit reached)
//! are still part of the taxonomy and reachable through the seam.

use thiserror::Error;

use crate::error::{CaracalError, ErrorKind};

/// Minimum accepted access key length.
const MIN_KEY_LENGTH: usize = 24;

/// Authorization failure, mapped 1:1 onto the activation error kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("access key rejected: {reason}")]
    Refused { reason: String },

    #[error("activation throttled, retry later")]
    Throttled,

    #[error("activation limit reached")]
    LimitReached,

    #[error("activation failed: {message}")]
    Failed { message: String },
}

impl ActivationError {
    /// The public error kind this failure maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActivationError::Refused { .. } => ErrorKind::ActivationRefused,
            ActivationError::Throttled => ErrorKind::ActivationThrottled,
            ActivationError::LimitReached => ErrorKind::ActivationLimitReached,
            ActivationError::Failed { .. } => ErrorKind::Activation,
        }
    }
}

impl From<ActivationError> for CaracalError {
    fn from(err: ActivationError) -> Self {
        CaracalError::with_stack(
            err.kind(),
            "Initialization failed",
            vec![err.to_string()],
        )
    }
}

/// Authorization seam.
///
/// Implementations must be deterministic for a given key so that repeated
/// failing calls produce identical message stacks.
pub trait AccessValidator: Send {
    /// Checks the access key, returning `Ok(())` when the session may be
    /// created.
    fn authorize(&self, access_key: &str) -> Result<(), ActivationError>;
}

/// Default validator: structural checks on the key, no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineValidator;

impl AccessValidator for OfflineValidator {
    fn authorize(&self, access_key: &str) -> Result<(), ActivationError> {
        let refused = |reason: &str| ActivationError::Refused {
            reason: reason.to_string(),
        };

        if access_key.len() < MIN_KEY_LENGTH {
            return Err(refused("key is too short"));
        }
        if !access_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
        {
            return Err(refused("key contains invalid characters"));
        }
        Ok(())
    }
}

/// Validator that always returns a fixed outcome.
///
/// Lets tests and callers exercise the service-side activation outcomes
/// that the offline validator cannot produce.
#[derive(Debug, Clone)]
pub struct FixedOutcomeValidator {
    outcome: Result<(), ActivationError>,
}

impl FixedOutcomeValidator {
    /// Always authorizes.
    pub fn allow() -> Self {
        Self { outcome: Ok(()) }
    }

    /// Always fails with the given error.
    pub fn deny(err: ActivationError) -> Self {
        Self { outcome: Err(err) }
    }
}

impl AccessValidator for FixedOutcomeValidator {
    fn authorize(&self, _access_key: &str) -> Result<(), ActivationError> {
        self.outcome.clone()
    }
}
