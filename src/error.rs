//! Error taxonomy.

use crate::model::{Address, CardId, ContentHash, RegistrationStatus};

/// Failure reported by an external collaborator (chain node, pinning gateway, points feed).
///
/// Carries only a message; the core attaches the identifier it was working on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ExternalError(pub String);
impl ExternalError {
    /// Create from anything printable.
    pub fn new(msg: impl ToString) -> Self {
        Self(msg.to_string())
    }
}
impl From<String> for ExternalError {
    fn from(value: String) -> Self {
        Self(value)
    }
}
impl From<&str> for ExternalError {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Core error type. Each variant names the identifier or field involved.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The registration contract could not be read for an address.
    #[error("Registration record for {address} unavailable: {source}")]
    RegistryUnavailable {
        /// Account whose record was requested.
        address: Address,
        /// Underlying failure.
        source: ExternalError,
    },
    /// A card record (or the card list, when `card_id` is `None`) could not be read.
    #[error("Card {} unavailable: {source}", .card_id.map_or_else(|| "list".to_owned(), |id| id.to_string()))]
    CardUnavailable {
        /// Card requested, `None` for the card id listing.
        card_id: Option<CardId>,
        /// Underlying failure.
        source: ExternalError,
    },
    /// A pinned profile blob could not be fetched or parsed.
    #[error("Profile blob {content_hash} unavailable: {source}")]
    ProfileUnavailable {
        /// Content hash of the blob.
        content_hash: ContentHash,
        /// Underlying failure.
        source: ExternalError,
    },
    /// The points feed could not be fetched or parsed.
    #[error("Fantasy points feed unavailable: {source}")]
    FeedUnavailable {
        /// Underlying failure.
        source: ExternalError,
    },
    /// Pinning content to the storage gateway failed.
    #[error("Failed to pin {what}: {source}")]
    PinFailed {
        /// What was being pinned.
        what: String,
        /// Underlying failure.
        source: ExternalError,
    },
    /// A chain write could not be submitted or confirmed.
    #[error("Transaction `{what}` failed: {source}")]
    TransactionFailed {
        /// Which write.
        what: String,
        /// Underlying failure.
        source: ExternalError,
    },
    /// A chain write was mined with a non-success status.
    #[error("Transaction `{what}` reverted: {tx_hash}")]
    TransactionReverted {
        /// Which write.
        what: String,
        /// Hash of the mined transaction.
        tx_hash: String,
    },
    /// A user-supplied field is invalid.
    #[error("Invalid `{field}`: {reason}")]
    InvalidInput {
        /// Field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// The account must be registered for this operation.
    #[error("Account {address} is not registered (status: {status})")]
    NotRegistered {
        /// Account.
        address: Address,
        /// Its current status.
        status: RegistrationStatus,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid(field: &'static str, reason: impl ToString) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.to_string(),
        }
    }

    /// If this is an infrastructure failure (worth retrying later) rather than bad input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RegistryUnavailable { .. }
                | Self::CardUnavailable { .. }
                | Self::ProfileUnavailable { .. }
                | Self::FeedUnavailable { .. }
                | Self::PinFailed { .. }
                | Self::TransactionFailed { .. }
        )
    }
}

/// Core result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
