//! Error types for the scheduling core.

use crate::models::CardId;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced to the presentation layer.
#[derive(Debug, Error)]
pub enum SrsError {
    /// Quality rating outside the 0-5 scale.
    #[error("Invalid rating: {0} (expected 0-5)")]
    InvalidRating(u8),
    /// The referenced card is not among the owner's cards.
    #[error("Card not found: {0}")]
    CardNotFound(CardId),
    /// Persistence failure, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SrsResult<T> = Result<T, SrsError>;
