//! Error kinds at the engine boundary.

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::engine::ContextEngine`] and the tier stores.
/// The RPC layer translates each variant to a structured payload that
/// preserves the kind name (see [`Error::kind`]) and a human message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("invalid tier: {0} (must be 1, 2, or 3)")]
    InvalidTier(u8),

    #[error("tier 1 is immutable: {0}")]
    ImmutableTier(String),

    #[error("invalid promotion: {0}")]
    InvalidPromotion(String),

    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The stable kind name the RPC layer preserves in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidTier(_) => "InvalidTier",
            Self::ImmutableTier(_) => "ImmutableTier",
            Self::InvalidPromotion(_) => "InvalidPromotion",
            Self::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::Cancelled => "Cancelled",
            Self::InvalidInput(_) => "InvalidInput",
            Self::Serialization(_) => "InvalidInput",
            Self::Io(_) => "StoreUnavailable",
        }
    }

    /// Reads should degrade to an empty result plus a warning log rather
    /// than propagate I/O transients where possible; this flags which
    /// variants are safe for a read path to swallow that way.
    pub fn is_transient_read_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Io(_))
    }
}
