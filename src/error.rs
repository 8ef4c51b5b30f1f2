/// Failures caught at the category boundary of a collection cycle.
///
/// None of these propagate past [`crate::cycle::CollectionCycle`]: each one turns into a
/// logged [`crate::cycle::CategoryOutcome`] and the cycle moves on to the next category.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The counter source could not be opened, is misconfigured, or returned garbage.
    #[error("Read Failed - {category}: {reason}")]
    ReaderUnavailable {
        category: crate::models::Category,
        reason: String,
    },

    /// One sub-metric of a multi-metric category failed; the rest of the reading was kept.
    #[error("Read Failed - {category} ({metric}): {reason}")]
    ReaderPartial {
        category: crate::models::Category,
        metric: &'static str,
        reason: String,
    },

    /// The key-value backend call failed.
    #[error("Store: {key} unreachable: {source}")]
    StoreUnreachable {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The value stored at `key` is not a valid bucket.
    #[error("Store: {key} holds a corrupt bucket: {source}")]
    StoreCorrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A new sample or bucket could not be serialized; nothing was written.
    #[error("Store: {key} value could not be encoded: {source}")]
    StoreEncode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Every optimistic write attempt lost to a concurrent writer.
    #[error("Store: {key} changed concurrently, gave up after {attempts} attempts")]
    StoreConflict { key: String, attempts: u32 },
}

impl CollectError {
    pub fn unavailable(category: crate::models::Category, reason: impl std::fmt::Display) -> Self {
        CollectError::ReaderUnavailable {
            category,
            reason: reason.to_string(),
        }
    }

    pub fn partial(
        category: crate::models::Category,
        metric: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        CollectError::ReaderPartial {
            category,
            metric,
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly kind for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CollectError::ReaderUnavailable { .. } => "reader_unavailable",
            CollectError::ReaderPartial { .. } => "reader_partial",
            CollectError::StoreUnreachable { .. } => "store_unreachable",
            CollectError::StoreCorrupt { .. } => "store_corrupt",
            CollectError::StoreEncode { .. } => "store_encode",
            CollectError::StoreConflict { .. } => "store_conflict",
        }
    }
}

/// Convenience `Result` alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;
