//! Error types for core primitives.

/// Errors raised when constructing core primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A circular buffer was requested with fewer than two slots.
    #[error("circular buffer capacity must be at least 2, got {0}")]
    Capacity(usize),
}
