use thiserror::Error;

/// Unified error type for all Prism operations.
///
/// Errors propagate upward through the call stack using Rust's `?` operator.
/// Internal code can match on specific variants for fine-grained handling.
///
/// # Thread Safety
///
/// `Error` implements `Send` and `Sync`, allowing errors to cross thread
/// boundaries during concurrent pipeline execution.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid user input or API parameter.
    ///
    /// This error indicates a problem with arguments passed to Prism APIs:
    /// - Out-of-range row or entry positions
    /// - Region bounds exceeding the underlying container
    /// - Malformed selection arguments (position lists, selection masks)
    /// - A source block of the wrong concrete type handed to a builder
    ///
    /// These errors are recoverable: fix the input and retry the operation.
    /// They are propagated immediately to the caller and never retried
    /// internally.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// A structural contract was broken by a producer or a copy path.
    ///
    /// Raised by fail-fast checks at construction time, for example a hash
    /// index table whose length does not match its declared entry count, or
    /// key/value columns whose entry counts diverge. This indicates an
    /// upstream defect, not a runtime state; callers should treat it as
    /// fatal rather than retry.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The requested operation has no meaning for this container shape.
    ///
    /// Single-row map views interleave key and value slots of different
    /// types, so bulk copy and bulk size queries cannot produce a
    /// well-formed output column and always fail with this variant.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Internal invariant failure. These indicate bugs in Prism itself.
    #[error("Internal error: {0}")]
    Internal(String),
}
