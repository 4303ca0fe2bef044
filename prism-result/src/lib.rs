//! Error types and result definitions for the Prism block library.
//!
//! This crate provides the unified error type ([`Error`]) and result type alias
//! ([`Result<T>`]) used throughout the Prism crates. All operations that can
//! fail return `Result<T>`, where the error variant carries enough context to
//! diagnose what went wrong.
//!
//! # Error Philosophy
//!
//! Prism uses a single error enum ([`Error`]) rather than crate-specific error
//! types. This approach:
//! - Simplifies error handling across crate boundaries
//! - Allows errors to propagate naturally with the `?` operator
//! - Enables structured error matching for programmatic handling
//!
//! # Error Categories
//!
//! - **User input errors** ([`Error::InvalidArgumentError`]): out-of-range
//!   positions, malformed selection arguments
//! - **Contract violations** ([`Error::InvariantViolation`]): producer or
//!   copy-path defects caught by fail-fast checks
//! - **Unsupported operations** ([`Error::Unsupported`]): operations a
//!   container shape cannot express
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
