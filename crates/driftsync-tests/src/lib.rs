//! Integration test support for driftsync
//!
//! Fixture builders and test-only storage providers shared by the
//! integration tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Fixture trees with deterministic modification times, file inspection
/// helpers, and a provider wrapper simulating media that cannot preserve
/// modification times.
pub mod test_utils;
