//! twinpack - build dual ESM/CJS packages with type declarations
//!
//! This crate provides the core library functionality for twinpack:
//! manifest validation, tool detection, the build pipeline and export map
//! assembly.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for twinpack unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides stand-ins for the external bundler and type compiler, and
/// on-disk package fixtures.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{manifest::Manifest, workspace::PackageLayout};
pub use ops::{build, BuildOptions, BuildOutcome};
pub use util::context::GlobalContext;
