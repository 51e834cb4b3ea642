//! High-level operations.
//!
//! This module contains the implementation of twinpack commands.

pub mod build_all;
pub mod pkg_build;

pub use build_all::{build_packages, BuildAllSummary, PackageReport};
pub use pkg_build::{build, BuildFailure, BuildOptions, BuildOutcome, BuildSummary};
