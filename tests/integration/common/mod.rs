//! Common utilities for integration tests.
//!
//! This module provides shared test infrastructure for LocalStack-based
//! integration testing: client setup and seeding of a private copy of the
//! global-infrastructure namespace.

pub mod localstack;

pub use localstack::{LocalStackTestContext, SeedCatalog};
