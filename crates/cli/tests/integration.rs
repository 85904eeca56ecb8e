//! Integration tests for the multivault CLI.
//!
//! These tests run the compiled binary against scenario fixtures under
//! `tests/fixtures/`.
//!
//! # Test Categories
//!
//! - **Run tests**: replay fixtures and check the reported final state
//! - **Inspect tests**: configuration reports without replay
//! - **CLI validation tests**: argument parsing, help text, error handling
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p multivault-cli --test integration
//! ```

mod integration {
    pub mod helpers;
    pub mod run_tests;
    pub mod inspect_tests;
    pub mod cli_validation_tests;
}
