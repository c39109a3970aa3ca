//! Integration tests for full suite runs.
//!
//! These tests run the complete lifecycle against the memory driver, with
//! capabilities switched off and faults injected, and check that the suite
//! passes conforming drivers and pinpoints the stage where broken ones fail.
