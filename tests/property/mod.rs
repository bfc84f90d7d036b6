//! Property-based tests for chunking and parsing invariants

mod chunking;
mod parsing;
