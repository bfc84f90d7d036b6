//! Integration tests for the tulp orchestration engine

mod config_integration;
mod continuation_flow;
mod execution_flow;
mod output_writer;
mod provider_registry;
mod test_utils;
