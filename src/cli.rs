//! CLI domain: parse, route and output only.
//! No orchestration here; the route hands one invocation to the engine.

mod output;
mod parse;
mod route;

pub use output::{map_error, write_commentary, write_diagnostic};
pub use parse::Cli;
pub use route::RunContext;
