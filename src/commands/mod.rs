// ABOUTME: Command module aggregator for the hadron CLI.
// ABOUTME: Re-exports the deploy and destroy handlers.

mod deploy;
mod destroy;
mod plan_program;

pub use deploy::deploy;
pub use destroy::destroy;
