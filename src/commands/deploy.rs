// ABOUTME: Deploy command implementation.
// ABOUTME: Runs the plan program in execute or dry-run mode.

use super::plan_program::PlanProgram;
use hadron::config::Mode;
use hadron::error::Result;
use hadron::output::Output;
use std::path::Path;

pub async fn deploy(plan: &Path, mode: Mode, log_level: &str, mut output: Output) -> Result<()> {
    let program = PlanProgram::locate(plan)?;
    output.start_timer();

    let verb = if mode == Mode::DryRun { "Simulating" } else { "Deploying" };
    output.progress(&format!("{} plan {}", verb, program));

    program.run(mode, log_level, output.mode()).await?;

    let done = if mode == Mode::DryRun {
        "Dry run complete"
    } else {
        "Deployment complete"
    };
    output.success(done);
    Ok(())
}
