// ABOUTME: Destroy command implementation.
// ABOUTME: Runs the plan program in destroy mode.

use super::plan_program::PlanProgram;
use hadron::config::Mode;
use hadron::error::Result;
use hadron::output::Output;
use std::path::Path;

pub async fn destroy(plan: &Path, log_level: &str, mut output: Output) -> Result<()> {
    let program = PlanProgram::locate(plan)?;
    output.start_timer();
    output.progress(&format!("Destroying plan {}", program));

    program.run(Mode::Destroy, log_level, output.mode()).await?;

    output.success("Destroy complete");
    Ok(())
}
