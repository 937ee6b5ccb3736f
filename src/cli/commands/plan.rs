//! Plan command
//!
//! Refreshes state from the service and shows what `apply` would change.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Exit code for `--detailed-exitcode` when the plan has changes
pub const EXIT_CHANGES_PRESENT: i32 = 2;

/// Arguments for the plan command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Path to the manifest file
    #[arg(required = true)]
    pub manifest: PathBuf,

    /// Plan against the state file as-is, without reading the service
    #[arg(long)]
    pub no_refresh: bool,

    /// Exit with 2 when there are changes to apply
    #[arg(long)]
    pub detailed_exitcode: bool,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let manifest = ctx.load_manifest(&self.manifest)?;
        let mut state = ctx.load_state()?;
        let engine = ctx.engine(true)?;

        if !self.no_refresh {
            let report = engine.refresh(&mut state).await?;
            for label in &report.removed {
                ctx.output
                    .warning(&format!("{} no longer exists and will be recreated", label));
            }
        }

        let plan = engine.plan(&manifest, &state)?;
        ctx.output.plan(&plan);
        ctx.output.elapsed();

        if self.detailed_exitcode && plan.has_changes() {
            Ok(EXIT_CHANGES_PRESENT)
        } else {
            Ok(0)
        }
    }
}
