//! Apply command
//!
//! Refreshes state, plans, and executes the plan. State is saved after the
//! run even when a change fails, so completed changes are never lost.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the apply command
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Path to the manifest file
    #[arg(required = true)]
    pub manifest: PathBuf,

    /// Show the plan without changing anything
    #[arg(long, short = 'C')]
    pub check: bool,

    /// Skip reading the service before planning
    #[arg(long)]
    pub no_refresh: bool,
}

impl ApplyArgs {
    /// Execute the apply command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let manifest = ctx.load_manifest(&self.manifest)?;
        let mut state = ctx.load_state()?;
        let engine = ctx.engine(self.check)?;

        if !self.no_refresh {
            let report = engine.refresh(&mut state).await?;
            for label in &report.removed {
                ctx.output
                    .warning(&format!("{} no longer exists and will be recreated", label));
            }
        }

        let result = engine.apply(&manifest, &mut state).await;

        if !self.check {
            ctx.save_state(&mut state)?;
            ctx.persist()?;
        }

        let report = result?;
        ctx.output.plan(&report.plan);

        if report.check_mode {
            ctx.output.info("Check mode: no changes were made");
        } else if report.plan.has_changes() {
            ctx.output.success(&format!(
                "Apply complete! Resources: {}.",
                report.plan.summary()
            ));
        }
        ctx.output.elapsed();
        Ok(0)
    }
}
