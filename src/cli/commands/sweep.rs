//! Sweep command
//!
//! Deletes every rule group whose name starts with a prefix, regardless of
//! state. Meant for cleaning up after interrupted test runs.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use netfw::resource::RuleGroupManager;
use netfw::sweep::Sweeper;

/// Arguments for the sweep command
#[derive(Parser, Debug, Clone)]
pub struct SweepArgs {
    /// Only delete rule groups whose name starts with this
    #[arg(long, short = 'p', default_value = "tf-acc-test")]
    pub prefix: String,

    /// Delete rule groups of every name
    #[arg(long, conflicts_with = "prefix")]
    pub all: bool,

    /// List matches without deleting them
    #[arg(long)]
    pub dry_run: bool,

    /// Deletes to run at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

impl SweepArgs {
    /// Execute the sweep command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let api = ctx.connect()?;
        let manager = RuleGroupManager::with_options(api, ctx.config.manager_options());

        let mut sweeper = Sweeper::new(manager)
            .concurrency(self.concurrency)
            .dry_run(self.dry_run);
        if !self.all {
            sweeper = sweeper.prefix(&self.prefix);
        }

        let report = sweeper.run().await;
        ctx.persist()?;
        let report = report?;

        if let Some(reason) = &report.skipped {
            ctx.output.warning(&format!("Sweep skipped: {}", reason));
        }

        if ctx.output.is_json() {
            ctx.output.json(&report);
        } else {
            let title = if self.dry_run { "Would delete" } else { "Deleted" };
            ctx.output.list(title, &report.deleted);
        }

        report.into_result()?;
        Ok(0)
    }
}
