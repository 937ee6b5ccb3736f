//! Import command
//!
//! Reads an existing rule group by ARN and records it under a label. Rules
//! text can't be read back from the service, so the next plan shows it as
//! a change until the manifest and service agree.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;

/// Arguments for the import command
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// Label to manage the rule group under
    #[arg(required = true)]
    pub label: String,

    /// ARN of the existing rule group
    #[arg(required = true)]
    pub arn: String,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut state = ctx.load_state()?;
        let engine = ctx.engine(false)?;

        let imported = engine.import(&self.label, &self.arn, &mut state).await?;
        ctx.save_state(&mut state)?;

        ctx.output.resource(&self.label, &imported);
        ctx.output.success(&format!("Imported {} as {}", self.arn, self.label));
        Ok(0)
    }
}
