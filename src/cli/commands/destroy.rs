//! Destroy command - delete managed rule groups and drop them from state

use super::CommandContext;
use anyhow::Result;
use clap::Parser;

/// Arguments for the destroy command
#[derive(Parser, Debug, Clone)]
pub struct DestroyArgs {
    /// Only destroy this label
    #[arg(long, short = 't')]
    pub target: Option<String>,

    /// List what would be destroyed without deleting anything
    #[arg(long, short = 'C')]
    pub check: bool,
}

impl DestroyArgs {
    /// Execute the destroy command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut state = ctx.load_state()?;
        let engine = ctx.engine(self.check)?;

        let result = match &self.target {
            Some(label) => engine
                .destroy_one(label, &mut state)
                .await
                .map(|()| vec![label.clone()]),
            None => engine.destroy(&mut state).await,
        };

        if !self.check {
            ctx.save_state(&mut state)?;
            ctx.persist()?;
        }

        let destroyed = result?;
        let title = if self.check {
            "Would destroy"
        } else {
            "Destroyed"
        };
        ctx.output.list(title, &destroyed);
        Ok(0)
    }
}
