//! Show command - print managed rule groups from the state file

use super::CommandContext;
use anyhow::{bail, Result};
use clap::Parser;

/// Arguments for the show command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Only show this label
    pub label: Option<String>,
}

impl ShowArgs {
    /// Execute the show command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let state = ctx.load_state()?;

        if let Some(label) = &self.label {
            let Some(resource) = state.get(label) else {
                bail!("{} is not in state", netfw::state::resource_address(label));
            };
            ctx.output.resource(label, resource);
            return Ok(0);
        }

        if ctx.output.is_json() {
            ctx.output.json(&state);
            return Ok(0);
        }

        if state.is_empty() {
            ctx.output.success("No rule groups are managed.");
            return Ok(0);
        }
        for label in state.labels() {
            if let Some(resource) = state.get(&label) {
                ctx.output.resource(&label, resource);
            }
        }
        Ok(0)
    }
}
