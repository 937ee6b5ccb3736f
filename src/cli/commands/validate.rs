//! Validate command
//!
//! Renders and parses a manifest and checks every declaration without
//! contacting the firewall service.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the manifest file
    #[arg(required = true)]
    pub manifest: PathBuf,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let manifest = ctx.load_manifest(&self.manifest)?;
        manifest.validate()?;

        let labels: Vec<String> = manifest.labels().map(str::to_string).collect();
        if ctx.output.is_json() {
            ctx.output.json(&serde_json::json!({
                "valid": true,
                "rule_groups": labels,
            }));
        } else {
            ctx.output.success(&format!(
                "{} is valid ({} rule group(s))",
                self.manifest.display(),
                labels.len()
            ));
        }
        Ok(0)
    }
}
