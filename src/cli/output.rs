//! Output formatting module for netfw
//!
//! Provides colored human output and line-delimited JSON for scripting.

use colored::Colorize;
use netfw::engine::{EnginePlan, PlannedChange};
use netfw::state::{AttributeChange, ChangeKind, PlanAction, ResourceState};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        // Respect NO_COLOR environment variable
        let use_color = use_color && std::env::var("NO_COLOR").is_err();

        Self {
            use_color,
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a value as one JSON document on stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("ERROR: failed to serialize output: {}", e),
        }
    }

    fn json_line(&self, value: serde_json::Value, to_stderr: bool) {
        let line = value.to_string();
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.json_mode {
            self.json_line(
                serde_json::json!({ "type": "error", "message": message }),
                true,
            );
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.json_mode {
            self.json_line(
                serde_json::json!({ "type": "warning", "message": message }),
                true,
            );
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print an info message (respects verbosity)
    pub fn info(&self, message: &str) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }

        if self.use_color {
            println!("{} {}", "INFO:".blue(), message);
        } else {
            println!("INFO: {}", message);
        }
    }

    /// Print a result line (always shown in human mode)
    pub fn success(&self, message: &str) {
        if self.json_mode {
            return;
        }

        if self.use_color {
            println!("{}", message.green().bold());
        } else {
            println!("{}", message);
        }
    }

    /// Render every change of an engine plan, terraform style
    pub fn plan(&self, plan: &EnginePlan) {
        if self.json_mode {
            self.json(plan);
            return;
        }

        if !plan.has_changes() {
            self.success("No changes. Rule groups match the manifest.");
            return;
        }

        for change in plan.changes.iter().filter(|c| !c.plan.is_no_op()) {
            self.planned_change(change);
        }

        let summary = format!("Plan: {}.", plan.summary());
        if self.use_color {
            println!("\n{}", summary.bold());
        } else {
            println!("\n{}", summary);
        }
    }

    fn planned_change(&self, change: &PlannedChange) {
        let action = &change.plan.action;
        let verb = match action {
            PlanAction::Create => "will be created",
            PlanAction::Replace { .. } => "must be replaced",
            PlanAction::Update => "will be updated in-place",
            PlanAction::Delete => "will be destroyed",
            PlanAction::NoOp => "is unchanged",
        };
        let header = format!("{} {} {}", action.symbol(), change.address, verb);
        println!();
        if self.use_color {
            let colored = match action {
                PlanAction::Create => header.green(),
                PlanAction::Replace { .. } => header.magenta(),
                PlanAction::Update => header.yellow(),
                PlanAction::Delete => header.red(),
                PlanAction::NoOp => header.normal(),
            };
            println!("{}", colored.bold());
        } else {
            println!("{}", header);
        }

        if let PlanAction::Replace { reasons } = action {
            println!("    # forces replacement: {}", reasons.join(", "));
        }

        for attr in change.plan.changes.iter().filter(|c| !c.is_count()) {
            self.attribute_change(attr);
        }
    }

    fn attribute_change(&self, change: &AttributeChange) {
        if let Some(diff) = change.text_diff() {
            println!("    ~ {} = <<EOT", change.path);
            for line in diff.lines() {
                let line = format!("        {}", line);
                if !self.use_color {
                    println!("{}", line);
                } else if line.trim_start().starts_with('+') {
                    println!("{}", line.green());
                } else if line.trim_start().starts_with('-') {
                    println!("{}", line.red());
                } else {
                    println!("{}", line);
                }
            }
            println!("      EOT");
            return;
        }

        let line = format!("    {}", change);
        if !self.use_color {
            println!("{}", line);
            return;
        }
        match change.kind {
            ChangeKind::Add => println!("{}", line.green()),
            ChangeKind::Remove => println!("{}", line.red()),
            ChangeKind::Modify => println!("{}", line.yellow()),
        }
    }

    /// Print one managed rule group
    pub fn resource(&self, label: &str, state: &ResourceState) {
        if self.json_mode {
            self.json(state);
            return;
        }

        let title = format!("{} ({})", label, state.name);
        if self.use_color {
            println!("\n{}", title.bright_white().bold());
        } else {
            println!("\n{}", title);
        }

        let mut rows = vec![
            ("arn", state.arn.clone()),
            ("type", state.rule_group_type.to_string()),
            ("capacity", state.capacity.to_string()),
            ("update_token", state.update_token.clone()),
        ];
        if let Some(description) = &state.description {
            rows.push(("description", description.clone()));
        }
        for (key, value) in &state.tags {
            rows.push(("tag", format!("{}={}", key, value)));
        }
        for (key, value) in rows {
            if self.use_color {
                println!("  {:<13} {}", key.bright_black(), value);
            } else {
                println!("  {:<13} {}", key, value);
            }
        }
    }

    /// Print a list of items
    pub fn list(&self, title: &str, items: &[String]) {
        if self.json_mode {
            self.json(&serde_json::json!({ "title": title, "items": items }));
            return;
        }

        if self.use_color {
            println!("\n{}:", title.bright_white().bold());
        } else {
            println!("\n{}:", title);
        }

        for item in items {
            if self.use_color {
                println!("  {} {}", "-".bright_black(), item);
            } else {
                println!("  - {}", item);
            }
        }
    }

    /// Print elapsed time at higher verbosity
    pub fn elapsed(&self) {
        if self.verbosity < 1 || self.json_mode {
            return;
        }
        let secs = self.start_time.elapsed().as_secs_f64();
        if self.use_color {
            println!("{}", format!("Completed in {:.2}s", secs).bright_black());
        } else {
            println!("Completed in {:.2}s", secs);
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
