//! Bulk removal of leftover rule groups.
//!
//! Used to clean up after interrupted test runs: list everything in the
//! region, optionally keep only names with a given prefix, and delete each
//! one. Failures are collected per ARN instead of stopping the sweep.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::wire::RuleGroupMetadata;
use crate::api::{RuleGroupApi, MAX_LIST_RESULTS};
use crate::error::{Error, Result};
use crate::resource::RuleGroupManager;

/// Error codes meaning the service can't be swept in this region at all.
const SKIP_SWEEP_CODES: &[&str] = &[
    "UnsupportedOperation",
    "UnsupportedOperationException",
    "UnrecognizedClientException",
    "InvalidAction",
];

fn is_skip_sweep_error(err: &Error) -> bool {
    match err {
        Error::Api { code, message, .. } => {
            SKIP_SWEEP_CODES.contains(&code.as_str())
                || message.contains("not supported in this region")
                || message.contains("is not available in this region")
        }
        _ => false,
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// ARNs deleted (or that would be, in a dry run)
    pub deleted: Vec<String>,
    /// ARN and error message for each rule group that couldn't be deleted
    pub failures: Vec<(String, String)>,
    /// Why the sweep was skipped, if it was
    pub skipped: Option<String>,
}

impl SweepReport {
    /// Turns collected failures into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::Sweep {
                failures: self.failures,
            })
        }
    }
}

/// Deletes every rule group matching a name prefix.
#[derive(Debug)]
pub struct Sweeper<A> {
    manager: RuleGroupManager<A>,
    prefix: Option<String>,
    concurrency: usize,
    dry_run: bool,
}

impl<A: RuleGroupApi> Sweeper<A> {
    pub fn new(manager: RuleGroupManager<A>) -> Self {
        Self {
            manager,
            prefix: None,
            concurrency: 4,
            dry_run: false,
        }
    }

    /// Only sweep rule groups whose name starts with `prefix`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Lists every rule group, following pagination.
    pub async fn list_all(&self) -> Result<Vec<RuleGroupMetadata>> {
        let mut all = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .manager
                .api()
                .list_rule_groups(next_token, MAX_LIST_RESULTS)
                .await?;
            all.extend(page.rule_groups);
            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(all)
    }

    /// Runs the sweep. The report lists failures; use
    /// [`SweepReport::into_result`] to treat them as an error.
    pub async fn run(&self) -> Result<SweepReport> {
        let listed = match self.list_all().await {
            Ok(listed) => listed,
            Err(e) if is_skip_sweep_error(&e) => {
                warn!(error = %e, "Skipping rule group sweep");
                return Ok(SweepReport {
                    skipped: Some(e.to_string()),
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };

        let targets: Vec<String> = listed
            .into_iter()
            .filter(|g| self.prefix.as_deref().map_or(true, |p| g.name.starts_with(p)))
            .map(|g| g.arn)
            .collect();

        let mut report = SweepReport::default();
        if self.dry_run {
            report.deleted = targets;
            return Ok(report);
        }

        let results: Vec<(String, Result<()>)> = stream::iter(targets)
            .map(|arn| async move {
                info!(arn = %arn, operation = "sweep", "Deleting rule group");
                let result = self.manager.delete(&arn).await;
                (arn, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (arn, result) in results {
            match result {
                Ok(()) => report.deleted.push(arn),
                Err(e) => {
                    error!(arn = %arn, error = %e, "Failed to sweep rule group");
                    report.failures.push((arn, e.to_string()));
                }
            }
        }
        report.deleted.sort();
        report.failures.sort();
        Ok(report)
    }
}
