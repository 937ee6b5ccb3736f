//! # netfw - Declarative Network-Firewall Rule Groups
//!
//! netfw manages network-firewall rule groups from YAML manifests. It plans
//! changes by comparing what a manifest declares with what the firewall
//! service reports, applies them through the service API, and keeps the
//! result in a local state file so drift can be detected on the next run.
//!
//! ## Core Concepts
//!
//! - **Rule group**: a named, versioned set of stateful or stateless rules.
//!   Versioning is the service's update token.
//! - **Manifest**: YAML declaring rule groups by label, rendered through
//!   minijinja first.
//! - **State**: what netfw last read for each label, flattened into an
//!   attribute map for comparison.
//! - **Plan**: per label, one of create, replace, update, delete, or no-op.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           CLI Interface                             │
//! │                    (clap-based command parsing)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                               Engine                                │
//! │         (manifest x state file -> plans -> apply / refresh)         │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │    Manifest     │   │  RuleGroupManager   │   │       State         │
//! │  (minijinja +   │   │  (create / read /   │   │  (attribute maps,   │
//! │   serde_yaml)   │   │   update / delete)  │   │   plans, file)      │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                RuleGroupApi (HTTP, in-memory, retrying)             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use netfw::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manifest = ManifestLoader::new().load_file("rule_groups.yml".as_ref(), &Vars::new())?;
//!     let mut state = StateFile::load("netfw.state.json".as_ref())?;
//!
//!     let api = Arc::new(MemoryRuleGroupApi::new());
//!     let engine = Engine::new(RuleGroupManager::new(api));
//!
//!     engine.refresh(&mut state).await?;
//!     let report = engine.apply(&manifest, &mut state).await?;
//!     println!("{}", report.plan.summary());
//!
//!     state.save("netfw.state.json".as_ref())?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Remote API
    pub use crate::api::{
        HttpRuleGroupApi, MemoryRuleGroupApi, RetryingApi, RuleGroupApi, MAX_LIST_RESULTS,
    };

    // Configuration
    pub use crate::config::Config;

    // Execution
    pub use crate::engine::{ApplyReport, Engine, EnginePlan, PlanSummary, RefreshReport};
    pub use crate::resource::{ApplyOutcome, ManagerOptions, RuleGroupManager};
    pub use crate::sweep::{SweepReport, Sweeper};

    // Error handling
    pub use crate::error::{Error, Result};

    // Manifests
    pub use crate::manifest::{Manifest, ManifestLoader, Vars};

    // Data model
    pub use crate::model::{
        RuleGroupArn, RuleGroupBody, RuleGroupSpec, RuleGroupType, RulesSource, Tags,
    };

    // Retry
    pub use crate::retry::RetryPolicy;

    // State
    pub use crate::state::{
        AttributeChange, AttributeMap, ChangeKind, Plan, PlanAction, ResourceState, StateFile,
    };

    // Validation
    pub use crate::validate::{validate, ValidationIssue};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for netfw operations.
pub mod error;

/// Rule group data model: declarations, rule sources, variables, and ARNs.
pub mod model;

/// Schema constraints checked before any API call.
pub mod validate;

// ============================================================================
// Service Integration
// ============================================================================

/// The firewall service API and its backends.
pub mod api;

/// Retry and polling policies.
pub mod retry;

/// Rule group lifecycle on top of the API.
pub mod resource;

// ============================================================================
// Reconciliation
// ============================================================================

/// Attribute maps, plans, and the state file.
pub mod state;

/// Manifest rendering and parsing.
pub mod manifest;

/// Runs manifests against the state file.
pub mod engine;

/// Bulk cleanup of leftover rule groups.
pub mod sweep;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration file and environment handling.
pub mod config;

/// Returns the version of netfw.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
