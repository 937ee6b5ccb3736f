//! Subcommands module for netfw CLI
//!
//! This module contains all the subcommand implementations and the context
//! they share: configuration, output, the service connection, and the
//! state file.

pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod show;
pub mod sweep;
pub mod validate;

use crate::cli::output::OutputFormatter;
use anyhow::{Context, Result};
use netfw::api::{HttpRuleGroupApi, MemoryRuleGroupApi, RetryingApi, RuleGroupApi};
use netfw::config::{Config, MEMORY_ENDPOINT};
use netfw::engine::Engine;
use netfw::manifest::{self, Manifest, ManifestLoader, Vars};
use netfw::resource::RuleGroupManager;
use netfw::state::StateFile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Account the in-memory service uses when none is configured
const MEMORY_ACCOUNT_ID: &str = "123456789012";

/// API handle used by every command
pub type CliApi = RetryingApi<Arc<dyn RuleGroupApi>>;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration, with command-line overrides applied
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Template variables (`key=value` or `@file`)
    pub vars: Vec<String>,
    /// Verbosity level
    pub verbosity: u8,
    /// In-memory service and the file it is kept in, when one is used
    memory: Option<(Arc<MemoryRuleGroupApi>, Option<PathBuf>)>,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, mut config: Config) -> Self {
        if let Some(state) = &cli.state {
            config.state.path = state.clone();
        }
        if let Some(endpoint) = &cli.endpoint {
            config.provider.endpoint = Some(endpoint.clone());
        }
        if let Some(region) = &cli.region {
            config.provider.region = region.clone();
        }

        let use_color = config.output.color && !cli.no_color;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            vars: cli.vars.clone(),
            verbosity: cli.verbosity(),
            memory: None,
        }
    }

    /// Connect to the configured service, wrapped in the retry policy.
    pub fn connect(&mut self) -> Result<CliApi> {
        let backend: Arc<dyn RuleGroupApi> = if self.config.uses_memory_endpoint() {
            let memory = Arc::new(self.open_memory()?);
            let backend: Arc<dyn RuleGroupApi> = memory.clone();
            let path = self.memory_path();
            self.memory = Some((memory, path));
            backend
        } else {
            let endpoint = self.config.endpoint();
            debug!(endpoint = %endpoint, "Connecting to firewall service");
            let http = HttpRuleGroupApi::new(&endpoint, self.config.request_timeout())
                .with_context(|| format!("Invalid service endpoint: {}", endpoint))?;
            Arc::new(http)
        };

        Ok(RetryingApi::new(backend, self.config.retry_policy()))
    }

    fn memory_path(&self) -> Option<PathBuf> {
        self.config
            .provider
            .endpoint
            .as_deref()
            .and_then(|e| e.strip_prefix(MEMORY_ENDPOINT))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    fn open_memory(&self) -> Result<MemoryRuleGroupApi> {
        let provider = &self.config.provider;
        let account = provider
            .account_id
            .clone()
            .unwrap_or_else(|| MEMORY_ACCOUNT_ID.to_string());
        let api = match self.memory_path() {
            Some(path) => {
                MemoryRuleGroupApi::load(&path, &provider.partition, &provider.region, account)
                    .with_context(|| format!("Failed to load {}", path.display()))?
            }
            None => MemoryRuleGroupApi::with_identity(&provider.partition, &provider.region, account),
        };
        Ok(api)
    }

    /// Save the in-memory service, if one is backed by a file.
    pub fn persist(&self) -> Result<()> {
        if let Some((api, Some(path))) = &self.memory {
            api.save(path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
        }
        Ok(())
    }

    /// Build an engine on a fresh connection
    pub fn engine(&mut self, check_mode: bool) -> Result<Engine<CliApi>> {
        let api = self.connect()?;
        let manager = RuleGroupManager::with_options(api, self.config.manager_options());
        Ok(Engine::new(manager).check_mode(check_mode))
    }

    /// Render and parse a manifest with the command-line variables
    pub fn load_manifest(&self, path: &Path) -> Result<Manifest> {
        let vars = self.parse_vars()?;
        let manifest = ManifestLoader::new().load_file(path, &vars)?;
        Ok(manifest)
    }

    pub fn state_path(&self) -> &Path {
        &self.config.state.path
    }

    pub fn load_state(&self) -> Result<StateFile> {
        let path = self.state_path();
        StateFile::load(path).with_context(|| format!("Failed to load state {}", path.display()))
    }

    pub fn save_state(&self, state: &mut StateFile) -> Result<()> {
        let path = self.config.state.path.clone();
        state
            .save(&path)
            .with_context(|| format!("Failed to save state {}", path.display()))
    }

    /// Parse template variables. `@file` loads a YAML mapping.
    pub fn parse_vars(&self) -> Result<Vars> {
        let mut vars = Vars::new();

        for var in &self.vars {
            if let Some(file_path) = var.strip_prefix('@') {
                let content = std::fs::read_to_string(file_path)
                    .with_context(|| format!("Failed to read variables file: {}", file_path))?;
                let file_vars: Vars = serde_yaml::from_str(&content)
                    .with_context(|| format!("Invalid variables file: {}", file_path))?;
                vars.extend(file_vars);
            } else {
                let (key, value) = manifest::parse_var(var)?;
                vars.insert(key, value);
            }
        }

        Ok(vars)
    }
}
