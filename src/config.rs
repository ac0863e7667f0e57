//! Run configuration consumed by the workflow.
//!
//! Flag parsing lives in the binary; this is the parsed result.

use std::path::PathBuf;

use serde::Serialize;

use crate::rebase::RebaseStrategy;

/// Default file for `--write-state-json` dumps, relative to the working directory.
pub const DEFAULT_STATE_JSON_PATH: &str = "git-stack-state.json";

/// Configuration for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Bypass drift and confirmation gates.
    pub force: bool,

    /// Report status only; never rebase or sync.
    pub check: bool,

    /// Run pre-commit and pre-push hooks while replaying and pushing.
    pub verify: bool,

    /// How the stack is replayed onto a new base.
    pub rebase: RebaseStrategy,

    /// Emit debug entries (cache hits, commands) into the output log.
    pub verbose: bool,

    /// Base branch override; detected from the remote when unset.
    pub branch: Option<String>,

    /// Hidden debug mode, required by the two debug-only switches below.
    pub debug: bool,

    write_state_json: bool,
    mock_metadata: bool,

    /// Where state dumps are written.
    pub state_json_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            force: false,
            check: false,
            verify: true,
            rebase: RebaseStrategy::default(),
            verbose: false,
            branch: None,
            debug: false,
            write_state_json: false,
            mock_metadata: false,
            state_json_path: PathBuf::from(DEFAULT_STATE_JSON_PATH),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_rebase(mut self, rebase: RebaseStrategy) -> Self {
        self.rebase = rebase;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_write_state_json(mut self, enabled: bool) -> Self {
        self.write_state_json = enabled;
        self
    }

    pub fn with_mock_metadata(mut self, enabled: bool) -> Self {
        self.mock_metadata = enabled;
        self
    }

    pub fn with_state_json_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_json_path = path.into();
        self
    }

    /// Whether state dumps are written; only honoured in debug mode.
    pub fn write_state_json(&self) -> bool {
        self.debug && self.write_state_json
    }

    /// Whether synthetic commit metadata is used; only honoured in debug mode.
    pub fn mock_metadata(&self) -> bool {
        self.debug && self.mock_metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new();
        assert!(config.verify);
        assert!(!config.force);
        assert_eq!(config.rebase, RebaseStrategy::InMemory);
        assert_eq!(config.state_json_path, PathBuf::from(DEFAULT_STATE_JSON_PATH));
    }

    #[test]
    fn debug_switches_require_debug_mode() {
        let config = Config::new()
            .with_write_state_json(true)
            .with_mock_metadata(true);
        assert!(!config.write_state_json());
        assert!(!config.mock_metadata());

        let config = config.with_debug(true);
        assert!(config.write_state_json());
        assert!(config.mock_metadata());
    }

    #[test]
    fn blank_branch_override_is_ignored() {
        let config = Config::new().with_branch(Some("  ".to_string()));
        assert_eq!(config.branch, None);

        let config = Config::new().with_branch(Some("develop".to_string()));
        assert_eq!(config.branch.as_deref(), Some("develop"));
    }
}
