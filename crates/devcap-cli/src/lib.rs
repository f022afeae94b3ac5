//! # devcap-cli
//!
//! The `devcap` command-line interface. Argument parsing lives here and in
//! the subcommand modules; every decision is delegated to the library
//! crates.
//!
//! ## Subcommands
//!
//! - `devcap plan`: compose a profile and print its evaluation plan.
//! - `devcap check`: evaluate one or more profiles against a device report.
//! - `devcap simulate`: override a device report with a profile's declarations.
//! - `devcap merge`: fold the blocks a profile settles on into one block.
//!
//! ```bash
//! devcap check --registry registry.json --profiles profiles.yaml \
//!     --device device.json VP_DEVCAP_h264
//! ```
//!
//! ## Exit codes
//!
//! `0` on success, `1` on a load or schema error, `2` when a profile is not
//! satisfied or a merge reported conflicts.

pub mod check;
pub mod input;
pub mod merge;
pub mod output;
pub mod plan;
pub mod simulate;

use std::path::Path;

use anyhow::{Context, Result};
use devcap_eval::EvaluatorConfig;

/// Exit code for a completed run whose outcome is negative.
pub const EXIT_UNSATISFIED: u8 = 2;

/// Load the evaluator configuration.
///
/// A YAML (or JSON) file takes precedence; without one the `DEVCAP_*`
/// environment variables apply.
pub fn load_config(path: Option<&Path>) -> Result<EvaluatorConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("invalid config in {}", path.display()))
        }
        None => EvaluatorConfig::from_env().context("invalid configuration in environment"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcap_eval::MergePolicy;

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcap.yaml");
        std::fs::write(&path, "merge_policy: strict\nmax_queue_family_search: 4\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.merge_policy, MergePolicy::Strict);
        assert_eq!(config.max_queue_family_search, 4);
        assert!(config.synthesize_video_profiles);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcap.yaml");
        std::fs::write(&path, "merge_policy: strict\nparallel: true\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read config"));
    }
}
