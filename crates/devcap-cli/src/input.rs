//! # Input loading
//!
//! Reads the registry, profile documents and device reports from disk.
//! Files ending in `.json` are parsed as JSON, anything else as YAML; both
//! end up as the same `serde_json::Value` tree the decoders consume.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use devcap_profile::{Decoder, DeviceCapabilities, ProfileSet};
use devcap_registry::Registry;
use serde_json::Value as Json;

/// Registry and profile documents shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Capability registry (JSON or YAML).
    #[arg(long)]
    pub registry: PathBuf,

    /// Profile document. Repeat to combine several documents.
    #[arg(long = "profiles", required = true)]
    pub profiles: Vec<PathBuf>,
}

/// A loaded registry and the profiles decoded against it.
#[derive(Debug)]
pub struct Inputs {
    pub registry: Registry,
    pub profiles: ProfileSet,
}

impl Inputs {
    pub fn load(args: &InputArgs) -> Result<Self> {
        let registry = Registry::from_json(&read_tree(&args.registry)?)
            .with_context(|| format!("invalid registry {}", args.registry.display()))?;
        tracing::debug!(
            path = %args.registry.display(),
            structs = registry.structs().count(),
            "loaded registry"
        );

        let decoder = Decoder::new(&registry);
        let mut profiles = ProfileSet::new();
        for path in &args.profiles {
            let document = decoder
                .profile_document(&read_tree(path)?)
                .with_context(|| format!("invalid profile document {}", path.display()))?;
            profiles
                .extend(document)
                .with_context(|| format!("conflicting definitions in {}", path.display()))?;
        }
        profiles
            .check_references()
            .context("unresolved references across profile documents")?;

        Ok(Self { registry, profiles })
    }

    /// Decode a device report against the loaded registry.
    pub fn device(&self, path: &Path) -> Result<DeviceCapabilities> {
        Decoder::new(&self.registry)
            .device(&read_tree(path)?)
            .with_context(|| format!("invalid device report {}", path.display()))
    }
}

/// Read a JSON or YAML document into a tree.
pub fn read_tree(path: &Path) -> Result<Json> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{
        "structs": [ { "name": "F", "members": [
            { "name": "alignment", "type": "uint", "limit": "min" } ] } ]
    }"#;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn yaml_and_json_produce_the_same_tree() {
        let dir = tempfile::tempdir().unwrap();
        let json = write(dir.path(), "a.json", r#"{ "a": [1, 2], "b": { "c": true } }"#);
        let yaml = write(dir.path(), "a.yaml", "a: [1, 2]\nb:\n  c: true\n");
        assert_eq!(read_tree(&json).unwrap(), read_tree(&yaml).unwrap());
    }

    #[test]
    fn profiles_combine_across_documents() {
        let dir = tempfile::tempdir().unwrap();
        let registry = write(dir.path(), "registry.json", REGISTRY);
        let blocks = write(
            dir.path(),
            "blocks.yaml",
            "capabilities:\n  A:\n    properties:\n      F: { alignment: 256 }\n",
        );
        let profiles = write(
            dir.path(),
            "profiles.yaml",
            "profiles:\n  P:\n    api-version: 1.0.0\n    capabilities: [A]\n",
        );
        let inputs = Inputs::load(&InputArgs {
            registry,
            profiles: vec![blocks, profiles],
        })
        .unwrap();
        assert!(inputs.profiles.profile("P").is_some());
        assert!(inputs.profiles.block("A").is_some());
    }

    #[test]
    fn dangling_reference_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = write(dir.path(), "registry.json", REGISTRY);
        let profiles = write(
            dir.path(),
            "profiles.yaml",
            "profiles:\n  P:\n    api-version: 1.0.0\n    capabilities: [A]\n",
        );
        let err = Inputs::load(&InputArgs {
            registry,
            profiles: vec![profiles],
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("unresolved references"));
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.yaml", "a: [1, 2\n");
        let err = read_tree(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
