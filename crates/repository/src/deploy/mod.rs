//! Deployment manifest checker behind `sio-repository check-deploy`.
//!
//! Reads a compose manifest, resolves its variable references against the
//! process environment (and a `.env` beside the manifest), then checks the
//! topology and the build recipe of every locally built service.

pub mod checks;
pub mod manifest;
pub mod recipe;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use checks::Finding;
pub use manifest::Manifest;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unresolved variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub manifest: PathBuf,
    pub findings: Vec<Finding>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.findings.iter().all(|f| f.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.passed)
    }
}

fn read(path: &Path) -> Result<String, DeployError> {
    std::fs::read_to_string(path).map_err(|source| DeployError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `KEY=value` pairs of a `.env` file, if one exists.
fn dotenv_values(path: &Path) -> HashMap<String, String> {
    dotenvy::from_path_iter(path)
        .map(|iter| iter.filter_map(Result::ok).collect())
        .unwrap_or_default()
}

/// Run every check against the manifest at `manifest_path`, looking up
/// variables with `lookup` before the `.env` beside the manifest.
pub fn run_checks_with(
    manifest_path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<CheckReport, DeployError> {
    let base_dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let raw = read(manifest_path)?;

    let dotenv = dotenv_values(&base_dir.join(".env"));
    let resolve = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .or_else(|| dotenv.get(name).cloned())
    };

    let missing = checks::missing_variables(&raw, &resolve);
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Manifest has unresolved variables");
        return Err(DeployError::MissingVariables(missing));
    }

    let manifest = Manifest::from_yaml(&checks::interpolate(&raw, &resolve))?;

    let mut findings = vec![
        checks::check_version(&manifest),
        checks::check_project_name(&manifest),
    ];
    findings.extend(checks::check_build_sources(&manifest, base_dir));
    findings.extend(checks::check_dependencies(&manifest));
    findings.extend(checks::check_connection_hosts(&manifest));

    for (name, service) in &manifest.services {
        let Some(build) = &service.build else {
            continue;
        };
        let context = base_dir.join(build.context());
        let recipe_path = context.join(build.dockerfile());
        // A missing recipe is already reported by the build-source check.
        let Ok(text) = std::fs::read_to_string(&recipe_path) else {
            continue;
        };
        tracing::debug!(service = %name, recipe = %recipe_path.display(), "Checking build recipe");
        let instructions = recipe::parse(&text);
        findings.extend(checks::check_recipe(&instructions));
        findings.extend(checks::check_copy_sources(&instructions, &context));
    }

    Ok(CheckReport {
        manifest: manifest_path.to_path_buf(),
        findings,
    })
}

/// [`run_checks_with`] over the process environment.
pub fn run_checks(manifest_path: &Path) -> Result<CheckReport, DeployError> {
    run_checks_with(manifest_path, |name| std::env::var(name).ok())
}
