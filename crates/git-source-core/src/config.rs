use crate::model::RepositoryConfig;
use crate::paths::validate_name;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_JOBS: usize = 4;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub repos: Vec<RepositoryConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = serde_json::from_str(&data).context("parse config")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jobs == Some(0) {
            anyhow::bail!("jobs must be at least 1");
        }
        if self.timeout_secs == Some(0) {
            anyhow::bail!("timeout_secs must be at least 1");
        }
        let mut names = HashSet::new();
        for repo in &self.repos {
            validate_repo(repo).with_context(|| format!("repository {:?}", repo.name))?;
            if !names.insert(repo.name.as_str()) {
                anyhow::bail!("repository name {} is configured more than once", repo.name);
            }
        }
        Ok(())
    }

    /// Repositories named in `names`, in configuration order; all of them
    /// when `names` is empty.
    pub fn select(&self, names: &[String]) -> anyhow::Result<Vec<RepositoryConfig>> {
        if names.is_empty() {
            return Ok(self.repos.clone());
        }
        for name in names {
            if !self.repos.iter().any(|repo| &repo.name == name) {
                anyhow::bail!("no repository named {name} in config");
            }
        }
        Ok(self
            .repos
            .iter()
            .filter(|repo| names.contains(&repo.name))
            .cloned()
            .collect())
    }

    pub fn cache_root(&self) -> anyhow::Result<PathBuf> {
        match &self.cache_root {
            Some(root) => Ok(root.clone()),
            None => default_cache_root(),
        }
    }

    pub fn manifest_path(&self) -> anyhow::Result<PathBuf> {
        match &self.manifest {
            Some(path) => Ok(path.clone()),
            None => default_manifest_path(),
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or(DEFAULT_JOBS)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn validate_repo(repo: &RepositoryConfig) -> anyhow::Result<()> {
    validate_name(&repo.name)?;
    if repo.remote.trim().is_empty() {
        anyhow::bail!("remote is empty");
    }
    if let Some(branch) = &repo.branch {
        let branch = branch.trim();
        if branch.is_empty() || branch == "HEAD" {
            anyhow::bail!("branch {branch:?} is not a branch name");
        }
    }
    if repo.patterns.is_empty() {
        anyhow::bail!("at least one pattern is required");
    }
    if repo.patterns.iter().any(|pattern| pattern.trim().is_empty()) {
        anyhow::bail!("patterns must not be empty");
    }
    Ok(())
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("com", "git-source", "git-source").context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_cache_root() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().join("repos"))
}

pub fn default_manifest_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("manifest.json"))
}
