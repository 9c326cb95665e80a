use crate::descriptor::RepositoryDescriptor;
use crate::ingest::FileRecord;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const MANIFEST_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record")]
pub enum RegistryRecord {
    GitRemote(RepositoryDescriptor),
    File(FileRecord),
}

impl RegistryRecord {
    pub fn id(&self) -> &str {
        match self {
            RegistryRecord::GitRemote(descriptor) => &descriptor.id,
            RegistryRecord::File(file) => &file.id,
        }
    }

    pub fn source_instance_name(&self) -> &str {
        match self {
            RegistryRecord::GitRemote(descriptor) => &descriptor.source_instance_name,
            RegistryRecord::File(file) => &file.source_instance_name,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegisterOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Host-side record store. The digest is what the store compares to decide
/// whether a record changed since it was last registered.
pub trait Registry {
    fn register(
        &mut self,
        record: RegistryRecord,
        content_digest: &str,
    ) -> anyhow::Result<RegisterOutcome>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub digest: String,
    pub record: RegistryRecord,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub records: BTreeMap<String, ManifestEntry>,
}

/// Registry persisted as a JSON manifest. Records that were not registered
/// (or explicitly kept) since loading are dropped on save.
#[derive(Debug)]
pub struct ManifestRegistry {
    manifest: Manifest,
    touched: HashSet<String>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self {
            manifest: Manifest {
                version: MANIFEST_VERSION,
                generated_at: None,
                records: BTreeMap::new(),
            },
            touched: HashSet::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        let json: serde_json::Value = serde_json::from_str(&data).context("parse manifest")?;
        match json.get("version").and_then(|value| value.as_u64()) {
            Some(1) => {
                let manifest = serde_json::from_value(json).context("decode manifest")?;
                Ok(Self {
                    manifest,
                    touched: HashSet::new(),
                })
            }
            Some(other) => anyhow::bail!("unsupported manifest version {other}"),
            None => anyhow::bail!("manifest has no version"),
        }
    }

    /// Writes the manifest and returns how many stale records were dropped.
    pub fn save(&mut self, path: &Path) -> anyhow::Result<usize> {
        let before = self.manifest.records.len();
        let touched = &self.touched;
        self.manifest.records.retain(|id, _| touched.contains(id));
        let pruned = before - self.manifest.records.len();
        self.manifest.generated_at = Some(
            OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .context("format timestamp")?,
        );
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create manifest directory")?;
        }
        let data = serde_json::to_string_pretty(&self.manifest).context("serialize manifest")?;
        fs::write(path, data).with_context(|| format!("write manifest {}", path.display()))?;
        Ok(pruned)
    }

    /// Keeps every record of the named sources through the next save, for
    /// repositories that were not part of this run.
    pub fn keep_source(&mut self, name: &str) {
        for (id, entry) in &self.manifest.records {
            if entry.record.source_instance_name() == name {
                self.touched.insert(id.clone());
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.manifest.records.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.manifest.records.values()
    }

    pub fn len(&self) -> usize {
        self.manifest.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.records.is_empty()
    }
}

impl Default for ManifestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for ManifestRegistry {
    fn register(
        &mut self,
        record: RegistryRecord,
        content_digest: &str,
    ) -> anyhow::Result<RegisterOutcome> {
        let id = record.id().to_string();
        self.touched.insert(id.clone());
        let outcome = match self.manifest.records.get(&id) {
            Some(existing) if existing.digest == content_digest => {
                return Ok(RegisterOutcome::Unchanged);
            }
            Some(_) => RegisterOutcome::Updated,
            None => RegisterOutcome::Created,
        };
        self.manifest.records.insert(
            id,
            ManifestEntry {
                digest: content_digest.to_string(),
                record,
            },
        );
        Ok(outcome)
    }
}
