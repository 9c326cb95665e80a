use crate::digest::{record_id, sha256_file};
use crate::error::{MirrorError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use walkdir::WalkDir;

/// One file materialized from a mirror.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub absolute_path: String,
    pub relative_path: String,
    pub relative_directory: String,
    pub base: String,
    pub name: String,
    pub extension: String,
    pub size: u64,
    pub modified: String,
    pub content_digest: String,
    pub source_instance_name: String,
    /// Id of the repository descriptor this file came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
}

/// Turns a directory and glob patterns into file records.
pub trait FileIngestor: Sync {
    fn ingest(&self, name: &str, root: &Path, patterns: &[String]) -> Result<Vec<FileRecord>>;
}

/// Glob-based ingestor. Patterns are relative to the mirror root and may use
/// `{a,b}` alternation; a leading `!` turns a pattern into an exclusion.
/// Dotfiles match only when a pattern names a dot segment literally, and
/// `.git` is never ingested.
#[derive(Clone, Debug, Default)]
pub struct GlobIngestor {
    pub include_dotfiles: bool,
}

struct PatternSets {
    includes: GlobSet,
    /// Includes with a literal dot segment; the only ones hidden paths can hit.
    dotted: GlobSet,
    excludes: GlobSet,
}

impl PatternSets {
    fn admits(&self, relative: &str, include_dotfiles: bool) -> bool {
        let included = if !include_dotfiles && is_hidden(relative) {
            self.dotted.is_match(relative)
        } else {
            self.includes.is_match(relative)
        };
        included && !self.excludes.is_match(relative)
    }
}

impl FileIngestor for GlobIngestor {
    fn ingest(&self, name: &str, root: &Path, patterns: &[String]) -> Result<Vec<FileRecord>> {
        let root = std::path::absolute(root).map_err(|err| MirrorError::io(root, err))?;
        let sets = compile_patterns(name, patterns)?;
        let prune_hidden = !self.include_dotfiles && sets.dotted.is_empty();

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let file_name = entry.file_name().to_string_lossy();
                file_name != ".git" && !(prune_hidden && file_name.starts_with('.'))
            });

        let mut records = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| MirrorError::Walk {
                name: name.to_string(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            if sets.admits(&to_slash(relative), self.include_dotfiles) {
                records.push(file_record(name, &root, entry.path())?);
            }
        }
        Ok(records)
    }
}

fn compile_patterns(name: &str, patterns: &[String]) -> Result<PatternSets> {
    let mut includes = GlobSetBuilder::new();
    let mut dotted = GlobSetBuilder::new();
    let mut excludes = GlobSetBuilder::new();
    let mut include_count = 0usize;
    for raw in patterns {
        let (negated, pattern) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };
        let pattern = pattern.trim().trim_start_matches('/');
        if pattern.is_empty() {
            return Err(ingest_error(name, &format!("empty pattern {raw:?}")));
        }
        if pattern.split('/').any(|segment| segment == "..") {
            return Err(ingest_error(
                name,
                &format!("pattern {raw:?} escapes the mirror"),
            ));
        }
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| MirrorError::Pattern {
                name: name.to_string(),
                pattern: raw.clone(),
                source,
            })?;
        if negated {
            excludes.add(glob);
            continue;
        }
        if is_hidden(pattern) {
            dotted.add(glob.clone());
        }
        includes.add(glob);
        include_count += 1;
    }
    if include_count == 0 {
        return Err(ingest_error(name, "no include patterns configured"));
    }
    let build = |builder: GlobSetBuilder| {
        builder.build().map_err(|source| MirrorError::Pattern {
            name: name.to_string(),
            pattern: patterns.join(","),
            source,
        })
    };
    Ok(PatternSets {
        includes: build(includes)?,
        dotted: build(dotted)?,
        excludes: build(excludes)?,
    })
}

fn is_hidden(relative: &str) -> bool {
    relative.split('/').any(|segment| segment.starts_with('.'))
}

fn file_record(name: &str, root: &Path, path: &Path) -> Result<FileRecord> {
    let metadata = fs::metadata(path).map_err(|err| MirrorError::io(path, err))?;
    let content_digest = sha256_file(path).map_err(|err| MirrorError::io(path, err))?;
    let relative = path.strip_prefix(root).unwrap_or(path);
    let absolute_path = path.to_string_lossy().into_owned();
    let lossy = |value: Option<&std::ffi::OsStr>| {
        value
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let modified = metadata
        .modified()
        .ok()
        .and_then(|modified| OffsetDateTime::from(modified).format(&Rfc3339).ok())
        .unwrap_or_default();
    Ok(FileRecord {
        id: record_id(&absolute_path),
        relative_path: to_slash(relative),
        relative_directory: relative.parent().map(to_slash).unwrap_or_default(),
        base: lossy(path.file_name()),
        name: lossy(path.file_stem()),
        extension: lossy(path.extension()),
        size: metadata.len(),
        modified,
        content_digest,
        source_instance_name: name.to_string(),
        git_remote: None,
        absolute_path,
    })
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn ingest_error(name: &str, reason: &str) -> MirrorError {
    MirrorError::Ingest {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
