use crate::digest::{content_digest, record_id};
use crate::error::{MirrorError, Result};
use crate::remote_url::RemoteUrl;
use serde::{Deserialize, Serialize};

/// Parsed remote plus the ref the mirror has checked out.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    pub protocol: String,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub name: String,
    pub full_name: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_link: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

/// Provenance record registered once per repository per run. File records
/// point back at it by `id`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub id: String,
    pub source_key: String,
    pub source_instance_name: String,
    #[serde(flatten)]
    pub remote: RemoteIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,
}

impl RepositoryDescriptor {
    pub fn content_digest(&self) -> Result<String> {
        content_digest(self).map_err(|source| MirrorError::Serialize {
            name: self.source_instance_name.clone(),
            source,
        })
    }

    pub fn with_head_commit(mut self, head_commit: impl Into<String>) -> Self {
        self.head_commit = Some(head_commit.into());
        self
    }
}

pub fn source_key(name: &str) -> String {
    format!("git-remote-{name}")
}

pub fn descriptor_id(name: &str) -> String {
    record_id(&source_key(name))
}

/// Pure mapping from configuration and resolved ref to a descriptor.
pub fn build_descriptor(
    name: &str,
    remote: &str,
    resolved_ref: &str,
) -> Result<RepositoryDescriptor> {
    let resolved_ref = resolved_ref.trim();
    if resolved_ref.is_empty() || resolved_ref == "HEAD" {
        return Err(MirrorError::BranchResolution {
            name: name.to_string(),
            reason: format!("{resolved_ref:?} is not a concrete ref"),
        });
    }
    let parsed = RemoteUrl::parse(remote)?;
    let web_link = parsed.web_link();
    Ok(RepositoryDescriptor {
        id: descriptor_id(name),
        source_key: source_key(name),
        source_instance_name: name.to_string(),
        remote: RemoteIdentity {
            protocol: parsed.protocol,
            host: parsed.host,
            port: parsed.port,
            user: parsed.user,
            owner: parsed.owner,
            organization: parsed.organization,
            name: parsed.name,
            full_name: parsed.full_name,
            href: parsed.href,
            web_link,
            git_ref: resolved_ref.to_string(),
        },
        head_commit: None,
    })
}
