//! Structural decomposition of git remote URLs.
//!
//! Accepts `scheme://` URLs (`https`, `http`, `ssh`, `git`, `git+ssh`,
//! `ssh+git`, `file`), SCP-style `user@host:path`, and bare local paths.
//! Parsing is pure: no I/O and no lookups.

use crate::error::{MirrorError, Result};
use url::Url;

const SCHEMES: &[&str] = &["https", "http", "ssh", "git", "git+ssh", "ssh+git", "file"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteUrl {
    /// The input with any password removed.
    pub href: String,
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub owner: String,
    pub organization: Option<String>,
    pub name: String,
    pub full_name: String,
    pub git_suffix: bool,
    web_host: String,
    web_path: String,
}

struct Parts {
    href: String,
    protocol: String,
    user: Option<String>,
    host: String,
    port: Option<u16>,
    path: String,
}

impl RemoteUrl {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(parse_error(input, "remote url is empty"));
        }
        let parts = if trimmed.contains("://") {
            split_scheme_url(trimmed)?
        } else if is_local_path(trimmed) {
            Parts {
                href: trimmed.to_string(),
                protocol: "file".to_string(),
                user: None,
                host: String::new(),
                port: None,
                path: trimmed.replace('\\', "/"),
            }
        } else {
            split_scp_like(trimmed)?
        };
        Self::from_parts(parts)
    }

    /// Canonical `https` browsing location. `None` for local remotes, which
    /// have nothing to browse.
    pub fn web_link(&self) -> Option<String> {
        if self.protocol == "file" {
            return None;
        }
        let port = match (self.protocol.as_str(), self.port) {
            ("https" | "http", Some(port)) => format!(":{port}"),
            _ => String::new(),
        };
        Some(format!("https://{}{}/{}", self.web_host, port, self.web_path))
    }

    fn from_parts(parts: Parts) -> Result<Self> {
        let mut path = parts.path.trim_matches('/').to_string();
        let git_suffix = path.ends_with(".git");
        if git_suffix {
            path.truncate(path.len() - ".git".len());
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, owner_segments)) = segments.split_last() else {
            return Err(parse_error(&parts.href, "remote url has no repository name"));
        };

        let layout = if is_azure_host(&parts.host) {
            azure_layout(&parts.host, &segments)
        } else {
            None
        };
        let (owner, name, organization, web_host, web_path) = match layout {
            Some(layout) => layout,
            None => {
                let owner = owner_segments.join("/");
                let organization = owner_segments.first().map(|s| s.to_string());
                let full_name = segments.join("/");
                (owner, name.to_string(), organization, parts.host.clone(), full_name)
            }
        };
        if name.is_empty() {
            return Err(parse_error(&parts.href, "remote url has no repository name"));
        }
        let full_name = if owner.is_empty() {
            name.clone()
        } else {
            format!("{owner}/{name}")
        };

        Ok(Self {
            href: parts.href,
            protocol: parts.protocol,
            host: parts.host,
            port: parts.port,
            user: parts.user,
            owner,
            organization,
            name,
            full_name,
            git_suffix,
            web_host,
            web_path,
        })
    }
}

fn split_scheme_url(input: &str) -> Result<Parts> {
    let mut url = Url::parse(input).map_err(|err| parse_error(input, &err.to_string()))?;
    let protocol = url.scheme().to_ascii_lowercase();
    if !SCHEMES.contains(&protocol.as_str()) {
        return Err(parse_error(input, &format!("unsupported scheme {protocol}")));
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if host.is_empty() && protocol != "file" {
        return Err(parse_error(input, "remote url has no host"));
    }
    let user = Some(url.username().to_string()).filter(|user| !user.is_empty());
    let port = url.port();
    let path = url.path().to_string();
    if url.password().is_some() {
        // Only fails for cannot-be-a-base urls, which have no credentials.
        let _ = url.set_password(None);
    }
    Ok(Parts {
        href: url.to_string(),
        protocol,
        user,
        host,
        port,
        path,
    })
}

fn split_scp_like(input: &str) -> Result<Parts> {
    let Some((authority, path)) = input.split_once(':') else {
        return Err(parse_error(input, "not a url, scp-style remote, or local path"));
    };
    let (user, host) = match authority.rsplit_once('@') {
        Some((user, host)) => (Some(user.to_string()), host),
        None => (None, authority),
    };
    if host.is_empty() || host.contains('/') {
        return Err(parse_error(input, "scp-style remote has no host"));
    }
    Ok(Parts {
        href: input.to_string(),
        protocol: "ssh".to_string(),
        user: user.filter(|user| !user.is_empty()),
        host: host.to_ascii_lowercase(),
        port: None,
        path: path.to_string(),
    })
}

fn is_local_path(input: &str) -> bool {
    if input.starts_with('/')
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with('~')
    {
        return true;
    }
    let bytes = input.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn is_azure_host(host: &str) -> bool {
    host == "dev.azure.com" || host == "ssh.dev.azure.com" || host.ends_with(".visualstudio.com")
}

type Layout = (String, String, Option<String>, String, String);

/// Azure DevOps keeps `org/project` in front of the repository and browses
/// through a `_git` segment on `dev.azure.com`.
fn azure_layout(host: &str, segments: &[&str]) -> Option<Layout> {
    if host == "ssh.dev.azure.com" {
        let [version, org, project, repo] = segments else {
            return None;
        };
        if *version != "v3" {
            return None;
        }
        return Some((
            format!("{org}/{project}"),
            repo.to_string(),
            Some(org.to_string()),
            "dev.azure.com".to_string(),
            format!("{org}/{project}/_git/{repo}"),
        ));
    }
    let marker = segments.iter().position(|segment| *segment == "_git")?;
    let [repo] = &segments[marker + 1..] else {
        return None;
    };
    let owner = segments[..marker].join("/");
    let organization = if host == "dev.azure.com" {
        segments.first().map(|s| s.to_string())
    } else {
        host.split('.').next().map(str::to_string)
    };
    Some((
        owner,
        repo.to_string(),
        organization,
        host.to_string(),
        segments.join("/"),
    ))
}

fn parse_error(url: &str, reason: &str) -> MirrorError {
    MirrorError::Parse {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
