//! Local upstream repositories for engine tests.

use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use std::path::Path;

pub(crate) fn init_upstream(path: &Path, default_branch: &str) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head(default_branch);
    Repository::init_opts(path, &opts).unwrap()
}

pub(crate) fn url(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

/// Commits `name` with `contents` on top of `branch` (creating the branch
/// when it does not exist yet).
pub(crate) fn commit_file(repo: &Repository, branch: &str, name: &str, contents: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    let file_path = workdir.join(name);
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&file_path, contents).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("tester", "tester@example.com").unwrap();
    let refname = format!("refs/heads/{branch}");
    let parent = repo
        .refname_to_id(&refname)
        .ok()
        .map(|oid| repo.find_commit(oid).unwrap());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some(&refname), &sig, &sig, "commit", &tree, &parents)
        .unwrap()
}
