//! Directory helpers for the staging area.

use std::path::Path;

use tokio::fs;
use towerlog::error::LoadResult;
use tracing::{debug, info};

/// Returns the sorted names of the files in `dir` whose extension is `extension`.
pub async fn list_files(dir: &Path, extension: &str) -> LoadResult<Vec<String>> {
    let mut names = Vec::new();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == extension) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    names.sort();

    Ok(names)
}

/// Creates `dir` when missing and deletes every file directly inside it.
pub async fn clear_dir(dir: &Path) -> LoadResult<()> {
    if fs::try_exists(dir).await? {
        let mut removed = 0usize;
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        debug!(directory = %dir.display(), removed, "cleared directory");
    } else {
        info!(directory = %dir.display(), "creating directory");
        fs::create_dir_all(dir).await?;
    }

    Ok(())
}

/// Copies the named files from `from` into `to`.
pub async fn copy_files(from: &Path, to: &Path, names: &[String]) -> LoadResult<()> {
    for name in names {
        fs::copy(from.join(name), to.join(name)).await?;
        debug!(file = %name, directory = %to.display(), "copied file");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.rld", "a.rld", "notes.txt", "c.RLD"] {
            fs::write(dir.path().join(name), b"").await.unwrap();
        }
        fs::create_dir(dir.path().join("nested.rld")).await.unwrap();

        let names = list_files(dir.path(), "rld").await.unwrap();

        assert_eq!(names, vec!["a.rld", "b.rld"]);
    }

    #[tokio::test]
    async fn clear_dir_creates_or_empties() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("RLD_INPUT");

        clear_dir(&staging).await.unwrap();
        assert!(fs::try_exists(&staging).await.unwrap());

        fs::write(staging.join("old.rld"), b"x").await.unwrap();
        clear_dir(&staging).await.unwrap();
        assert!(list_files(&staging, "rld").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn copies_named_files() {
        let raw = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        fs::write(raw.path().join("a.rld"), b"payload").await.unwrap();
        fs::write(raw.path().join("b.rld"), b"skip").await.unwrap();

        copy_files(raw.path(), staging.path(), &["a.rld".to_owned()])
            .await
            .unwrap();

        assert_eq!(list_files(staging.path(), "rld").await.unwrap(), vec!["a.rld"]);
        assert_eq!(fs::read(staging.path().join("a.rld")).await.unwrap(), b"payload");
    }
}
