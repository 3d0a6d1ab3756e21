// SPDX-License-Identifier: MIT
//! Entry selection
//!
//! Walks a root directory and decides which files end up in the image and in
//! which order. Symlinks to regular files are followed; symlinks to directories
//! and special files are skipped. A dangling symlink is kept so that reading it
//! fails loudly instead of silently dropping the entry.

use std::fs;
use std::io::BufRead;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{PackError, PackResult};

/// Which files under the root are packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// Files ending in `.<ext>`, one group after another in priority order
    Extensions(Vec<Vec<String>>),
    /// Every regular file
    All,
    /// Exactly these root-relative names, in this order
    Listed(Vec<String>),
}

impl SelectionMode {
    /// html, then css, then js, then images
    pub fn web_assets() -> Self {
        SelectionMode::Extensions(default_extension_groups())
    }
}

/// Order of entries within the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrder {
    /// Sort by relative path bytes (within each extension group)
    #[default]
    Sorted,
    /// Whatever order the host filesystem returns
    WalkOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    pub mode: SelectionMode,
    pub order: EntryOrder,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::web_assets(),
            order: EntryOrder::Sorted,
        }
    }
}

pub fn default_extension_groups() -> Vec<Vec<String>> {
    [&["html"][..], &["css"], &["js"], &["ico", "png"]]
        .iter()
        .map(|group| group.iter().map(|ext| ext.to_string()).collect())
        .collect()
}

/// Select the files under `root` to pack, in image order
pub fn select(root: &Path, config: &SelectionConfig) -> PackResult<Vec<PathBuf>> {
    ensure_directory(root)?;

    let selected = match &config.mode {
        SelectionMode::All => {
            let mut files = walk_files(root)?;
            if config.order == EntryOrder::Sorted {
                sort_by_relative_path(root, &mut files);
            }
            files
        }
        SelectionMode::Extensions(groups) => {
            let files = walk_files(root)?;
            let mut selected = Vec::new();
            for group in groups {
                let mut matching: Vec<PathBuf> = files
                    .iter()
                    .filter(|path| has_extension_in(path, group))
                    .cloned()
                    .collect();
                if config.order == EntryOrder::Sorted {
                    sort_by_relative_path(root, &mut matching);
                }
                debug!(group = ?group, count = matching.len(), "extension group selected");
                selected.extend(matching);
            }
            selected
        }
        SelectionMode::Listed(names) => select_listed(root, names),
    };

    debug!(root = %root.display(), count = selected.len(), "selection complete");
    Ok(selected)
}

/// Root-relative, forward-slash path of `path`
pub fn relative_path(root: &Path, path: &Path) -> PackResult<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| PackError::NonEncodablePath(path.to_string_lossy().into_owned()))?;

    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| PackError::NonEncodablePath(rel.to_string_lossy().into_owned()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

/// Parse a newline-separated file list, skipping blank lines
pub fn read_file_list<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim_end_matches('\r');
        if !name.trim().is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn ensure_directory(root: &Path) -> PackResult<()> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(PackError::InvalidRoot(root.to_path_buf())),
    }
}

fn walk_files(root: &Path) -> PackResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ent in WalkDir::new(root).follow_links(false).min_depth(1) {
        let ent = ent.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let msg = e.to_string();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            PackError::UnreadableFile { path, source }
        })?;

        if is_packable(&ent) {
            files.push(ent.into_path());
        }
    }
    Ok(files)
}

fn is_packable(ent: &DirEntry) -> bool {
    let file_type = ent.file_type();
    if file_type.is_file() {
        return true;
    }
    if !file_type.is_symlink() {
        return false;
    }
    match fs::metadata(ent.path()) {
        Ok(target) => target.is_file(),
        Err(_) => true,
    }
}

fn has_extension_in(path: &Path, group: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    group.iter().any(|ext| {
        name.len() > ext.len()
            && name.ends_with(ext.as_str())
            && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
    })
}

fn sort_by_relative_path(root: &Path, files: &mut [PathBuf]) {
    files.sort_by_cached_key(|path| {
        path.strip_prefix(root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    });
}

fn select_listed(root: &Path, names: &[String]) -> Vec<PathBuf> {
    let mut selected = Vec::new();
    for name in names {
        let trimmed = name.strip_prefix("./").unwrap_or(name).trim_start_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if Path::new(trimmed)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            warn!("{}: leaves the root directory, skipping", name);
            continue;
        }
        let path = root.join(trimmed);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => selected.push(path),
            Ok(_) => debug!(path = %path.display(), "listed path is not a regular file, skipping"),
            Err(e) => warn!("{}: {}", path.display(), e),
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, rel.as_bytes()).unwrap();
    }

    fn rels(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| relative_path(root, f).unwrap())
            .collect()
    }

    fn web_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for rel in [
            "z.js",
            "index.html",
            "style.css",
            "img/logo.png",
            "favicon.ico",
            "wifi/wifi.html",
            "README.md",
            "a.js",
        ] {
            touch(dir.path(), rel);
        }
        dir
    }

    #[test]
    fn test_extension_groups_in_priority_order() {
        let dir = web_tree();
        let files = select(dir.path(), &SelectionConfig::default()).unwrap();

        assert_eq!(
            rels(dir.path(), &files),
            vec![
                "index.html",
                "wifi/wifi.html",
                "style.css",
                "a.js",
                "z.js",
                "favicon.ico",
                "img/logo.png",
            ]
        );
    }

    #[test]
    fn test_catch_all_takes_every_file() {
        let dir = web_tree();
        let config = SelectionConfig {
            mode: SelectionMode::All,
            order: EntryOrder::Sorted,
        };
        let files = select(dir.path(), &config).unwrap();

        let names = rels(dir.path(), &files);
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"README.md".to_string()));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_walk_order_keeps_same_set() {
        let dir = web_tree();
        let config = SelectionConfig {
            mode: SelectionMode::All,
            order: EntryOrder::WalkOrder,
        };
        let mut names = rels(dir.path(), &select(dir.path(), &config).unwrap());
        names.sort();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = select(&missing, &SelectionConfig::default()).unwrap_err();
        assert!(matches!(err, PackError::InvalidRoot(_)));
    }

    #[test]
    fn test_file_root_is_invalid() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "file.html");
        let err = select(&dir.path().join("file.html"), &SelectionConfig::default()).unwrap_err();
        assert!(matches!(err, PackError::InvalidRoot(_)));
    }

    #[test]
    fn test_extension_match_is_suffix_after_dot() {
        let group = vec!["js".to_string()];
        assert!(has_extension_in(Path::new("app.js"), &group));
        assert!(!has_extension_in(Path::new("app.json"), &group));
        assert!(!has_extension_in(Path::new("appjs"), &group));
        assert!(!has_extension_in(Path::new("js"), &group));
    }

    #[test]
    fn test_directories_named_like_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("weird.html")).unwrap();
        touch(dir.path(), "weird.html/inner.html");

        let files = select(dir.path(), &SelectionConfig::default()).unwrap();
        assert_eq!(rels(dir.path(), &files), vec!["weird.html/inner.html"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "shared.html");
        touch(outside.path(), "sub/deep.html");

        symlink(outside.path().join("shared.html"), dir.path().join("link.html")).unwrap();
        symlink(outside.path().join("sub"), dir.path().join("linkdir")).unwrap();
        symlink(dir.path().join("gone.html"), dir.path().join("dangling.html")).unwrap();

        let files = select(dir.path(), &SelectionConfig::default()).unwrap();
        assert_eq!(
            rels(dir.path(), &files),
            vec!["dangling.html", "link.html"]
        );
    }

    #[test]
    fn test_listed_mode_keeps_list_order() {
        let dir = web_tree();
        let config = SelectionConfig {
            mode: SelectionMode::Listed(vec![
                "./z.js".into(),
                "/index.html".into(),
                "img".into(),
                "missing.css".into(),
            ]),
            order: EntryOrder::Sorted,
        };
        let files = select(dir.path(), &config).unwrap();
        assert_eq!(rels(dir.path(), &files), vec!["z.js", "index.html"]);
    }

    #[test]
    fn test_listed_names_cannot_leave_root() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "secret.html");
        touch(dir.path(), "www/index.html");
        let root = dir.path().join("www");

        let config = SelectionConfig {
            mode: SelectionMode::Listed(vec![
                "../secret.html".into(),
                "./../secret.html".into(),
                "sub/../index.html".into(),
                "index.html".into(),
            ]),
            order: EntryOrder::Sorted,
        };
        let files = select(&root, &config).unwrap();
        assert_eq!(rels(&root, &files), vec!["index.html"]);
    }

    #[test]
    fn test_read_file_list() {
        let input = "a.html\r\n\n./b.css\n  \n";
        let names = read_file_list(input.as_bytes()).unwrap();
        assert_eq!(names, vec!["a.html", "./b.css"]);
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("/srv/www");
        let rel = relative_path(root, &root.join("wifi").join("wifi.html")).unwrap();
        assert_eq!(rel, "wifi/wifi.html");
    }
}
