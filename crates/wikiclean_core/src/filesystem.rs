use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use walkdir::WalkDir;

use crate::site::{NS_MAIN, SiteConfig};

const WIKI_EXTENSIONS: &[&str] = &["wiki", "wikitext"];
const MAIN_FOLDER: &str = "Main";
const REDIRECTS_FOLDER: &str = "_redirects";

#[derive(Debug, Clone, Serialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub title: String,
    pub namespace: i32,
    pub is_redirect: bool,
    pub redirect_target: Option<String>,
    pub bytes: u64,
}

impl ScannedFile {
    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub redirects: usize,
    pub by_namespace: BTreeMap<i32, usize>,
}

/// Every `.wiki`/`.wikitext` file under `root`, sorted by relative path.
///
/// The first directory level names the namespace (`Main` for articles);
/// files directly under `root` are articles too. Deeper directories only
/// group files, the title comes from the file name.
pub fn scan_wiki_files(root: &Path, site: &SiteConfig) -> Result<Vec<ScannedFile>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_wiki = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| WIKI_EXTENSIONS.contains(&ext));
        if !is_wiki {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("{} escapes {}", path.display(), root.display()))?;
        let relative = normalize_separators(&relative.to_string_lossy());
        files.push(read_scanned_file(path, &relative, site)?);
    }

    files.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));
    Ok(files)
}

pub fn scan_stats(files: &[ScannedFile]) -> ScanStats {
    let mut by_namespace: BTreeMap<i32, usize> = BTreeMap::new();
    for file in files {
        *by_namespace.entry(file.namespace).or_insert(0) += 1;
    }
    ScanStats {
        total_files: files.len(),
        redirects: files.iter().filter(|file| file.is_redirect).count(),
        by_namespace,
    }
}

fn read_scanned_file(path: &Path, relative: &str, site: &SiteConfig) -> Result<ScannedFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let (is_redirect, redirect_target) = parse_redirect(&content);
    let title = site.canonical_title(&relative_path_to_title(relative));

    Ok(ScannedFile {
        path: path.to_path_buf(),
        relative_path: relative.to_string(),
        namespace: site.namespace_of(&title),
        title,
        is_redirect,
        redirect_target,
        bytes: metadata.len(),
    })
}

/// `Category/Big_cities.wiki` -> `Category:Big cities`.
pub fn relative_path_to_title(relative_path: &str) -> String {
    let normalized = normalize_separators(relative_path);
    let mut segments: Vec<&str> = normalized
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != REDIRECTS_FOLDER)
        .collect();
    let Some(filename) = segments.pop() else {
        return String::new();
    };
    let name = decode_segment(strip_wiki_extension(filename));
    match segments.first().copied() {
        None | Some(MAIN_FOLDER) => name,
        Some(folder) => format!("{}:{name}", decode_segment(folder)),
    }
}

fn parse_redirect(content: &str) -> (bool, Option<String>) {
    let trimmed = content.trim_start();
    if !trimmed.to_ascii_uppercase().starts_with("#REDIRECT") {
        return (false, None);
    }
    if let Some(start) = trimmed.find("[[")
        && let Some(end) = trimmed[start + 2..].find("]]")
    {
        let target = trimmed[start + 2..start + 2 + end].trim().to_string();
        if !target.is_empty() {
            return (true, Some(target));
        }
    }
    (true, None)
}

fn decode_segment(value: &str) -> String {
    value
        .replace("___", "/")
        .replace("--", ":")
        .replace('_', " ")
}

fn strip_wiki_extension(value: &str) -> &str {
    for ext in WIKI_EXTENSIONS {
        if let Some(stripped) = value
            .strip_suffix(ext)
            .and_then(|rest| rest.strip_suffix('.'))
        {
            return stripped;
        }
    }
    value
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Articles and other main-namespace pages only.
pub fn main_namespace(files: &[ScannedFile]) -> impl Iterator<Item = &ScannedFile> {
    files.iter().filter(|file| file.namespace == NS_MAIN)
}
