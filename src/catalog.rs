use crate::naming::{self, catalog_key, file_name, normalize_path, version_number};
use filetime::FileTime;
use std::{
    collections::{BTreeMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogStatus {
    Ready,
    NotReady(NotReady),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReady {
    Unset,
    Missing(PathBuf),
    NotADirectory(PathBuf),
    Unreadable { path: PathBuf, error: String },
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReady::Unset => write!(f, "no scan directory configured"),
            NotReady::Missing(path) => write!(f, "scan directory not found: {}", path.display()),
            NotReady::NotADirectory(path) => {
                write!(f, "scan path is not a directory: {}", path.display())
            }
            NotReady::Unreadable { path, error } => {
                write!(f, "scan directory unreadable: {} ({error})", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: String,
    pub version: String,
    pub version_number: u64,
    pub modified: Option<FileTime>,
}

impl Candidate {
    fn inspect(path: &str) -> Self {
        let name = file_name(path);
        let modified = fs::metadata(path)
            .ok()
            .map(|meta| FileTime::from_last_modification_time(&meta));
        Self {
            path: path.to_string(),
            version: naming::parse(&name).1,
            version_number: version_number(&name),
            modified,
        }
    }

    pub fn modified_unix(&self) -> Option<i64> {
        self.modified.map(|time| time.unix_seconds())
    }
}

// Keyed by strict base (`widget_`), each list in ascending version order.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    status: CatalogStatus,
    entries: BTreeMap<String, Vec<String>>,
    walk_errors: usize,
}

impl Catalog {
    fn not_ready(root: &Path, reason: NotReady) -> Self {
        warn!(reason = %reason, "version catalog not ready");
        Self {
            root: root.to_path_buf(),
            status: CatalogStatus::NotReady(reason),
            entries: BTreeMap::new(),
            walk_errors: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status(&self) -> &CatalogStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, CatalogStatus::Ready)
    }

    pub fn walk_errors(&self) -> usize {
        self.walk_errors
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn base_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(base, paths)| (base.as_str(), paths.as_slice()))
    }

    pub fn candidates(&self, base: &str) -> &[String] {
        self.entries
            .get(base)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn latest(&self, base: &str) -> Option<&str> {
        self.candidates(base).last().map(String::as_str)
    }

    pub fn versions(&self, base: &str) -> Vec<(String, String)> {
        self.candidates(base)
            .iter()
            .map(|path| (naming::version_tag(path), path.clone()))
            .collect()
    }

    pub fn recent_first(&self, base: &str) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self
            .candidates(base)
            .iter()
            .map(|path| Candidate::inspect(path))
            .collect();
        out.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then(b.version_number.cmp(&a.version_number))
        });
        out
    }
}

/// Never fails: an unusable root yields an empty catalog whose status says why.
pub fn build_catalog(root: &Path, loaded_files: &[String]) -> Catalog {
    if root.as_os_str().is_empty() {
        return Catalog::not_ready(root, NotReady::Unset);
    }
    if !root.exists() {
        return Catalog::not_ready(root, NotReady::Missing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Catalog::not_ready(root, NotReady::NotADirectory(root.to_path_buf()));
    }
    if let Err(err) = fs::read_dir(root) {
        return Catalog::not_ready(
            root,
            NotReady::Unreadable {
                path: root.to_path_buf(),
                error: err.to_string(),
            },
        );
    }

    let wanted: HashSet<String> = loaded_files.iter().map(|file| catalog_key(file)).collect();
    let root = absolute(root);
    let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut walk_errors = 0usize;

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                walk_errors += 1;
                warn!(error = %err, "skipping unreadable entry during version scan");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        // Links to directories are neither listed nor descended into.
        if entry.file_type().is_symlink() && entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let (base, _) = naming::parse(&name);
        if !wanted.contains(&base) {
            continue;
        }
        let path = normalize_path(&entry.path().to_string_lossy());
        entries.entry(base).or_default().push(path);
    }

    for paths in entries.values_mut() {
        paths.sort_by_key(|path| version_number(&file_name(path)));
    }

    debug!(
        root = %root.display(),
        assets = entries.len(),
        walk_errors,
        "version catalog built"
    );

    Catalog {
        root,
        status: CatalogStatus::Ready,
        entries,
        walk_errors,
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
