//! File discovery (C1): walk a project root, apply include/exclude globs,
//! detect language by extension, and compute a content hash used by the
//! orchestrator to decide what needs reparsing. Uses `ignore::WalkBuilder`
//! for the `.gitignore`-aware walk across all seven languages, and a
//! SHA-256 content hash for change detection.

use crate::error::IndexError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use protocol::Language;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub relative_path: String,
    pub language: Language,
    pub size: u64,
    pub content_hash: String,
}

/// A candidate whose extension matched a requested language but that the
/// walk could not stat or read — surfaced to the orchestrator as a
/// `FileStatus::Failed` record instead of being silently dropped.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub relative_path: String,
    pub language: Language,
    pub error: IndexError,
}

#[derive(Debug, Default)]
pub struct DiscoveryResult {
    pub candidates: Vec<FileCandidate>,
    pub failures: Vec<DiscoveryFailure>,
}

pub struct Discovery {
    root: PathBuf,
    languages: Vec<Language>,
    include: Option<GlobSet>,
    exclude: GlobSet,
    max_file_size: u64,
}

const ALWAYS_EXCLUDED: &[&str] = &["**/node_modules/**", "**/vendor/**", "**/.next/**", "**/dist/**", "**/build/**", "**/target/**"];

impl Discovery {
    pub fn new(root: PathBuf, languages: Vec<Language>, max_file_size: u64) -> Self {
        Self::with_globs(root, languages, max_file_size, &[], &[])
    }

    pub fn with_globs(
        root: PathBuf,
        languages: Vec<Language>,
        max_file_size: u64,
        include_globs: &[String],
        exclude_globs: &[String],
    ) -> Self {
        let include = if include_globs.is_empty() {
            None
        } else {
            Some(build_globset(include_globs))
        };
        let mut exclude_patterns: Vec<String> = ALWAYS_EXCLUDED.iter().map(|s| s.to_string()).collect();
        exclude_patterns.extend(exclude_globs.iter().cloned());
        let exclude = build_globset(&exclude_patterns);

        Self {
            root,
            languages,
            include,
            exclude,
            max_file_size,
        }
    }

    fn extension_table(&self) -> Vec<(&'static str, Language)> {
        self.languages
            .iter()
            .flat_map(|lang| lang.default_extensions().iter().map(move |ext| (*ext, *lang)))
            .collect()
    }

    /// Recursive walk honoring `.gitignore`; deduplicates symlink targets via
    /// a canonical-path set so cyclic symlinks can't loop the walk forever.
    pub fn discover(&self) -> DiscoveryResult {
        let extensions = self.extension_table();
        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        let mut visited_canonical = HashSet::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(true)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "walk entry failed");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if let Ok(canonical) = path.canonicalize() {
                if !visited_canonical.insert(canonical) {
                    continue;
                }
            }

            let relative_path = match path.strip_prefix(&self.root) {
                Ok(p) => p.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if self.exclude.is_match(&relative_path) {
                continue;
            }
            if let Some(include) = &self.include {
                if !include.is_match(&relative_path) {
                    continue;
                }
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Some((_, language)) = extensions.iter().find(|(e, _)| *e == ext) else {
                continue;
            };

            let metadata = match std::fs::metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot stat file");
                    failures.push(DiscoveryFailure {
                        relative_path,
                        language: *language,
                        error: IndexError::FileIo { path: path.display().to_string(), message: e.to_string() },
                    });
                    continue;
                }
            };
            let size = metadata.len();
            if size > self.max_file_size {
                debug!(path = %path.display(), size, "skipping oversized file");
                continue;
            }

            let bytes = match std::fs::read(path) {
                Ok(b) => b,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot read file");
                    failures.push(DiscoveryFailure {
                        relative_path,
                        language: *language,
                        error: IndexError::FileIo { path: path.display().to_string(), message: e.to_string() },
                    });
                    continue;
                }
            };
            let content_hash = hash_bytes(&bytes);

            candidates.push(FileCandidate {
                path: path.to_path_buf(),
                relative_path,
                language: *language,
                size,
                content_hash,
            });
        }

        debug!(count = candidates.len(), failed = failures.len(), "discovery found candidate files");
        DiscoveryResult { candidates, failures }
    }
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern, error = %e, "invalid glob pattern, ignoring"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Splits discovered candidates against known `FileRecord` hashes into
/// (to_parse, to_skip, to_delete), per C1's `filter_changed` operation.
/// `known` is `(relative_path, content_hash)` pairs already on record.
pub struct ChangeSet<'a> {
    pub to_parse: Vec<&'a FileCandidate>,
    pub to_skip: Vec<&'a FileCandidate>,
    pub to_delete: Vec<String>,
}

pub fn filter_changed<'a>(candidates: &'a [FileCandidate], known: &[(String, String)]) -> ChangeSet<'a> {
    use std::collections::HashMap;
    let known_map: HashMap<&str, &str> = known.iter().map(|(p, h)| (p.as_str(), h.as_str())).collect();
    let mut to_parse = Vec::new();
    let mut to_skip = Vec::new();

    for candidate in candidates {
        match known_map.get(candidate.relative_path.as_str()) {
            Some(hash) if *hash == candidate.content_hash => to_skip.push(candidate),
            _ => to_parse.push(candidate),
        }
    }

    let seen: HashSet<&str> = candidates.iter().map(|c| c.relative_path.as_str()).collect();
    let to_delete = known
        .iter()
        .filter(|(path, _)| !seen.contains(path.as_str()))
        .map(|(path, _)| path.clone())
        .collect();

    ChangeSet { to_parse, to_skip, to_delete }
}

pub fn relative_path_str(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn discovers_files_for_requested_languages_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("app.py"), "def main(): pass").unwrap();
        fs::write(dir.path().join("readme.md"), "# hi").unwrap();

        let discovery = Discovery::new(dir.path().to_path_buf(), vec![Language::Rust], 1024 * 1024);
        let found = discovery.discover();
        assert_eq!(found.candidates.len(), 1);
        assert_eq!(found.candidates[0].relative_path, "main.rs");
        assert!(found.failures.is_empty());
    }

    #[test]
    fn vendor_directories_are_always_excluded() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        fs::write(dir.path().join("node_modules/lib/index.js"), "// dep").unwrap();
        fs::write(dir.path().join("main.js"), "console.log(1)").unwrap();

        let discovery = Discovery::new(dir.path().to_path_buf(), vec![Language::JavaScript], 1024 * 1024);
        let found = discovery.discover();
        assert_eq!(found.candidates.len(), 1);
        assert_eq!(found.candidates[0].relative_path, "main.js");
    }

    #[test]
    fn oversized_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.rs"), "x".repeat(100)).unwrap();

        let discovery = Discovery::new(dir.path().to_path_buf(), vec![Language::Rust], 10);
        let found = discovery.discover();
        assert!(found.candidates.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_reported_as_a_failure_not_dropped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.rs");
        fs::write(&path, "fn locked() {}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores Unix read permissions, which would make this
        // assertion meaningless when the test suite itself runs as root.
        if fs::read(&path).is_ok() {
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
            return;
        }

        let discovery = Discovery::new(dir.path().to_path_buf(), vec![Language::Rust], 1024 * 1024);
        let found = discovery.discover();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(found.candidates.is_empty());
        assert_eq!(found.failures.len(), 1);
        assert_eq!(found.failures[0].relative_path, "locked.rs");
    }

    #[test]
    fn filter_changed_splits_by_hash_comparison() {
        let candidates = vec![
            FileCandidate { path: "a.rs".into(), relative_path: "a.rs".into(), language: Language::Rust, size: 1, content_hash: "h1".into() },
            FileCandidate { path: "b.rs".into(), relative_path: "b.rs".into(), language: Language::Rust, size: 1, content_hash: "h2-new".into() },
        ];
        let known = vec![
            ("a.rs".to_string(), "h1".to_string()),
            ("b.rs".to_string(), "h2-old".to_string()),
            ("c.rs".to_string(), "h3".to_string()),
        ];
        let changes = filter_changed(&candidates, &known);
        assert_eq!(changes.to_skip.len(), 1);
        assert_eq!(changes.to_parse.len(), 1);
        assert_eq!(changes.to_delete, vec!["c.rs".to_string()]);
    }
}
