use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use ignore::{Walk, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Always ignored, on top of user and `.gitignore` patterns.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "__pycache__",
    ".DS_Store",
    "egg-info",
    ".env",
    ".git",
    ".ipynb_checkpoints",
    ".pkl",
    ".pyc",
    ".pytest_cache",
    ".vscode",
    "dist",
    "LICENSE",
    "venv",
];

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Case-insensitive substring patterns; those with glob metacharacters also
/// match as globs on the entry name or relative path.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<String>,
    lowered: Vec<String>,
    globs: Vec<Pattern>,
}

impl IgnorePatterns {
    /// Deduplicates (first occurrence wins) and drops blanks and `#` comments.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::default();
        for p in patterns {
            let p = p.as_ref().trim();
            if p.is_empty() || p.starts_with('#') || out.patterns.iter().any(|q| q == p) {
                continue;
            }
            if p.contains(['*', '?', '[']) {
                match Pattern::new(&p.to_lowercase()) {
                    Ok(g) => out.globs.push(g),
                    Err(e) => debug!(pattern = p, error = %e, "not a valid glob, substring match only"),
                }
            }
            out.lowered.push(p.to_lowercase());
            out.patterns.push(p.to_string());
        }
        out
    }

    /// User patterns (comma-separated values are split), then the defaults,
    /// then the input directory's `.gitignore`.
    pub fn for_input(input: &Path, user: &[String]) -> Result<Self> {
        let mut all: Vec<String> = user
            .iter()
            .flat_map(|u| u.split(','))
            .map(str::to_string)
            .collect();
        all.extend(DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()));

        let gitignore = input.join(".gitignore");
        if input.is_dir() && gitignore.is_file() {
            let text = std::fs::read_to_string(&gitignore)
                .with_context(|| format!("Failed to read {}", gitignore.display()))?;
            all.extend(gitignore_lines(&text));
        }
        Ok(Self::new(all))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// `rel` is a path relative to the scanned root.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        let lowered = rel_str.to_lowercase();
        if self.lowered.iter().any(|p| lowered.contains(p.as_str())) {
            return true;
        }
        let name = rel
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.globs
            .iter()
            .any(|g| g.matches_with(&name, GLOB_OPTIONS) || g.matches_with(&lowered, GLOB_OPTIONS))
    }
}

/// `.gitignore` lines usable as substring patterns.
fn gitignore_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .map(|l| l.trim_matches('/').to_string())
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Relative to the scan root; for a single-file scan, the file name.
    pub rel_path: PathBuf,
    pub bytes: u64,
}

impl FileEntry {
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub max_file_bytes: u64,
}

/// Walker over `root` honoring only `ignore`, in name order. Directory
/// entries are yielded too.
pub fn walker(root: &Path, ignore: &IgnorePatterns) -> Walk {
    let base = root.to_path_buf();
    let ignore = ignore.clone();
    WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |dent| {
            let rel = dent.path().strip_prefix(&base).unwrap_or(dent.path());
            rel.as_os_str().is_empty() || !ignore.is_ignored(rel)
        })
        .build()
}

/// Files under `opts.root` that survive the ignore patterns and the size
/// ceiling, in walk order. A file root yields at most itself.
pub fn scan_files(opts: &ScanOptions, ignore: &IgnorePatterns) -> Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(&opts.root)
        .with_context(|| format!("Input does not exist: {}", opts.root.display()))?;

    if meta.is_file() {
        return scan_single_file(&opts.root, meta.len(), opts.max_file_bytes, ignore);
    }

    let mut entries = Vec::new();
    for item in walker(&opts.root, ignore) {
        let dent = match item {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "walk error");
                continue;
            }
        };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let path = dent.into_path();
        let bytes = match std::fs::metadata(&path).map(|m| m.len()) {
            Ok(b) => b,
            Err(_) => continue,
        };
        if bytes > opts.max_file_bytes {
            debug!(path = %path.display(), bytes, "skipping oversized file");
            continue;
        }

        let rel_path = path_relative_to(&path, &opts.root)
            .with_context(|| format!("Failed to relativize path: {}", path.display()))?;
        entries.push(FileEntry {
            path,
            rel_path,
            bytes,
        });
    }
    Ok(entries)
}

fn scan_single_file(path: &Path, bytes: u64, max_file_bytes: u64, ignore: &IgnorePatterns) -> Result<Vec<FileEntry>> {
    let name = PathBuf::from(path.file_name().context("Input file has no name")?);
    if ignore.is_ignored(&name) || bytes > max_file_bytes {
        return Ok(vec![]);
    }
    Ok(vec![FileEntry {
        path: path.to_path_buf(),
        rel_path: name,
        bytes,
    }])
}

fn path_relative_to(path: &Path, base: &Path) -> Result<PathBuf> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is not under {}", path.display(), base.display()))?;
    Ok(rel.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, content).unwrap();
    }

    fn rels(entries: &[FileEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.rel_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn patterns_are_deduped_and_cleaned() {
        let p = IgnorePatterns::new(["venv", "", "  # comment", "venv", "build"]);
        assert_eq!(p.patterns(), &["venv".to_string(), "build".to_string()]);
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let p = IgnorePatterns::new(["license", ".git"]);
        assert!(p.is_ignored(Path::new("LICENSE")));
        assert!(p.is_ignored(Path::new("sub/.gitignore")));
        assert!(!p.is_ignored(Path::new("src/main.py")));
    }

    #[test]
    fn glob_patterns_match_names() {
        let p = IgnorePatterns::new(["*.log", "test_*.py"]);
        assert!(p.is_ignored(Path::new("logs/run.LOG")));
        assert!(p.is_ignored(Path::new("pkg/test_core.py")));
        assert!(!p.is_ignored(Path::new("pkg/core.py")));
    }

    #[test]
    fn for_input_merges_user_defaults_and_gitignore() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".gitignore", "# build output\n/build/\n!keep.txt\n*.log\n\n");

        let p = IgnorePatterns::for_input(tmp.path(), &["secrets,notes".to_string()]).unwrap();
        let pats = p.patterns();
        assert_eq!(&pats[..2], &["secrets".to_string(), "notes".to_string()]);
        for d in DEFAULT_IGNORE_PATTERNS {
            assert!(pats.iter().any(|x| x == d), "missing default {d}");
        }
        assert!(pats.iter().any(|x| x == "build"));
        assert!(pats.iter().any(|x| x == "*.log"));
        assert!(!pats.iter().any(|x| x.contains("keep")));
        assert!(!pats.iter().any(|x| x.starts_with('#')));
    }

    #[test]
    fn scan_skips_ignored_and_oversized() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.py", "def b():\n    pass\n");
        touch(tmp.path(), "a.py", "def a():\n    pass\n");
        touch(tmp.path(), "__pycache__/a.cpython.pyc", "junk");
        touch(tmp.path(), "pkg/mod.py", "x = 1\n");
        touch(tmp.path(), "pkg/huge.txt", &"x".repeat(64));
        touch(tmp.path(), "venv/lib/site.py", "x = 1\n");

        let ignore = IgnorePatterns::for_input(tmp.path(), &[]).unwrap();
        let opts = ScanOptions {
            root: tmp.path().to_path_buf(),
            max_file_bytes: 32,
        };
        let entries = scan_files(&opts, &ignore).unwrap();
        assert_eq!(rels(&entries), vec!["a.py", "b.py", "pkg/mod.py"]);
        assert_eq!(entries[0].extension().as_deref(), Some("py"));
    }

    #[test]
    fn single_file_root() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "solo.py", "def solo():\n    pass\n");
        let opts = ScanOptions {
            root: tmp.path().join("solo.py"),
            max_file_bytes: 1024,
        };
        let entries = scan_files(&opts, &IgnorePatterns::default()).unwrap();
        assert_eq!(rels(&entries), vec!["solo.py"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let opts = ScanOptions {
            root: PathBuf::from("/no/such/dir/anywhere"),
            max_file_bytes: 1024,
        };
        assert!(scan_files(&opts, &IgnorePatterns::default()).is_err());
    }
}
