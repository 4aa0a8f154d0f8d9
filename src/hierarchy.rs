use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use crate::scanner::{walker, IgnorePatterns};

const INDENT: &str = "    ";

/// Indented directory tree of `root`, one entry per line.
///
/// ```text
/// project/
///     pkg/
///         core.py
///     main.py
/// ```
pub fn format_hierarchy(root: &Path, ignore: &IgnorePatterns) -> Result<String> {
    let meta = std::fs::metadata(root).with_context(|| format!("Input does not exist: {}", root.display()))?;
    if meta.is_file() {
        return Ok(display_name(root));
    }

    let mut lines = vec![format!("{}/", display_name(root))];
    for item in walker(root, ignore) {
        let dent = match item {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "walk error");
                continue;
            }
        };
        if dent.depth() == 0 {
            continue;
        }
        let name = dent.file_name().to_string_lossy();
        let is_dir = dent.file_type().is_some_and(|ft| ft.is_dir());
        lines.push(format!(
            "{}{}{}",
            INDENT.repeat(dent.depth()),
            name,
            if is_dir { "/" } else { "" }
        ));
    }
    Ok(lines.join("\n"))
}

/// The path's own name; `.` and similar resolve through the filesystem.
fn display_name(path: &Path) -> String {
    if let Some(name) = path.file_name() {
        return name.to_string_lossy().to_string();
    }
    path.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| ".".to_string())
}
