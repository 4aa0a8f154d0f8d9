use anyhow::Result;
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::compress::{Compressor, PromptStyle};
use crate::config::SummaryConfig;
use crate::python::symbol_summaries;
use crate::scanner::FileEntry;
use crate::tokens::{truncate_to_tokens, TokenCounter};

/// Lines kept from each end of a CSV file in all-code mode.
const CSV_EDGE_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Signatures of a Python file's top-level functions, classes and methods.
    Symbols(Vec<String>),
    /// Full text, or a model-written summary.
    Text(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub path: String,
    pub content: FileContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Per-file rules, see [`FileSummarizer::summarize_file`].
    Summarize,
    /// Every file's full text.
    All,
    /// Full text of files matching the print-only patterns, nothing else.
    PrintOnly,
}

/// `--print-full` / `--print-only` patterns, matched as `*pattern*` globs
/// against a file's name or its path.
#[derive(Debug, Clone, Default)]
pub struct PathPatterns {
    raw: Vec<String>,
    globs: Vec<Pattern>,
}

impl PathPatterns {
    /// Comma-separated values are split.
    pub fn new(patterns: &[String]) -> Self {
        let raw: Vec<String> = patterns
            .iter()
            .flat_map(|p| p.split(','))
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let globs = raw
            .iter()
            .filter_map(|p| Pattern::new(&format!("*{p}*")).ok())
            .collect();
        Self { raw, globs }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn matches(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        self.globs.iter().any(|g| g.matches(&name) || g.matches(&full))
            || self.raw.iter().any(|p| full.contains(p.as_str()))
    }
}

fn read_text(path: &Path) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable file");
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(s) => Some(s),
        Err(_) => {
            debug!(path = %path.display(), "not UTF-8, skipping");
            None
        }
    }
}

/// First and last lines of a CSV file around a `...` marker.
fn csv_excerpt(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= CSV_EDGE_LINES * 2 {
        return text.to_string();
    }
    format!(
        "{}\n...\n{}",
        lines[..CSV_EDGE_LINES].join("\n"),
        lines[lines.len() - CSV_EDGE_LINES..].join("\n")
    )
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Produces one [`FileSummary`] per scanned file.
pub struct FileSummarizer<'a, C: ?Sized, P: ?Sized> {
    counter: &'a C,
    compressor: &'a mut P,
    cfg: SummaryConfig,
    print_full: PathPatterns,
    print_only: PathPatterns,
}

impl<'a, C: TokenCounter + ?Sized, P: Compressor + ?Sized> FileSummarizer<'a, C, P> {
    pub fn new(counter: &'a C, compressor: &'a mut P, cfg: &SummaryConfig) -> Self {
        Self {
            counter,
            compressor,
            cfg: cfg.clone(),
            print_full: PathPatterns::default(),
            print_only: PathPatterns::default(),
        }
    }

    pub fn with_print_full(mut self, patterns: PathPatterns) -> Self {
        self.print_full = patterns;
        self
    }

    pub fn with_print_only(mut self, patterns: PathPatterns) -> Self {
        self.print_only = patterns;
        self
    }

    pub fn summarize(&mut self, entries: &[FileEntry], mode: SummaryMode) -> Result<Vec<FileSummary>> {
        let pb = spinner();
        let mut out = Vec::with_capacity(entries.len());

        for entry in entries {
            pb.set_message(format!("summarizing {}", entry.rel_path.display()));
            let content = match mode {
                SummaryMode::Summarize => Some(self.summarize_file(entry)?),
                SummaryMode::All => self.full_text(entry),
                SummaryMode::PrintOnly if self.print_only.matches(&entry.path) => {
                    read_text(&entry.path).map(FileContent::Text)
                }
                SummaryMode::PrintOnly => None,
            };
            if let Some(content) = content {
                out.push(FileSummary {
                    path: entry.path.to_string_lossy().to_string(),
                    content,
                });
            }
        }

        pb.finish_and_clear();
        info!(summarized = out.len(), scanned = entries.len(), ?mode, "file summaries ready");
        Ok(out)
    }

    /// Undecodable files are left out entirely in all-code mode.
    fn full_text(&self, entry: &FileEntry) -> Option<FileContent> {
        let text = read_text(&entry.path)?;
        if entry.extension().as_deref() == Some("csv") {
            return Some(FileContent::Text(csv_excerpt(&text)));
        }
        Some(FileContent::Text(text))
    }

    /// - print-full match: the full text;
    /// - `.py`: symbol signatures, or a model summary when there are none;
    /// - under the size floor, or `.txt`: empty;
    /// - anything else: a model summary of the leading text.
    ///
    /// Files that are not valid UTF-8 are empty.
    pub fn summarize_file(&mut self, entry: &FileEntry) -> Result<FileContent> {
        let Some(text) = read_text(&entry.path) else {
            return Ok(FileContent::Empty);
        };

        if self.print_full.matches(&entry.path) {
            debug!(path = %entry.path.display(), "printing full file");
            return Ok(FileContent::Text(text));
        }

        let ext = entry.extension();
        if ext.as_deref() == Some("py") {
            if let Some(symbols) = symbol_summaries(&text)?.filter(|s| !s.is_empty()) {
                return Ok(FileContent::Symbols(symbols));
            }
            return self.model_summary(&text);
        }

        if entry.bytes < self.cfg.min_file_bytes || ext.as_deref() == Some("txt") {
            return Ok(FileContent::Empty);
        }
        self.model_summary(&text)
    }

    fn model_summary(&mut self, text: &str) -> Result<FileContent> {
        if text.trim().is_empty() {
            return Ok(FileContent::Empty);
        }
        let head = truncate_to_tokens(self.counter, text, self.cfg.input_tokens);
        let summary = self
            .compressor
            .compress(&head, self.cfg.summary_tokens, PromptStyle::File)?;
        Ok(FileContent::Text(summary))
    }
}

/// Renders each summary as a `File: <path>` entry; entries joined by `\n`.
pub fn format_file_summaries(summaries: &[FileSummary]) -> String {
    summaries
        .iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_entry(summary: &FileSummary) -> String {
    let header = format!("File: {}", summary.path);
    match &summary.content {
        FileContent::Empty => format!("{header}\n"),
        FileContent::Symbols(symbols) if symbols.is_empty() => format!("{header}\n"),
        FileContent::Symbols(symbols) => format!("{header}\n```\n{}\n```\n", symbols.join("\n")),
        FileContent::Text(text) if text.contains('\n') => format!("{header}\n```\n{text}\n```\n"),
        FileContent::Text(text) => format!("{header}\n{text}\n"),
    }
}
