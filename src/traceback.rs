use anyhow::Result;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use crate::python::{flattened_definitions, module_outline, FunctionInfo};

/// Radius used when the caller does not pick one.
pub const DEFAULT_CONTEXT_RADIUS: usize = 3;

/// The function enclosing a traceback line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionContext {
    pub info: FunctionInfo,
    /// One-line call summary, `name(arg1, arg2)`.
    pub summary: String,
    pub body: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracebackFrame {
    pub file_path: String,
    pub line_number: usize,
    /// Name from the `in <name>` part of the header, if present.
    pub frame_name: Option<String>,
    pub function_context: Option<FunctionContext>,
    pub line_context: Vec<(usize, String)>,
}

/// Finds the function enclosing a line of source. One implementation per
/// source language.
pub trait SourceResolver {
    fn handles(&self, path: &Path) -> bool;
    fn enclosing_function(&self, source: &str, line_number: usize) -> Result<Option<FunctionContext>>;
}

pub struct PythonResolver;

impl SourceResolver for PythonResolver {
    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("py"))
    }

    fn enclosing_function(&self, source: &str, line_number: usize) -> Result<Option<FunctionContext>> {
        let Some(items) = module_outline(source)? else {
            return Ok(None);
        };
        let Some(def) = flattened_definitions(&items)
            .into_iter()
            .find(|d| d.contains(line_number))
        else {
            return Ok(None);
        };

        let body = source
            .lines()
            .skip(def.start_line - 1)
            .take(def.end_line + 1 - def.start_line)
            .map(str::to_string)
            .collect();

        Ok(Some(FunctionContext {
            summary: def.info.to_string(),
            info: def.info.clone(),
            body,
        }))
    }
}

fn frame_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*File "([^"]+)", line (\d+)(?:, in (\w+))?.*$"#).expect("frame header regex")
    })
}

/// `(file_path, line_number, frame_name)` for every frame header in `tb`.
/// Lines that are not frame headers are skipped.
pub fn frame_headers(tb: &str) -> Vec<(String, usize, Option<String>)> {
    tb.lines()
        .filter_map(|line| {
            let caps = frame_regex().captures(line)?;
            let line_number = caps[2].parse().ok()?;
            Some((
                caps[1].to_string(),
                line_number,
                caps.get(3).map(|m| m.as_str().to_string()),
            ))
        })
        .collect()
}

/// Source lines within `radius` of `line_number` (1-based), clipped to the
/// file, each paired with its line number and right-trimmed.
pub fn line_window(source: &str, line_number: usize, radius: usize) -> Vec<(usize, String)> {
    let lines: Vec<&str> = source.lines().collect();
    if line_number == 0 || lines.is_empty() {
        return vec![];
    }
    let start = line_number.saturating_sub(radius).max(1);
    let end = (line_number + radius).min(lines.len());
    (start..=end)
        .map(|n| (n, lines[n - 1].trim_end().to_string()))
        .collect()
}

/// Resolves traceback frames against the source files they name.
pub struct TracebackResolver {
    resolvers: Vec<Box<dyn SourceResolver>>,
    radius: usize,
}

impl Default for TracebackResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_RADIUS)
    }
}

impl TracebackResolver {
    pub fn new(radius: usize) -> Self {
        Self {
            resolvers: vec![Box::new(PythonResolver)],
            radius,
        }
    }

    pub fn with_resolver(mut self, resolver: Box<dyn SourceResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Parse `tb` and resolve every frame. Unreadable files and unsupported
    /// languages give frames without function or line context.
    pub fn parse(&self, tb: &str) -> Vec<TracebackFrame> {
        frame_headers(tb)
            .into_iter()
            .map(|(file_path, line_number, frame_name)| {
                self.resolve_frame(file_path, line_number, frame_name)
            })
            .collect()
    }

    fn resolve_frame(&self, file_path: String, line_number: usize, frame_name: Option<String>) -> TracebackFrame {
        let mut frame = TracebackFrame {
            file_path,
            line_number,
            frame_name,
            function_context: None,
            line_context: vec![],
        };

        let path = Path::new(&frame.file_path);
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %frame.file_path, error = %e, "traceback source unreadable");
                return frame;
            }
        };

        frame.line_context = line_window(&source, line_number, self.radius);
        if let Some(resolver) = self.resolvers.iter().find(|r| r.handles(path)) {
            match resolver.enclosing_function(&source, line_number) {
                Ok(ctx) => frame.function_context = ctx,
                Err(e) => debug!(path = %frame.file_path, error = %format!("{e:#}"), "function lookup failed"),
            }
        }
        frame
    }
}

/// Render frames as text blocks separated by blank lines.
pub fn format_frames(frames: &[TracebackFrame]) -> String {
    frames
        .iter()
        .map(|frame| {
            let mut lines = vec![
                format!("File: {}", frame.file_path),
                format!("Line: {}", frame.line_number),
            ];
            if let Some(ctx) = frame.function_context.as_ref() {
                lines.push(format!("Function: {}", ctx.info.name));
                lines.push(format!("Summary: {}", ctx.summary));
                lines.extend(ctx.body.iter().cloned());
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
