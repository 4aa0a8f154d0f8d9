use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::allocator::{
    format_sizes, AllocationPath, AllocatorOptions, BlockKind, BlockSet, BudgetAllocator, BudgetError,
};
use crate::cache::CompletionCache;
use crate::compress::{Compressor, LlmCompressor};
use crate::config::Config;
use crate::document::Document;
use crate::hierarchy::format_hierarchy;
use crate::scanner::{scan_files, IgnorePatterns, ScanOptions};
use crate::summary::{format_file_summaries, FileSummarizer, PathPatterns, SummaryMode};
use crate::tokens::{CharRatioEstimator, TokenCounter};
use crate::traceback::{format_frames, TracebackResolver};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// Full text of every file, no budget enforcement.
    pub all: bool,
    pub ignore: Vec<String>,
    pub max_tokens_out: usize,
    pub print_full: Vec<String>,
    pub print_only: Vec<String>,
    pub traceback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub document: String,
    pub tokens: usize,
    pub files: usize,
    /// `None` in all-code mode, where allocation is skipped.
    pub path: Option<AllocationPath>,
    pub compression_calls: usize,
    pub remote_calls: usize,
}

/// What the run was working with when it gave up.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub input: PathBuf,
    pub ignore: Vec<String>,
    pub print_full: Vec<String>,
    pub block_sizes: Vec<(BlockKind, usize)>,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input path: {}", self.input.display())?;
        writeln!(f, "Ignore patterns: {:?}", self.ignore)?;
        writeln!(f, "Print full patterns: {:?}", self.print_full)?;
        write!(f, "Block sizes: {}", format_sizes(&self.block_sizes))
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no summary generated, check the input path and ignore patterns")]
    EmptySummary(Diagnostics),

    #[error("{source}")]
    Budget {
        #[source]
        source: BudgetError,
        diagnostics: Diagnostics,
    },
}

impl RunError {
    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            RunError::EmptySummary(d) => d,
            RunError::Budget { diagnostics, .. } => diagnostics,
        }
    }
}

/// Runs the whole pipeline with the configured model backend and the
/// on-disk completion cache.
pub fn run_summary(opts: &RunOptions, cfg: &Config) -> Result<RunOutput> {
    let counter = CharRatioEstimator::from_config(&cfg.token_estimator);
    let mut cache = CompletionCache::open(&cfg.cache.resolved_path());
    let mut compressor = LlmCompressor::from_env(&cfg.compression, &mut cache, &counter);
    run_summary_with(opts, cfg, &counter, &mut compressor)
}

pub fn run_summary_with<C, P>(opts: &RunOptions, cfg: &Config, counter: &C, compressor: &mut P) -> Result<RunOutput>
where
    C: TokenCounter + ?Sized,
    P: Compressor + ?Sized,
{
    let mut user_ignore = cfg.ignore.clone();
    user_ignore.extend(opts.ignore.iter().cloned());
    let ignore = IgnorePatterns::for_input(&opts.input, &user_ignore)?;
    info!(patterns = ?ignore.patterns(), "ignoring");

    let print_full = PathPatterns::new(&opts.print_full);
    let print_only = PathPatterns::new(&opts.print_only);
    let mode = if opts.all {
        SummaryMode::All
    } else if !print_only.is_empty() {
        SummaryMode::PrintOnly
    } else {
        SummaryMode::Summarize
    };

    let scan = ScanOptions {
        root: opts.input.clone(),
        max_file_bytes: cfg.token_estimator.max_file_bytes,
    };
    let entries = scan_files(&scan, &ignore)?;
    let summaries = FileSummarizer::new(counter, &mut *compressor, &cfg.summary)
        .with_print_full(print_full.clone())
        .with_print_only(print_only)
        .summarize(&entries, mode)?;

    let mut blocks = BlockSet::new()
        .with(BlockKind::FileHierarchy, format_hierarchy(&opts.input, &ignore)?)
        .with(BlockKind::FileSummary, format_file_summaries(&summaries));

    let diagnostics = |blocks: &BlockSet| Diagnostics {
        input: opts.input.clone(),
        ignore: ignore.patterns().to_vec(),
        print_full: print_full.patterns().to_vec(),
        block_sizes: blocks.sizes(counter),
    };

    if blocks.get(BlockKind::FileSummary).is_empty() {
        return Err(RunError::EmptySummary(diagnostics(&blocks)).into());
    }

    if let Some(tb) = opts.traceback.as_deref() {
        let frames = TracebackResolver::new(cfg.summary.traceback_radius).parse(tb);
        info!(frames = frames.len(), "traceback parsed");
        blocks.set(BlockKind::Traceback, tb);
        blocks.set(BlockKind::TracebackContext, format_frames(&frames));
    }

    let (blocks, path, compression_calls) = if opts.all {
        (blocks, None, 0)
    } else {
        // Block text is spliced into the layout verbatim, so the blocks get
        // what the empty layout leaves; zero forces the degraded path.
        let layout = counter.count(&Document::layout(opts.traceback.is_some()).render());
        let budget = opts.max_tokens_out.saturating_sub(layout);
        debug!(layout, budget, "block budget");
        let options = AllocatorOptions::from_config(&cfg.budget);
        let mut allocator = BudgetAllocator::new(counter, &mut *compressor, options);
        match allocator.allocate(blocks.clone(), budget) {
            Ok(a) => (a.blocks, Some(a.path), a.compression_calls),
            Err(source) => {
                return Err(RunError::Budget {
                    source,
                    diagnostics: diagnostics(&blocks),
                }
                .into())
            }
        }
    };

    let document = Document::from_blocks(&blocks, opts.traceback.is_some()).render();
    Ok(RunOutput {
        tokens: counter.count(&document),
        document,
        files: summaries.len(),
        path,
        compression_calls,
        remote_calls: compressor.remote_calls(),
    })
}
