use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compress::{Compressor, PromptStyle};
use crate::config::BudgetConfig;
use crate::splitter::split_into_chunks;
use crate::tokens::{truncate_to_tokens, TokenCounter};

/// The blocks that compete for space in the final document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    Traceback,
    TracebackContext,
    FileHierarchy,
    FileSummary,
}

impl BlockKind {
    pub const ALL: [BlockKind; 4] = [
        BlockKind::Traceback,
        BlockKind::TracebackContext,
        BlockKind::FileHierarchy,
        BlockKind::FileSummary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Traceback => "traceback",
            BlockKind::TracebackContext => "traceback_context",
            BlockKind::FileHierarchy => "file_hierarchy",
            BlockKind::FileSummary => "file_summary",
        }
    }

    /// 0 is kept at all costs; higher ranks are sacrificed first.
    pub fn rank(self) -> u8 {
        match self {
            BlockKind::Traceback => 0,
            BlockKind::TracebackContext => 1,
            BlockKind::FileHierarchy => 2,
            BlockKind::FileSummary => 3,
        }
    }

    /// Whether the allocator may hand this block to the compressor.
    /// The traceback context is only ever hard-trimmed, never compressed.
    pub fn is_reducible(self) -> bool {
        matches!(self, BlockKind::FileHierarchy | BlockKind::FileSummary)
    }

    /// Reducible kinds in the order the allocator compresses them, highest rank first.
    pub fn reduction_order() -> Vec<BlockKind> {
        let mut kinds: Vec<BlockKind> = Self::ALL.into_iter().filter(|k| k.is_reducible()).collect();
        kinds.sort_by_key(|k| std::cmp::Reverse(k.rank()));
        kinds
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub content: String,
}

/// At most one block per kind, kept in rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSet {
    blocks: Vec<Block>,
}

impl BlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `kind` set to `content`, replacing any previous block.
    pub fn with(mut self, kind: BlockKind, content: impl Into<String>) -> Self {
        self.set(kind, content);
        self
    }

    pub fn set(&mut self, kind: BlockKind, content: impl Into<String>) {
        let block = Block {
            kind,
            content: content.into(),
        };
        match self.blocks.binary_search_by_key(&kind.rank(), |b| b.kind.rank()) {
            Ok(i) => self.blocks[i] = block,
            Err(i) => self.blocks.insert(i, block),
        }
    }

    pub fn contains(&self, kind: BlockKind) -> bool {
        self.blocks.iter().any(|b| b.kind == kind)
    }

    /// Content of `kind`, or `""` when absent.
    pub fn get(&self, kind: BlockKind) -> &str {
        self.blocks
            .iter()
            .find(|b| b.kind == kind)
            .map(|b| b.content.as_str())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn sizes<C: TokenCounter + ?Sized>(&self, counter: &C) -> Vec<(BlockKind, usize)> {
        self.blocks
            .iter()
            .map(|b| (b.kind, counter.count(&b.content)))
            .collect()
    }

    pub fn total_tokens<C: TokenCounter + ?Sized>(&self, counter: &C) -> usize {
        self.blocks.iter().map(|b| counter.count(&b.content)).sum()
    }

    /// Tokens held by blocks the allocator never compresses.
    pub fn reserved_tokens<C: TokenCounter + ?Sized>(&self, counter: &C) -> usize {
        self.tokens_where(counter, |k| !k.is_reducible())
    }

    pub fn reducible_tokens<C: TokenCounter + ?Sized>(&self, counter: &C) -> usize {
        self.tokens_where(counter, BlockKind::is_reducible)
    }

    fn tokens_where<C: TokenCounter + ?Sized>(&self, counter: &C, pred: impl Fn(BlockKind) -> bool) -> usize {
        self.blocks
            .iter()
            .filter(|b| pred(b.kind))
            .map(|b| counter.count(&b.content))
            .sum()
    }
}

pub fn format_sizes(sizes: &[(BlockKind, usize)]) -> String {
    sizes
        .iter()
        .map(|(k, n)| format!("{}={}", k.name(), n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("blocks need {total} tokens after full reduction, budget is {budget} ({})", format_sizes(.sizes))]
    Exhausted {
        budget: usize,
        total: usize,
        sizes: Vec<(BlockKind, usize)>,
    },

    #[error("summary still {tokens} tokens after {iterations} reduction passes (target {target})")]
    ConvergenceExhausted {
        iterations: usize,
        target: usize,
        tokens: usize,
    },

    #[error("compression failed: {0:#}")]
    Compression(anyhow::Error),
}

/// Which branch of the policy produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPath {
    /// Everything fit as-is.
    FastPath,
    SummaryReduced,
    HierarchyReduced,
    /// Traceback blocks alone filled the budget; the rest was dropped.
    Degraded,
}

impl AllocationPath {
    /// The path reported when reducing `kind` was the last step needed.
    fn reduced(kind: BlockKind) -> Self {
        match kind {
            BlockKind::FileSummary => AllocationPath::SummaryReduced,
            _ => AllocationPath::HierarchyReduced,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Allocation {
    pub blocks: BlockSet,
    pub path: AllocationPath,
    pub compression_calls: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct AllocatorOptions {
    pub chunk_tokens: usize,
    pub target_decrement: usize,
    pub max_iterations: usize,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default())
    }
}

impl AllocatorOptions {
    pub fn from_config(cfg: &BudgetConfig) -> Self {
        Self {
            chunk_tokens: cfg.chunk_tokens,
            target_decrement: cfg.target_decrement,
            max_iterations: cfg.max_iterations,
        }
    }
}

/// Fits a [`BlockSet`] into a token budget.
///
/// Non-reducible blocks (traceback and its context) are reserved first. When
/// the reducible ones do not fit in the rest, they are compressed one kind at
/// a time in [`BlockKind::reduction_order`]: summary, then hierarchy.
pub struct BudgetAllocator<'a, C: ?Sized, P: ?Sized> {
    counter: &'a C,
    compressor: &'a mut P,
    options: AllocatorOptions,
    calls: usize,
}

impl<'a, C: TokenCounter + ?Sized, P: Compressor + ?Sized> BudgetAllocator<'a, C, P> {
    pub fn new(counter: &'a C, compressor: &'a mut P, options: AllocatorOptions) -> Self {
        Self {
            counter,
            compressor,
            options,
            calls: 0,
        }
    }

    pub fn allocate(&mut self, blocks: BlockSet, budget: usize) -> Result<Allocation, BudgetError> {
        self.calls = 0;
        let counter = self.counter;

        let reserved = blocks.reserved_tokens(counter);
        if reserved >= budget {
            warn!(reserved, budget, "traceback fills the budget, dropping reducible blocks");
            let blocks = degrade(&blocks, counter, budget);
            return Ok(self.finish(blocks, AllocationPath::Degraded));
        }

        let available = budget - reserved;
        if blocks.reducible_tokens(counter) <= available {
            return Ok(self.finish(blocks, AllocationPath::FastPath));
        }

        let order = BlockKind::reduction_order();
        let mut blocks = blocks;
        for (i, &kind) in order.iter().enumerate() {
            let tokens = counter.count(blocks.get(kind));
            let others = blocks.reducible_tokens(counter) - tokens;
            // A block with no room beside the others gets half the budget while
            // a later reduction can still make space.
            let target = match available.saturating_sub(others) {
                0 if i + 1 < order.len() => available / 2,
                t => t,
            };
            info!(block = kind.name(), tokens, target, "reducing block");
            let reduced = self.reduce(kind, blocks.get(kind), target)?;
            blocks.set(kind, reduced);

            if blocks.reducible_tokens(counter) <= available {
                return Ok(self.finish(blocks, AllocationPath::reduced(kind)));
            }
        }

        Err(BudgetError::Exhausted {
            budget,
            total: blocks.total_tokens(counter),
            sizes: blocks.sizes(counter),
        })
    }

    fn reduce(&mut self, kind: BlockKind, text: &str, target: usize) -> Result<String, BudgetError> {
        match kind {
            BlockKind::FileSummary => self.reduce_summary(text, target),
            _ => self.compress(text, target, PromptStyle::Hierarchy),
        }
    }

    /// Chunked summarization: compress every chunk, rejoin in order, and repeat
    /// on the result with a shrinking request target until it fits `target`.
    fn reduce_summary(&mut self, text: &str, target: usize) -> Result<String, BudgetError> {
        let mut current = text.to_string();
        let mut request_target = target;

        for iteration in 1..=self.options.max_iterations {
            let combined = self.compress_chunks(&current, request_target)?;
            let tokens = self.counter.count(&combined);
            debug!(iteration, request_target, tokens, target, "summary reduction pass");
            if tokens <= target {
                return Ok(combined);
            }
            current = combined;

            if request_target <= self.options.target_decrement {
                return Err(BudgetError::ConvergenceExhausted {
                    iterations: iteration,
                    target,
                    tokens,
                });
            }
            request_target -= self.options.target_decrement;
        }

        Err(BudgetError::ConvergenceExhausted {
            iterations: self.options.max_iterations,
            target,
            tokens: self.counter.count(&current),
        })
    }

    fn compress_chunks(&mut self, text: &str, request_target: usize) -> Result<String, BudgetError> {
        let counter = self.counter;
        let mut out: Vec<String> = Vec::new();
        for chunk in split_into_chunks(text, self.options.chunk_tokens, counter) {
            if chunk.trim().is_empty() {
                out.push(chunk.to_string());
                continue;
            }
            out.push(self.compress(chunk, request_target, PromptStyle::Chunk)?);
        }
        Ok(out.join("\n"))
    }

    fn compress(&mut self, text: &str, target: usize, style: PromptStyle) -> Result<String, BudgetError> {
        self.calls += 1;
        self.compressor
            .compress(text, target, style)
            .map_err(BudgetError::Compression)
    }

    fn finish(&self, blocks: BlockSet, path: AllocationPath) -> Allocation {
        let total_tokens = blocks.total_tokens(self.counter);
        debug!(?path, total_tokens, calls = self.calls, "allocation done");
        Allocation {
            blocks,
            path,
            compression_calls: self.calls,
            total_tokens,
        }
    }
}

/// Keeps the rank-0 block verbatim, hard-trims the other non-reducible blocks
/// into what is left of `budget` and empties every reducible block.
fn degrade<C: TokenCounter + ?Sized>(blocks: &BlockSet, counter: &C, budget: usize) -> BlockSet {
    let mut left = budget;
    let mut out = BlockSet::new();
    for block in blocks.iter() {
        let content = if block.kind.is_reducible() {
            String::new()
        } else if block.kind.rank() == 0 {
            block.content.clone()
        } else {
            truncate_to_tokens(counter, &block.content, left)
        };
        left = left.saturating_sub(counter.count(&content));
        out.set(block.kind, content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::CharRatioEstimator;
    use anyhow::{anyhow, Result};

    /// One char per token keeps the arithmetic readable.
    fn est() -> CharRatioEstimator {
        CharRatioEstimator::new(1)
    }

    #[derive(Default)]
    struct Identity {
        calls: usize,
    }

    impl Compressor for Identity {
        fn compress(&mut self, text: &str, _target: usize, _style: PromptStyle) -> Result<String> {
            self.calls += 1;
            Ok(text.to_string())
        }
    }

    /// Keeps the first `target` chars.
    #[derive(Default)]
    struct Truncating {
        calls: usize,
    }

    impl Compressor for Truncating {
        fn compress(&mut self, text: &str, target: usize, _style: PromptStyle) -> Result<String> {
            self.calls += 1;
            Ok(text.chars().take(target).collect())
        }
    }

    /// Halves every line, ignoring the target.
    #[derive(Default)]
    struct LineHalving {
        calls: usize,
    }

    impl Compressor for LineHalving {
        fn compress(&mut self, text: &str, _target: usize, _style: PromptStyle) -> Result<String> {
            self.calls += 1;
            Ok(text
                .split('\n')
                .map(|l| &l[..l.len() / 2])
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    /// Shrinks summaries but cannot touch the hierarchy.
    struct StubbornHierarchy;

    impl Compressor for StubbornHierarchy {
        fn compress(&mut self, text: &str, target: usize, style: PromptStyle) -> Result<String> {
            Ok(match style {
                PromptStyle::Hierarchy => text.to_string(),
                _ => text.chars().take(target).collect(),
            })
        }
    }

    /// Truncates like [`Truncating`] and records the prompt style of each call.
    #[derive(Default)]
    struct Recording {
        styles: Vec<PromptStyle>,
    }

    impl Compressor for Recording {
        fn compress(&mut self, text: &str, target: usize, style: PromptStyle) -> Result<String> {
            self.styles.push(style);
            Ok(text.chars().take(target).collect())
        }
    }

    struct Failing;

    impl Compressor for Failing {
        fn compress(&mut self, _text: &str, _target: usize, _style: PromptStyle) -> Result<String> {
            Err(anyhow!("endpoint unreachable"))
        }
    }

    fn project(hierarchy: &str, summary: &str) -> BlockSet {
        BlockSet::new()
            .with(BlockKind::FileHierarchy, hierarchy)
            .with(BlockKind::FileSummary, summary)
    }

    #[test]
    fn block_set_keeps_one_block_per_kind_in_rank_order() {
        let set = BlockSet::new()
            .with(BlockKind::FileSummary, "s1")
            .with(BlockKind::Traceback, "tb")
            .with(BlockKind::FileSummary, "s2");
        let kinds: Vec<BlockKind> = set.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BlockKind::Traceback, BlockKind::FileSummary]);
        assert_eq!(set.get(BlockKind::FileSummary), "s2");
        assert_eq!(set.get(BlockKind::FileHierarchy), "");
        assert!(!set.contains(BlockKind::TracebackContext));
    }

    #[test]
    fn kinds_rank_and_reducibility() {
        let ranks: Vec<u8> = BlockKind::ALL.iter().map(|k| k.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert!(!BlockKind::Traceback.is_reducible());
        assert!(!BlockKind::TracebackContext.is_reducible());
        assert!(BlockKind::FileSummary.is_reducible());
        assert_eq!(BlockKind::TracebackContext.name(), "traceback_context");
        assert_eq!(
            BlockKind::reduction_order(),
            vec![BlockKind::FileSummary, BlockKind::FileHierarchy]
        );
    }

    #[test]
    fn reserved_tokens_cover_non_reducible_blocks() {
        let counter = est();
        let blocks = project("hhh", "sssss")
            .with(BlockKind::Traceback, "tt")
            .with(BlockKind::TracebackContext, "cccc");
        assert_eq!(blocks.reserved_tokens(&counter), 6);
        assert_eq!(blocks.reducible_tokens(&counter), 8);
        assert_eq!(blocks.total_tokens(&counter), 14);
    }

    #[test]
    fn reduction_follows_rank_order() {
        let counter = est();
        let mut compressor = Recording::default();
        let blocks = project(&"h".repeat(50), &"s".repeat(200)).with(BlockKind::Traceback, "t".repeat(20));

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(blocks, 60).unwrap();

        assert_eq!(out.path, AllocationPath::HierarchyReduced);
        assert_eq!(compressor.styles, vec![PromptStyle::Chunk, PromptStyle::Hierarchy]);
        assert!(out.total_tokens <= 60);
    }

    #[test]
    fn fast_path_is_untouched_and_free() {
        let counter = est();
        let mut compressor = Identity::default();
        let blocks = project("src/\n    main.py", "File: src/main.py\nmain()")
            .with(BlockKind::Traceback, "Traceback ...")
            .with(BlockKind::TracebackContext, "File: src/main.py");

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(blocks.clone(), 1000).unwrap();

        assert_eq!(out.path, AllocationPath::FastPath);
        assert_eq!(out.blocks, blocks);
        assert_eq!(out.compression_calls, 0);
        assert_eq!(compressor.calls, 0);
    }

    #[test]
    fn exact_fit_is_fast_path() {
        let counter = est();
        let mut compressor = Identity::default();
        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(project("hhhhh", "sssss"), 10).unwrap();
        assert_eq!(out.path, AllocationPath::FastPath);
        assert_eq!(out.total_tokens, 10);
    }

    #[test]
    fn degrades_when_traceback_exceeds_budget() {
        let counter = est();
        let mut compressor = Identity::default();
        let traceback = "t".repeat(15);
        let blocks = project("tree", "summary")
            .with(BlockKind::Traceback, traceback.clone())
            .with(BlockKind::TracebackContext, "File: a.py\nLine: 3");

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(blocks, 10).unwrap();

        assert_eq!(out.path, AllocationPath::Degraded);
        assert_eq!(out.blocks.get(BlockKind::Traceback), traceback);
        assert_eq!(out.blocks.get(BlockKind::TracebackContext), "");
        assert_eq!(out.blocks.get(BlockKind::FileHierarchy), "");
        assert_eq!(out.blocks.get(BlockKind::FileSummary), "");
        assert_eq!(compressor.calls, 0);
    }

    #[test]
    fn degraded_context_is_trimmed_to_residual() {
        let counter = est();
        let mut compressor = Identity::default();
        let blocks = project("tree", "summary")
            .with(BlockKind::Traceback, "t".repeat(10))
            .with(BlockKind::TracebackContext, "aaaaa\nbbbbb\nccccc\nddddd");

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(blocks, 30).unwrap();

        assert_eq!(out.path, AllocationPath::Degraded);
        assert_eq!(out.blocks.get(BlockKind::TracebackContext), "aaaaa\nbbbbb\nccccc");
        assert!(out.total_tokens <= 30);
    }

    #[test]
    fn reduces_summary_first() {
        let counter = est();
        let mut compressor = Truncating::default();
        let summary = "File: a.py\n".repeat(30);

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(project("h".repeat(10).as_str(), &summary), 100).unwrap();

        assert_eq!(out.path, AllocationPath::SummaryReduced);
        assert_eq!(out.blocks.get(BlockKind::FileHierarchy), "h".repeat(10));
        assert!(counter.count(out.blocks.get(BlockKind::FileSummary)) <= 90);
        assert_eq!(out.compression_calls, 1);
        assert!(out.total_tokens <= 100);
    }

    #[test]
    fn repeated_passes_keep_chunk_order() {
        let counter = est();
        let mut compressor = LineHalving::default();
        let lines: Vec<String> = ('a'..='j').map(|c| c.to_string().repeat(28)).collect();
        let summary = lines.join("\n");
        let options = AllocatorOptions {
            chunk_tokens: 40,
            ..AllocatorOptions::default()
        };

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, options);
        let out = allocator.allocate(project("", &summary), 90).unwrap();

        let reduced = out.blocks.get(BlockKind::FileSummary);
        assert!(counter.count(reduced) <= 90);
        let firsts: String = reduced.lines().map(|l| l.chars().next().unwrap()).collect();
        assert_eq!(firsts, "abcdefghij");
        // 10 single-line chunks, then 5 two-line chunks.
        assert_eq!(out.compression_calls, 15);
    }

    #[test]
    fn hierarchy_reduced_when_it_fills_the_budget() {
        let counter = est();
        let mut compressor = Truncating::default();
        let blocks = project(&"h".repeat(50), &"s".repeat(200))
            .with(BlockKind::Traceback, "t".repeat(20))
            .with(BlockKind::TracebackContext, "c".repeat(30));

        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
        let out = allocator.allocate(blocks, 100).unwrap();

        assert_eq!(out.path, AllocationPath::HierarchyReduced);
        assert_eq!(out.blocks.get(BlockKind::FileSummary), "s".repeat(25));
        assert_eq!(out.blocks.get(BlockKind::FileHierarchy), "h".repeat(25));
        assert_eq!(out.total_tokens, 100);
    }

    #[test]
    fn traceback_survives_and_result_fits_for_any_budget() {
        let counter = est();
        let traceback = "t".repeat(20);
        for budget in [21, 40, 50, 51, 60, 100, 299, 300, 1000] {
            let mut compressor = Truncating::default();
            let blocks = project(&"h".repeat(50), &"s".repeat(200))
                .with(BlockKind::Traceback, traceback.clone())
                .with(BlockKind::TracebackContext, "c".repeat(30));

            let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());
            let out = allocator.allocate(blocks, budget).unwrap();
            assert_eq!(out.blocks.get(BlockKind::Traceback), traceback, "budget {budget}");
            assert!(out.total_tokens <= budget, "budget {budget}: {} tokens", out.total_tokens);
        }
    }

    #[test]
    fn identity_compressor_terminates_with_error() {
        let counter = est();
        let mut compressor = Identity::default();
        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());

        let err = allocator.allocate(project("", &"s".repeat(400)), 90).unwrap_err();
        match err {
            BudgetError::ConvergenceExhausted { iterations, target, tokens } => {
                // Request targets 90 then 40; 40 is at the floor.
                assert_eq!(iterations, 2);
                assert_eq!(target, 90);
                assert_eq!(tokens, 400);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(compressor.calls, 2);
    }

    #[test]
    fn iteration_cap_bounds_the_loop() {
        let counter = est();
        let mut compressor = Identity::default();
        let options = AllocatorOptions {
            chunk_tokens: 2000,
            target_decrement: 1,
            max_iterations: 5,
        };
        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, options);

        let err = allocator.allocate(project("", &"s".repeat(400)), 300).unwrap_err();
        assert!(matches!(err, BudgetError::ConvergenceExhausted { iterations: 5, .. }));
        assert_eq!(compressor.calls, 5);
    }

    #[test]
    fn reports_exhaustion_when_hierarchy_will_not_shrink() {
        let counter = est();
        let mut compressor = StubbornHierarchy;
        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());

        let err = allocator
            .allocate(project(&"h".repeat(150), &"s".repeat(100)), 100)
            .unwrap_err();
        match err {
            BudgetError::Exhausted { budget, total, ref sizes } => {
                assert_eq!(budget, 100);
                assert_eq!(total, 200);
                assert!(sizes.contains(&(BlockKind::FileHierarchy, 150)));
                assert!(err.to_string().contains("file_hierarchy=150"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn compression_failure_is_surfaced() {
        let counter = est();
        let mut compressor = Failing;
        let mut allocator = BudgetAllocator::new(&counter, &mut compressor, AllocatorOptions::default());

        let err = allocator.allocate(project("", &"s".repeat(400)), 90).unwrap_err();
        assert!(matches!(err, BudgetError::Compression(_)));
        assert!(err.to_string().contains("endpoint unreachable"));
    }
}
