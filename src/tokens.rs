use crate::config::TokenEstimatorConfig;

/// Maps text to a token count under a fixed encoding.
///
/// Implementations must be deterministic and side-effect free: the budget
/// allocator calls `count` many times per run and assumes it is cheap.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;

    /// Sum of the per-element counts.
    fn count_all<S: AsRef<str>>(&self, parts: &[S]) -> usize
    where
        Self: Sized,
    {
        parts.iter().map(|p| self.count(p.as_ref())).sum()
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn count(&self, text: &str) -> usize {
        (**self).count(text)
    }
}

/// Character-ratio estimator: `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self { chars_per_token }
    }

    pub fn from_config(cfg: &TokenEstimatorConfig) -> Self {
        Self::new(cfg.chars_per_token)
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::from_config(&TokenEstimatorConfig::default())
    }
}

impl TokenCounter for CharRatioEstimator {
    fn count(&self, text: &str) -> usize {
        estimate_tokens_from_chars(text.chars().count(), self.chars_per_token)
    }
}

pub fn estimate_tokens_from_chars(total_chars: usize, chars_per_token: usize) -> usize {
    if chars_per_token == 0 {
        return total_chars;
    }
    total_chars.div_ceil(chars_per_token)
}

/// Hard-trim `text` to at most `max_tokens`.
///
/// Multi-line text loses whole trailing lines; single-line text loses trailing
/// words. The surviving pieces are rejoined with the separator they were split on.
pub fn truncate_to_tokens<C: TokenCounter + ?Sized>(counter: &C, text: &str, max_tokens: usize) -> String {
    if counter.count(text) <= max_tokens {
        return text.to_string();
    }

    let sep = if text.contains('\n') { '\n' } else { ' ' };
    let mut parts: Vec<&str> = text.split(sep).collect();

    // Cheap pass on per-piece counts, then exact passes on the rejoined text
    // (separators cost tokens too).
    let mut used: usize = parts.iter().map(|p| counter.count(p)).sum();
    while used > max_tokens {
        let Some(last) = parts.pop() else { break };
        used -= counter.count(last);
    }

    let mut out = join_with(&parts, sep);
    while !parts.is_empty() && counter.count(&out) > max_tokens {
        parts.pop();
        out = join_with(&parts, sep);
    }
    out
}

fn join_with(parts: &[&str], sep: char) -> String {
    let mut out = String::new();
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(p);
    }
    out
}
