use crate::tokens::TokenCounter;

/// Lazy, line-aligned chunking of a text.
///
/// Each item is a slice of the original text covering whole lines, without the
/// separating newline. Joining every item with `\n` gives back the input.
/// Clone the iterator to restart it.
#[derive(Debug)]
pub struct Chunks<'a, C: ?Sized> {
    text: &'a str,
    /// Byte offset of the next unread line; `None` once exhausted.
    next_line: Option<usize>,
    counter: &'a C,
    max_chunk_tokens: usize,
}

/// Split `text` into chunks of at most `max_chunk_tokens` each.
///
/// A line is never split. A single line larger than the ceiling becomes its
/// own over-sized chunk, so callers must tolerate chunks above the nominal size.
pub fn split_into_chunks<'a, C: TokenCounter + ?Sized>(
    text: &'a str,
    max_chunk_tokens: usize,
    counter: &'a C,
) -> Chunks<'a, C> {
    Chunks {
        text,
        next_line: if text.is_empty() { None } else { Some(0) },
        counter,
        max_chunk_tokens,
    }
}

impl<C: ?Sized> Clone for Chunks<'_, C> {
    fn clone(&self) -> Self {
        Self {
            text: self.text,
            next_line: self.next_line,
            counter: self.counter,
            max_chunk_tokens: self.max_chunk_tokens,
        }
    }
}

impl<'a, C: TokenCounter + ?Sized> Chunks<'a, C> {
    /// Returns `(line_end, next_line_start)` for the line starting at `start`.
    fn line_at(&self, start: usize) -> (usize, Option<usize>) {
        match self.text[start..].find('\n') {
            Some(i) => (start + i, Some(start + i + 1)),
            None => (self.text.len(), None),
        }
    }
}

impl<'a, C: TokenCounter + ?Sized> Iterator for Chunks<'a, C> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let chunk_start = self.next_line?;
        let mut chunk_end = chunk_start;
        let mut used: usize = 0;
        let mut lines: usize = 0;
        let mut cursor = Some(chunk_start);

        while let Some(line_start) = cursor {
            let (line_end, after) = self.line_at(line_start);
            let line_tokens = self.counter.count(&self.text[line_start..line_end]);
            if lines > 0 && used + line_tokens > self.max_chunk_tokens {
                break;
            }
            used += line_tokens;
            lines += 1;
            chunk_end = line_end;
            cursor = after;
        }

        self.next_line = cursor;
        Some(&self.text[chunk_start..chunk_end])
    }
}
