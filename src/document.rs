use crate::allocator::{BlockKind, BlockSet};

/// The final text handed to the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub hierarchy: String,
    pub summary: String,
    /// Present only when a traceback was supplied; the second element is the
    /// resolved context.
    pub traceback: Option<(String, String)>,
}

impl Document {
    /// `with_traceback` decides whether the traceback sections are rendered,
    /// even if the allocator emptied them.
    pub fn from_blocks(blocks: &BlockSet, with_traceback: bool) -> Self {
        Self {
            hierarchy: blocks.get(BlockKind::FileHierarchy).to_string(),
            summary: blocks.get(BlockKind::FileSummary).to_string(),
            traceback: with_traceback.then(|| {
                (
                    blocks.get(BlockKind::Traceback).to_string(),
                    blocks.get(BlockKind::TracebackContext).to_string(),
                )
            }),
        }
    }

    /// Headers, fences and closing line with every block empty.
    pub fn layout(with_traceback: bool) -> Self {
        Self {
            traceback: with_traceback.then(Default::default),
            ..Self::default()
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Context:\n\nDirectory Structure:\n```\n{}\n```\n\nFile Summary:\n{}\n",
            self.hierarchy, self.summary
        );
        if let Some((traceback, context)) = self.traceback.as_ref() {
            out.push_str(&format!(
                "\nTraceback:\n```\n{traceback}\n```\n\nTraceback Context:\n```\n{context}\n```\n\nResolve this error.\n"
            ));
        }
        out
    }
}
