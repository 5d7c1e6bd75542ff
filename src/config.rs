/// How outcome messages are rendered into a single comment string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentFormat {
    /// Host-compatible text: every fragment is prefixed by one space,
    /// empty fragments included.
    #[default]
    Legacy,
    /// Non-empty fragments joined by single spaces.
    Fragments,
}

/// Per-invocation settings for the reconcilers.
#[derive(Debug, Clone, Default)]
pub struct ReconcileConfig {
    /// Preview mode: compute and report the diff without mutating calls.
    pub dry_run: bool,

    /// Rendering used by [`crate::Outcome::comment`] callers.
    pub comment_format: CommentFormat,
}

impl ReconcileConfig {
    /// Enables or disables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the comment rendering.
    pub fn with_comment_format(mut self, format: CommentFormat) -> Self {
        self.comment_format = format;
        self
    }
}
