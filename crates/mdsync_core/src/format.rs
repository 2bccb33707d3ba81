//! Text formatting boundary.
//!
//! Save runs the editor buffer through a [`Formatter`] before comparing or
//! writing. The transform is opaque to the rest of the system; it only has
//! to be pure.

/// A pure `text -> text` transform.
///
/// Closures of type `Fn(&str) -> String` implement this trait.
pub trait Formatter: Send + Sync {
    /// Returns the formatted text.
    fn format(&self, text: &str) -> String;
}

impl<F> Formatter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn format(&self, text: &str) -> String {
        self(text)
    }
}

/// Leaves text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Formatter for Identity {
    fn format(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Light markdown tidy-up.
///
/// Strips trailing whitespace, collapses runs of blank lines to one, and
/// ends non-empty text with exactly one newline. Fenced code blocks are left
/// as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownTidy;

impl Formatter for MarkdownTidy {
    fn format(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_fence = false;
        let mut blank_run = 0usize;

        for line in text.lines() {
            let trimmed_start = line.trim_start();
            if trimmed_start.starts_with("```") || trimmed_start.starts_with("~~~") {
                in_fence = !in_fence;
                blank_run = 0;
                out.push_str(line.trim_end());
                out.push('\n');
                continue;
            }
            if in_fence {
                out.push_str(line);
                out.push('\n');
                continue;
            }

            let line = line.trim_end();
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 || out.is_empty() {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push_str(line);
            out.push('\n');
        }

        while out.ends_with("\n\n") {
            out.pop();
        }
        out
    }
}
