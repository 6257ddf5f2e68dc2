//! Non-doc comments, recovered from the whitespace between tokens.
//!
//! `syn` drops ordinary comments, so they live beside the declaration list as
//! positional groups. Doc comments are attributes and never show up here.

use crate::tree::Extent;

/// A single `//` or `/* */` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub extent: Extent,
}

/// Comments separated by nothing but whitespace with at most one newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentGroup {
    pub lines: Vec<Comment>,
}

impl CommentGroup {
    /// Byte extent from the first comment's start to the last comment's end.
    ///
    /// Groups are never empty once they leave this module.
    pub fn extent(&self) -> Extent {
        match (self.lines.first(), self.lines.last()) {
            (Some(first), Some(last)) => Extent::new(first.extent.start, last.extent.end),
            _ => Extent::new(0, 0),
        }
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.lines.iter().any(|c| c.text.contains(marker))
    }
}

/// Find every comment in `source[start..end]`, which must hold only
/// whitespace and comments.
pub(crate) fn lex_gap(source: &str, start: usize, end: usize, out: &mut Vec<Extent>) {
    let bytes = source.as_bytes();
    let mut i = start;
    while i + 1 < end {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'/') => {
                let stop = bytes[i..end]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(end, |n| i + n);
                // Keep a trailing `\r` out of the comment text.
                let stop_text = if stop > i && bytes[stop - 1] == b'\r' {
                    stop - 1
                } else {
                    stop
                };
                out.push(Extent::new(i, stop_text));
                i = stop;
            }
            (b'/', b'*') => {
                let mut depth = 0usize;
                let mut j = i;
                while j + 1 < end {
                    match (bytes[j], bytes[j + 1]) {
                        (b'/', b'*') => {
                            depth += 1;
                            j += 2;
                        }
                        (b'*', b'/') => {
                            depth -= 1;
                            j += 2;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => j += 1,
                    }
                }
                let stop = if depth == 0 { j } else { end };
                out.push(Extent::new(i, stop));
                i = stop;
            }
            _ => i += 1,
        }
    }
}

/// Group lexed comments the way a reader sees them: a blank line or any
/// token between two comments starts a new group.
pub(crate) fn group(source: &str, lexed: &[Extent]) -> Vec<CommentGroup> {
    let mut groups: Vec<CommentGroup> = Vec::new();
    for extent in lexed {
        let comment = Comment {
            text: source[extent.start..extent.end].to_string(),
            extent: *extent,
        };
        let joins_previous = groups.last().is_some_and(|g| {
            let between = &source[g.extent().end..extent.start];
            between.chars().all(char::is_whitespace)
                && between.bytes().filter(|&b| b == b'\n').count() <= 1
        });
        match groups.last_mut() {
            Some(g) if joins_previous => g.lines.push(comment),
            _ => groups.push(CommentGroup {
                lines: vec![comment],
            }),
        }
    }
    groups
}

/// Remove every marker line from the groups at `targets`, then drop groups
/// left empty. Returns the number of comment lines removed.
pub fn strip_marker(groups: &mut Vec<CommentGroup>, targets: &[usize], marker: &str) -> usize {
    let mut removed = 0;
    for &idx in targets {
        if let Some(group) = groups.get_mut(idx) {
            let before = group.lines.len();
            group.lines.retain(|c| !c.text.contains(marker));
            removed += before - group.lines.len();
        }
    }
    groups.retain(|g| !g.lines.is_empty());
    removed
}
