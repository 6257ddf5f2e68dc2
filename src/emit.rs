//! Turn an edited [`SyntaxTree`] back into source text.
//!
//! Untouched text is copied byte for byte; only the edits recorded in the
//! tree are rendered, so comments and formatting elsewhere survive.

use std::collections::HashSet;

use crate::tree::{DeclKind, Extent, FnDecl, Origin, SyntaxTree};

enum Edit {
    Insert { at: usize, text: String },
    Delete { start: usize, end: usize },
}

impl Edit {
    /// Inserts go before deletes starting at the same offset.
    fn sort_key(&self) -> (usize, u8) {
        match self {
            Edit::Insert { at, .. } => (*at, 0),
            Edit::Delete { start, .. } => (*start, 1),
        }
    }
}

/// Where synthetic declarations following a source declaration go.
#[derive(Clone, Copy)]
struct Anchor {
    at: usize,
    after_use: bool,
}

/// Render the tree and check that the result parses.
pub fn emit(tree: &SyntaxTree) -> Result<String, syn::Error> {
    let source = tree.source();
    let mut edits = Vec::new();

    let kept: HashSet<(usize, usize)> = tree
        .comments
        .iter()
        .flat_map(|g| g.lines.iter())
        .map(|c| (c.extent.start, c.extent.end))
        .collect();
    for extent in tree.lexed_comments() {
        if !kept.contains(&(extent.start, extent.end)) {
            let (start, end) = removal_range(source, *extent);
            edits.push(Edit::Delete { start, end });
        }
    }

    let mut anchor: Option<Anchor> = None;
    let mut pending: Vec<&syn::Item> = Vec::new();
    for decl in &tree.decls {
        match &decl.origin {
            Origin::Synthetic(item) => pending.push(item),
            Origin::Source(extent) => {
                if !pending.is_empty() {
                    edits.push(place(tree, anchor, &pending));
                    pending.clear();
                }
                anchor = Some(Anchor {
                    at: line_tail_end(source, extent.end),
                    after_use: decl.is_import(),
                });
                match &decl.kind {
                    DeclKind::Function(f) => body_edits(source, f, &mut edits),
                    DeclKind::Other { members } => {
                        for f in members {
                            body_edits(source, f, &mut edits);
                        }
                    }
                    DeclKind::Import(_) => {}
                }
            }
        }
    }
    if !pending.is_empty() {
        edits.push(place(tree, anchor, &pending));
    }

    let output = apply(source, edits);
    syn::parse_file(&output)?;
    Ok(output)
}

fn apply(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(Edit::sort_key);
    let mut out = String::with_capacity(source.len() + 1024);
    let mut cursor = 0;
    for edit in edits {
        match edit {
            Edit::Insert { at, text } => {
                if at > cursor {
                    out.push_str(&source[cursor..at]);
                    cursor = at;
                }
                out.push_str(&text);
            }
            Edit::Delete { start, end } => {
                if start > cursor {
                    out.push_str(&source[cursor..start]);
                }
                cursor = cursor.max(end);
            }
        }
    }
    out.push_str(&source[cursor..]);
    out
}

/// Text to remove for a deleted comment: the whole line when the comment
/// stands alone on it, otherwise the comment and the blanks joining it to
/// the code beside it.
fn removal_range(source: &str, extent: Extent) -> (usize, usize) {
    let line_start = source[..extent.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[extent.end..]
        .find('\n')
        .map_or(source.len(), |i| extent.end + i);
    let before = &source[line_start..extent.start];
    let after = &source[extent.end..line_end];

    match (before.trim().is_empty(), after.trim().is_empty()) {
        (true, true) => (line_start, (line_end + 1).min(source.len())),
        (true, false) => {
            let blanks = after.len() - after.trim_start().len();
            (extent.start, extent.end + blanks)
        }
        (false, _) => (line_start + before.trim_end().len(), extent.end),
    }
}

/// End of the line `end` sits on, when only blanks or a line comment follow
/// it there; `end` itself otherwise.
fn line_tail_end(source: &str, end: usize) -> usize {
    let rest = &source[end..];
    let line = rest.find('\n').map_or(rest, |i| &rest[..i]);
    let tail = line.trim();
    if tail.is_empty() || tail.starts_with("//") {
        end + line.trim_end_matches('\r').len()
    } else {
        end
    }
}

/// Render the synthetic statements of `func` right after its `{`.
fn body_edits(source: &str, func: &FnDecl, edits: &mut Vec<Edit>) {
    let Some(body) = func.body.as_ref().filter(|b| b.synthetic > 0) else {
        return;
    };

    let mut text = String::new();
    for line in render_stmts(&body.stmts[..body.synthetic]).lines() {
        text.push('\n');
        if !line.is_empty() {
            text.push_str(&body.indent);
            text.push_str(line);
        }
    }

    // Whatever followed `{` on the same line moves to a line of its own.
    let rest = &source[body.open..];
    let rest_of_line = rest.find('\n').map_or(rest, |i| &rest[..i]);
    let code = rest_of_line.trim_start();
    if !code.trim_end().is_empty() {
        let indent = if code.starts_with('}') {
            body.indent.strip_suffix("    ").unwrap_or("")
        } else {
            body.indent.as_str()
        };
        text.push('\n');
        text.push_str(indent);
        let blanks = rest_of_line.len() - code.len();
        if blanks > 0 {
            edits.push(Edit::Delete {
                start: body.open,
                end: body.open + blanks,
            });
        }
    }

    edits.push(Edit::Insert {
        at: body.open,
        text,
    });
}

/// Statements rendered by `prettyplease`, with its function indentation
/// removed.
fn render_stmts(stmts: &[syn::Stmt]) -> String {
    let wrapper: syn::ItemFn = syn::parse_quote! {
        fn __tm_render() {
            #(#stmts)*
        }
    };
    let text = render_item(&syn::Item::Fn(wrapper));
    let lines: Vec<&str> = text.lines().collect();
    let inner = lines
        .get(1..lines.len().saturating_sub(1))
        .unwrap_or_default();
    inner
        .iter()
        .map(|l| l.strip_prefix("    ").unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Insert synthetic declarations at `anchor`, or at the file header when no
/// source declaration precedes them.
fn place(tree: &SyntaxTree, anchor: Option<Anchor>, items: &[&syn::Item]) -> Edit {
    let mut joined = String::new();
    let mut prev_is_use = anchor.is_some_and(|a| a.after_use);
    for (i, item) in items.iter().enumerate() {
        let is_use = matches!(item, syn::Item::Use(_));
        if i > 0 || anchor.is_some() {
            joined.push_str(if is_use && prev_is_use { "\n" } else { "\n\n" });
        }
        joined.push_str(render_item(item).trim_end());
        prev_is_use = is_use;
    }

    match anchor {
        Some(a) => Edit::Insert {
            at: a.at,
            text: joined,
        },
        None => {
            let at = tree.header_end();
            let text = if at == 0 {
                format!("{joined}\n\n")
            } else {
                format!("\n\n{joined}")
            };
            Edit::Insert { at, text }
        }
    }
}

fn render_item(item: &syn::Item) -> String {
    prettyplease::unparse(&syn::File {
        shebang: None,
        attrs: Vec::new(),
        items: vec![item.clone()],
    })
}
