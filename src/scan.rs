use crate::tree::{FnRef, SyntaxTree};

/// How a marker comment is tied to the function it precedes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Attachment {
    /// Only the closest comment group before the function, and only when no
    /// other declaration sits between the two.
    #[default]
    Nearest,
    /// Any earlier comment group not already claimed by another function.
    Loose,
}

/// A function selected for instrumentation, with the comment groups that
/// carried its marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub func: FnRef,
    pub groups: Vec<usize>,
}

/// Find every function whose preceding comments carry `marker`.
///
/// Targets come back in source order. Each comment group is attributed to
/// at most one function.
pub fn find_targets(tree: &SyntaxTree, marker: &str, attach: Attachment) -> Vec<Target> {
    let mut functions: Vec<FnRef> = tree.functions();
    functions.sort_by_key(|&r| tree.function(r).map_or(0, |f| f.extent.start));

    match attach {
        Attachment::Nearest => nearest(tree, &functions, marker),
        Attachment::Loose => loose(tree, &functions, marker),
    }
}

fn nearest(tree: &SyntaxTree, functions: &[FnRef], marker: &str) -> Vec<Target> {
    // Groups are lexed in order and never overlap, so their ends are sorted.
    let ends: Vec<usize> = tree.comments.iter().map(|g| g.extent().end).collect();

    let mut targets = Vec::new();
    for &func in functions {
        let Some(f) = tree.function(func) else {
            continue;
        };
        let Some(idx) = ends.partition_point(|&end| end < f.head).checked_sub(1) else {
            continue;
        };
        let group = &tree.comments[idx];
        if group.extent().start >= f.floor && group.has_marker(marker) {
            tracing::debug!(function = %f.qualified_name(), group = idx, "marker attached");
            targets.push(Target {
                func,
                groups: vec![idx],
            });
        }
    }
    targets
}

fn loose(tree: &SyntaxTree, functions: &[FnRef], marker: &str) -> Vec<Target> {
    let mut claimed = vec![false; tree.comments.len()];

    let mut targets = Vec::new();
    for &func in functions {
        let Some(f) = tree.function(func) else {
            continue;
        };
        let groups: Vec<usize> = tree
            .comments
            .iter()
            .enumerate()
            .filter(|&(idx, g)| !claimed[idx] && g.extent().end < f.head)
            .filter(|(_, g)| g.has_marker(marker))
            .map(|(idx, _)| idx)
            .collect();
        if groups.is_empty() {
            continue;
        }
        for &idx in &groups {
            claimed[idx] = true;
        }
        tracing::debug!(function = %f.qualified_name(), ?groups, "marker attached (loose)");
        targets.push(Target { func, groups });
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_names(source: &str, attach: Attachment) -> Vec<String> {
        let tree = SyntaxTree::parse(source).unwrap();
        find_targets(&tree, "dd:log", attach)
            .into_iter()
            .map(|t| tree.function(t.func).unwrap().qualified_name())
            .collect()
    }

    #[test]
    fn finds_marked_functions_only() {
        let source = r#"
// dd:log
fn a() {}

fn b() {}

// just a note
fn c() {}

// Does things.
// dd:log
fn d() {}
"#;
        assert_eq!(target_names(source, Attachment::Nearest), ["a", "d"]);
    }

    #[test]
    fn no_markers_no_targets() {
        let source = "// hello\nfn a() {}\nfn b() {}\n";
        assert!(target_names(source, Attachment::Nearest).is_empty());
        assert!(target_names(source, Attachment::Loose).is_empty());
    }

    #[test]
    fn marker_matches_anywhere_in_line() {
        let source = "/* trace: dd:log, please */\nfn a() {}\n";
        assert_eq!(target_names(source, Attachment::Nearest), ["a"]);
    }

    #[test]
    fn nearest_ignores_marker_before_other_declaration() {
        let source = r#"
// dd:log
struct Config;

fn build() {}
"#;
        assert!(target_names(source, Attachment::Nearest).is_empty());
        assert_eq!(target_names(source, Attachment::Loose), ["build"]);
    }

    #[test]
    fn nearest_uses_only_the_closest_group() {
        let source = r#"
// dd:log

// unrelated
fn a() {}
"#;
        assert!(target_names(source, Attachment::Nearest).is_empty());
        assert_eq!(target_names(source, Attachment::Loose), ["a"]);
    }

    #[test]
    fn loose_claims_each_marker_once() {
        let source = r#"
// dd:log
fn a() {}

fn b() {}
"#;
        assert_eq!(target_names(source, Attachment::Loose), ["a"]);
    }

    #[test]
    fn methods_are_scanned() {
        let source = r#"
struct S;

impl S {
    // dd:log
    fn run(&self) {}

    fn idle(&self) {}
}

trait Greeter {
    // dd:log
    fn greet(&self);
}
"#;
        assert_eq!(
            target_names(source, Attachment::Nearest),
            ["S::run", "Greeter::greet"]
        );
    }

    #[test]
    fn comment_inside_previous_body_is_not_attached() {
        let source = r#"
fn a() {
    // dd:log
}
fn b() {}
"#;
        assert!(target_names(source, Attachment::Nearest).is_empty());
    }

    #[test]
    fn marker_between_docs_and_fn_attaches() {
        let source = r#"
/// Adds numbers.
// dd:log
fn add(a: i32, b: i32) -> i32 {
    a + b
}

#[inline]
// dd:log
pub fn sub(a: i32, b: i32) -> i32 {
    a - b
}

struct S;

impl S {
    /// Runs.
    // dd:log
    pub(crate) fn run(&self) {}
}
"#;
        assert_eq!(
            target_names(source, Attachment::Nearest),
            ["add", "sub", "S::run"]
        );
        assert_eq!(
            target_names(source, Attachment::Loose),
            ["add", "sub", "S::run"]
        );
    }

    #[test]
    fn marker_above_attributes_attaches() {
        let source = r#"
// dd:log
#[inline]
/// Docs.
pub fn a() {}
"#;
        assert_eq!(target_names(source, Attachment::Nearest), ["a"]);
    }
}
