use std::path::{Path, PathBuf};

use proc_macro2::Span;

use crate::comments;
use crate::emit;
use crate::error::{Error, RewriteError};
use crate::imports::{self, Bindings};
use crate::scan::{self, Attachment};
use crate::setup::{self, SetupOutcome};
use crate::tree::{FnDecl, SyntaxTree};

/// Marker text looked for in comments unless configured otherwise.
pub const DEFAULT_MARKER: &str = "dd:log";

/// Suffix appended to the input path to name the output artifact.
pub const OUTPUT_SUFFIX: &str = ".generated";

#[derive(Debug, Clone)]
pub struct Options {
    pub marker: String,
    pub attach: Attachment,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            attach: Attachment::default(),
        }
    }
}

/// Result of instrumenting a source file.
#[derive(Debug)]
pub struct InstrumentResult {
    pub source: String,
    /// Qualified names of the functions that matched, in source order.
    pub functions: Vec<String>,
    /// Import paths that were added.
    pub imports_added: Vec<String>,
    pub setup: SetupOutcome,
}

/// Outcome of a file-level run.
#[derive(Debug)]
pub enum Outcome {
    /// No function carried the marker; nothing was written.
    NothingToDo,
    Generated {
        output: PathBuf,
        result: InstrumentResult,
    },
}

/// Instrument every marked function in `source`.
///
/// Returns `Ok(None)` when no function carries the marker; in that case the
/// tree is not edited at all.
pub fn instrument_source(
    source: &str,
    options: &Options,
) -> Result<Option<InstrumentResult>, RewriteError> {
    let mut tree = SyntaxTree::parse(source).map_err(RewriteError::Parse)?;

    let targets = scan::find_targets(&tree, &options.marker, options.attach);
    if targets.is_empty() {
        return Ok(None);
    }

    // Names are resolved before any edit so every prologue agrees with the
    // imports that end up in the file.
    let plan = imports::plan(&tree);

    let groups: Vec<usize> = targets.iter().flat_map(|t| t.groups.iter().copied()).collect();
    comments::strip_marker(&mut tree.comments, &groups, &options.marker);

    let mut functions = Vec::with_capacity(targets.len());
    for target in &targets {
        let Some(func) = tree.function_mut(target.func) else {
            continue;
        };
        inject_logging(func, &plan.bindings);
        functions.push(func.qualified_name());
    }

    let imports_added = imports::normalize(&mut tree, &plan);
    let setup = setup::ensure_setup_routine(&mut tree, &plan.bindings);

    let source = emit::emit(&tree).map_err(RewriteError::Emit)?;
    Ok(Some(InstrumentResult {
        source,
        functions,
        imports_added,
        setup,
    }))
}

/// Instrument the file at `path`, writing `<path>.generated` when anything
/// matched. The input file is never modified.
pub fn instrument_file(path: &Path, options: &Options) -> Result<Outcome, Error> {
    let source = std::fs::read_to_string(path).map_err(|source| Error::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(result) = instrument_source(&source, options).map_err(|e| e.at(path))? else {
        return Ok(Outcome::NothingToDo);
    };

    let output = output_path(path);
    std::fs::write(&output, &result.source).map_err(|source| Error::WriteError {
        path: output.clone(),
        source,
    })?;
    Ok(Outcome::Generated { output, result })
}

/// `<input>.generated`, next to the input.
pub fn output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(OUTPUT_SUFFIX);
    PathBuf::from(name)
}

/// Prepend the timing prologue to `func`'s body.
///
/// Returns `false` (and leaves the function alone) when there is no body to
/// instrument or the function is `const`.
pub fn inject_logging(func: &mut FnDecl, bindings: &Bindings) -> bool {
    if func.is_const {
        tracing::warn!(
            function = %func.qualified_name(),
            "const fn cannot read the clock; marker removed without instrumentation"
        );
        return false;
    }
    let stmts = prologue(func, bindings);
    let Some(body) = func.body.as_mut() else {
        tracing::debug!(function = %func.qualified_name(), "no body; marker removed only");
        return false;
    };
    let added = stmts.len();
    body.stmts.splice(0..0, stmts);
    body.synthetic += added;
    tracing::debug!(function = %func.qualified_name(), "injected entry/exit logging");
    true
}

/// The three statements placed at the top of an instrumented function:
/// start timestamp, entry record, and a drop guard that writes the exit record.
pub fn prologue(func: &FnDecl, bindings: &Bindings) -> Vec<syn::Stmt> {
    let Bindings { logger, clock, .. } = bindings;
    let name = syn::LitStr::new(&func.name, Span::call_site());
    let fields = func
        .params
        .iter()
        .filter_map(|p| p.name.as_ref())
        .map(|ident| quote::quote! { #ident = ?#ident, });

    vec![
        syn::parse_quote! {
            let __tm_start = #clock::now();
        },
        syn::parse_quote! {
            #logger!(func = #name, #(#fields)* "function entry");
        },
        syn::parse_quote! {
            let __tm_exit = {
                struct ExitLog(#clock);
                impl Drop for ExitLog {
                    fn drop(&mut self) {
                        #logger!(func = #name, duration = ?self.0.elapsed(), "function exit");
                    }
                }
                ExitLog(__tm_start)
            };
        },
    ]
}

#[cfg(test)]
mod tests {
    use quote::ToTokens;

    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn instrument(source: &str) -> String {
        instrument_source(source, &Options::default())
            .unwrap()
            .expect("at least one function should match")
            .source
    }

    /// Statements of the top-level function `name` in `source`.
    fn body_of(source: &str, name: &str) -> Vec<String> {
        let file = syn::parse_file(source).unwrap();
        file.items
            .iter()
            .find_map(|item| match item {
                syn::Item::Fn(f) if f.sig.ident == name => Some(
                    f.block
                        .stmts
                        .iter()
                        .map(|s| squash(&s.to_token_stream().to_string()))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no fn {name} in:\n{source}"))
    }

    #[test]
    fn instruments_marked_function_only() {
        let source = r#"
// dd:log
fn walk() {
    do_stuff();
}

fn other() {
    do_other();
}
"#;
        let result = instrument(source);
        let walk = body_of(&result, "walk");
        assert_eq!(walk.len(), 4, "prologue plus original statement:\n{result}");
        assert_eq!(walk[0], "let__tm_start=Instant::now();");
        assert_eq!(walk[1], squash(r#"info!(func = "walk", "function entry");"#));
        assert!(walk[2].starts_with("let__tm_exit={structExitLog(Instant);"));
        assert!(walk[2].contains(&squash(
            r#"info!(func = "walk", duration = ?self.0.elapsed(), "function exit");"#
        )));
        assert_eq!(walk[3], "do_stuff();");

        assert_eq!(body_of(&result, "other"), ["do_other();"]);
    }

    #[test]
    fn marked_main_installs_sink_before_its_entry_record() {
        let result = instrument("// dd:log\nfn main() { work(); }\n");
        let main = body_of(&result, "main");
        assert_eq!(main[0], "init_logging();");
        assert_eq!(main[1], "let__tm_start=Instant::now();");
        assert_eq!(main[2], squash(r#"info!(func = "main", "function entry");"#));
        assert_eq!(main[4], "work();");
    }

    #[test]
    fn marker_after_doc_comment_is_honoured() {
        let source = r#"
/// Adds numbers.
// dd:log
#[inline]
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#;
        let result = instrument(source);
        assert!(!result.contains("dd:log"));
        assert!(
            result.contains("/// Adds numbers.\n#[inline]\npub fn add"),
            "doc comment and attribute should stay attached:\n{result}"
        );
        assert_eq!(body_of(&result, "add")[0], "let__tm_start=Instant::now();");
    }

    #[test]
    fn nothing_marked_returns_none() {
        let source = "// just a comment\nfn walk() {}\n";
        assert!(instrument_source(source, &Options::default()).unwrap().is_none());
    }

    #[test]
    fn named_params_are_captured_in_order() {
        let source = r#"
// dd:log
fn mix(a: i32, _: u8, (x, y): (u8, u8), mut b: String, _skip: bool) {}
"#;
        let result = instrument(source);
        let mix = body_of(&result, "mix");
        assert_eq!(
            mix[1],
            squash(r#"info!(func = "mix", a = ?a, b = ?b, _skip = ?_skip, "function entry");"#)
        );
    }

    #[test]
    fn preserves_function_signature_and_body() {
        let source = r#"
// dd:log
fn compute(x: i32, y: i32) -> i32 {
    let z = x + y;
    if z > 10 {
        return z;
    }
    z * 2
}
"#;
        let result = instrument(source);
        assert!(
            result.contains("fn compute(x: i32, y: i32) -> i32"),
            "signature should be preserved. Got:\n{result}"
        );
        let body = body_of(&result, "compute");
        assert_eq!(
            body[3..],
            ["letz=x+y;", "ifz>10{returnz;}", "z*2"].map(String::from)
        );
    }

    #[test]
    fn marker_comment_is_removed_other_comments_kept() {
        let source = r#"
// Adds things up.
// dd:log
// Returns the sum.
fn add(a: i32, b: i32) -> i32 {
    a + b
}

// dd:log
fn noop() {}
"#;
        let result = instrument(source);
        assert!(!result.contains("dd:log"), "marker should be gone:\n{result}");
        assert!(
            result.contains("// Adds things up.\n// Returns the sum.\nfn add"),
            "surrounding comment lines should survive in order:\n{result}"
        );
    }

    #[test]
    fn trait_signature_loses_marker_without_injection() {
        let source = r#"
trait Store {
    // dd:log
    fn get(&self, key: &str) -> Option<String>;
}
"#;
        let result = instrument_source(source, &Options::default())
            .unwrap()
            .expect("the signature still matches");
        assert_eq!(result.functions, ["Store::get"]);
        assert!(!result.source.contains("dd:log"));
        assert!(!result.source.contains("__tm_start"));
        // Imports and the setup routine are still added once.
        assert_eq!(result.imports_added.len(), 3);
        assert!(result.source.contains("fn init_logging()"));
    }

    #[test]
    fn const_fn_is_not_instrumented() {
        let source = "// dd:log\nconst fn answer() -> u32 { 42 }\n";
        let result = instrument(source);
        assert!(!result.contains("dd:log"));
        assert_eq!(body_of(&result, "answer"), ["42"]);
    }

    #[test]
    fn impl_method_uses_bare_name_in_records() {
        let source = r#"
struct Walker;

impl Walker {
    // dd:log
    fn walk(&self, depth: u32) {
        self.step();
    }
}
"#;
        let result = instrument_source(source, &Options::default())
            .unwrap()
            .unwrap();
        assert_eq!(result.functions, ["Walker::walk"]);
        let text = squash(&result.source);
        assert!(
            text.contains(&squash(r#"info!(func = "walk", depth = ?depth, "function entry");"#)),
            "receiver should not be captured:\n{}",
            result.source
        );
    }

    #[test]
    fn aliased_imports_are_used_by_prologue() {
        let source = r#"
use std::time::Instant as Clock;
use log::info;

// dd:log
fn tick() {}
"#;
        let result = instrument(source);
        let tick = body_of(&result, "tick");
        assert_eq!(tick[0], "let__tm_start=Clock::now();");
        assert!(tick[1].starts_with("__tm_info!(func=\"tick\""));
        assert!(squash(&result).contains("usetracing::infoas__tm_info;"));
        assert!(!squash(&result).contains("usestd::time::Instant;"));
    }

    #[test]
    fn local_struct_named_like_clock_is_not_shadowed() {
        let result = instrument("struct Instant;\n\n// dd:log\nfn f() {}\n");
        assert!(squash(&result).contains("usestd::time::Instantas__tm_Instant;"));
        assert_eq!(body_of(&result, "f")[0], "let__tm_start=__tm_Instant::now();");
        assert!(result.contains("struct Instant;"));
    }

    #[test]
    fn existing_setup_routine_is_byte_identical() {
        let routine = "fn init_logging() {\n    // custom sink\n    my_sink::install( );\n}\n";
        let source = format!("{routine}\n// dd:log\nfn work() {{}}\n");
        let result = instrument_source(&source, &Options::default())
            .unwrap()
            .unwrap();
        assert_eq!(result.setup, SetupOutcome::Existing);
        assert!(result.source.contains(routine), "got:\n{}", result.source);
        assert_eq!(result.source.matches("fn init_logging").count(), 1);
    }

    #[test]
    fn loose_attachment_follows_unbounded_rule() {
        let source = r#"
// dd:log
struct Config;

fn build() {}
"#;
        let options = Options {
            attach: Attachment::Loose,
            ..Options::default()
        };
        let result = instrument_source(source, &options).unwrap().unwrap();
        assert_eq!(result.functions, ["build"]);
        assert!(instrument_source(source, &Options::default()).unwrap().is_none());
    }

    #[test]
    fn custom_marker() {
        let source = "// @trace\nfn a() {}\n// dd:log\nfn b() {}\n";
        let options = Options {
            marker: "@trace".to_string(),
            ..Options::default()
        };
        let result = instrument_source(source, &options).unwrap().unwrap();
        assert_eq!(result.functions, ["a"]);
        assert!(result.source.contains("// dd:log"));
    }

    #[test]
    fn output_path_appends_suffix() {
        assert_eq!(
            output_path(Path::new("src/main.rs")),
            PathBuf::from("src/main.rs.generated")
        );
    }
}
