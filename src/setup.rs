//! The one-time routine that installs the process-wide JSON trace sink.

use syn::visit::Visit;

use crate::imports::{self, Bindings};
use crate::tree::{DeclKind, Declaration, FnDecl, SyntaxTree};

/// Name of the setup routine the tool looks for and synthesizes.
pub const SETUP_FN: &str = "init_logging";

/// What [`ensure_setup_routine`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The file already defines the routine; nothing was touched.
    Existing,
    /// A routine was inserted. `called_from_main` is set when a call was
    /// added to `fn main`.
    Inserted { called_from_main: bool },
}

/// Make sure the file defines exactly one setup routine.
///
/// An existing top-level function of that name is left alone, whatever its
/// body. Otherwise one is inserted right after the import block, and `fn main`
/// (if the file has one) calls it before anything else, so main's own entry
/// record already reaches the sink.
pub fn ensure_setup_routine(tree: &mut SyntaxTree, bindings: &Bindings) -> SetupOutcome {
    if let Some(existing) = tree.find_function(SETUP_FN).and_then(|r| tree.function(r)) {
        if !existing.params.is_empty() {
            tracing::warn!(
                function = SETUP_FN,
                params = existing.params.len(),
                "existing setup routine takes parameters; leaving it as is"
            );
        }
        return SetupOutcome::Existing;
    }

    let item = setup_item(bindings);
    let at = imports::import_block_end(tree).unwrap_or(0);
    tree.decls.insert(
        at,
        Declaration::synthetic(
            DeclKind::Function(FnDecl::synthetic(&item)),
            syn::Item::Fn(item),
        ),
    );
    tracing::debug!(function = SETUP_FN, position = at, "inserted setup routine");

    let called_from_main = match tree.find_function("main").and_then(|r| tree.function_mut(r)) {
        Some(main) => call_from_main(main),
        None => false,
    };
    SetupOutcome::Inserted { called_from_main }
}

fn setup_item(bindings: &Bindings) -> syn::ItemFn {
    let stdout = &bindings.stdout;
    let name = syn::Ident::new(SETUP_FN, proc_macro2::Span::call_site());
    syn::parse_quote! {
        pub fn #name() {
            let level = tracing::Level::INFO;
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .with_writer(#stdout)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

/// Insert `init_logging();` as main's first statement, ahead of any injected
/// prologue, unless main already calls it.
fn call_from_main(main: &mut FnDecl) -> bool {
    let Some(body) = main.body.as_mut() else {
        return false;
    };
    let mut finder = CallFinder::default();
    for stmt in &body.stmts {
        finder.visit_stmt(stmt);
    }
    if finder.found {
        return false;
    }
    let name = syn::Ident::new(SETUP_FN, proc_macro2::Span::call_site());
    let call: syn::Stmt = syn::parse_quote! { #name(); };
    body.stmts.insert(0, call);
    body.synthetic += 1;
    true
}

/// Looks for a call to the setup routine by bare name.
#[derive(Default)]
struct CallFinder {
    found: bool,
}

impl<'ast> Visit<'ast> for CallFinder {
    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let syn::Expr::Path(p) = &*node.func {
            if p.path.segments.last().is_some_and(|s| s.ident == SETUP_FN) {
                self.found = true;
            }
        }
        syn::visit::visit_expr_call(self, node);
    }
}
