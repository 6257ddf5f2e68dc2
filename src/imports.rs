//! Import normalization for the names injected code depends on.

use std::collections::HashSet;

use proc_macro2::Span;
use syn::Ident;

use crate::tree::{DeclKind, Declaration, SyntaxTree};

/// A `use` target the injected code needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub path: &'static [&'static str],
}

impl Requirement {
    fn name(&self) -> &'static str {
        self.path[self.path.len() - 1]
    }

    fn parent(&self) -> &'static [&'static str] {
        &self.path[..self.path.len() - 1]
    }

    pub fn display(&self) -> String {
        self.path.join("::")
    }
}

/// The logging macro used for entry and exit records.
pub const LOGGER: Requirement = Requirement {
    path: &["tracing", "info"],
};
/// Clock for the start timestamp and the elapsed duration.
pub const CLOCK: Requirement = Requirement {
    path: &["std", "time", "Instant"],
};
/// Writer handed to the JSON subscriber by the setup routine.
pub const STDOUT: Requirement = Requirement {
    path: &["std", "io", "stdout"],
};

/// Local names under which injected code refers to each requirement.
#[derive(Debug, Clone)]
pub struct Bindings {
    pub logger: Ident,
    pub clock: Ident,
    pub stdout: Ident,
}

/// What import normalization will do: the names to use, and the imports
/// still to add.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub bindings: Bindings,
    pub missing: Vec<(Requirement, Ident)>,
}

/// One name a `use` item brings into scope.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UseBinding {
    path: Vec<String>,
    /// `None` for a glob over `path`.
    local: Option<String>,
}

/// Work out how injected code can name each requirement, given the file's
/// existing top-level imports.
pub fn plan(tree: &SyntaxTree) -> ImportPlan {
    let mut existing = Vec::new();
    for decl in &tree.decls {
        if let DeclKind::Import(item) = &decl.kind {
            flatten(&item.tree, &mut Vec::new(), &mut existing);
        }
    }

    // Names bound by imports or by the file's own items are both off limits.
    let mut taken: HashSet<String> = existing
        .iter()
        .filter_map(|b| b.local.clone())
        .chain(tree.item_names().iter().cloned())
        .collect();
    let mut missing = Vec::new();
    let mut bind = |req: Requirement| -> Ident {
        if let Some(local) = resolve(req, &existing) {
            return Ident::new(&local, Span::call_site());
        }
        let local = if taken.contains(req.name()) {
            format!("__tm_{}", req.name())
        } else {
            req.name().to_string()
        };
        taken.insert(local.clone());
        let ident = Ident::new(&local, Span::call_site());
        missing.push((req, ident.clone()));
        ident
    };

    let bindings = Bindings {
        logger: bind(LOGGER),
        clock: bind(CLOCK),
        stdout: bind(STDOUT),
    };
    ImportPlan { bindings, missing }
}

/// Add the missing imports to the tree. Returns the paths added.
///
/// New imports extend the first block of consecutive top-level `use` items,
/// or open one at the start of the declaration list.
pub fn normalize(tree: &mut SyntaxTree, plan: &ImportPlan) -> Vec<String> {
    let mut at = import_block_end(tree).unwrap_or(0);
    let mut added = Vec::new();
    for (req, local) in &plan.missing {
        let item = use_item(*req, local);
        tracing::debug!(import = %req.display(), alias = %local, "adding import");
        tree.decls.insert(
            at,
            Declaration::synthetic(DeclKind::Import(item.clone()), syn::Item::Use(item)),
        );
        at += 1;
        added.push(req.display());
    }
    added
}

/// Index just past the first run of top-level `use` declarations.
pub fn import_block_end(tree: &SyntaxTree) -> Option<usize> {
    let first = tree.decls.iter().position(Declaration::is_import)?;
    let len = tree.decls[first..]
        .iter()
        .take_while(|d| d.is_import())
        .count();
    Some(first + len)
}

fn use_item(req: Requirement, local: &Ident) -> syn::ItemUse {
    let segments = req.path.iter().map(|s| Ident::new(s, Span::call_site()));
    if local == req.name() {
        syn::parse_quote! { use #(#segments)::*; }
    } else {
        syn::parse_quote! { use #(#segments)::* as #local; }
    }
}

/// The local name `req` is reachable under, if some binding provides it.
fn resolve(req: Requirement, existing: &[UseBinding]) -> Option<String> {
    existing.iter().find_map(|b| match &b.local {
        Some(local) if local != "_" && b.path == req.path => Some(local.clone()),
        None if b.path == req.parent() => Some(req.name().to_string()),
        _ => None,
    })
}

fn flatten(tree: &syn::UseTree, prefix: &mut Vec<String>, out: &mut Vec<UseBinding>) {
    match tree {
        syn::UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            flatten(&p.tree, prefix, out);
            prefix.pop();
        }
        syn::UseTree::Name(n) => {
            if n.ident == "self" {
                out.push(UseBinding {
                    path: prefix.clone(),
                    local: prefix.last().cloned(),
                });
            } else {
                let mut path = prefix.clone();
                path.push(n.ident.to_string());
                out.push(UseBinding {
                    path,
                    local: Some(n.ident.to_string()),
                });
            }
        }
        syn::UseTree::Rename(r) => {
            let mut path = prefix.clone();
            if r.ident != "self" {
                path.push(r.ident.to_string());
            }
            out.push(UseBinding {
                path,
                local: Some(r.rename.to_string()),
            });
        }
        syn::UseTree::Glob(_) => out.push(UseBinding {
            path: prefix.clone(),
            local: None,
        }),
        syn::UseTree::Group(g) => {
            for item in &g.items {
                flatten(item, prefix, out);
            }
        }
    }
}
