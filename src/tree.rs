//! The syntax tree one run works on: top-level declarations with byte extents,
//! plus the file's comment groups, associated only by position.

use std::borrow::Cow;

use proc_macro2::{LineColumn, TokenStream, TokenTree};
use quote::ToTokens;
use syn::spanned::Spanned;

use crate::comments::{self, CommentGroup};

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: usize,
    pub end: usize,
}

impl Extent {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// One function parameter. `name` is `None` for `_`, destructuring patterns
/// and `self` receivers.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<syn::Ident>,
    pub ty: syn::Type,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub stmts: Vec<syn::Stmt>,
    /// Number of leading statements the tool synthesized.
    pub synthetic: usize,
    /// Offset just past the opening `{`.
    pub(crate) open: usize,
    pub(crate) indent: String,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    /// Impl self type or trait name for functions declared inside a block.
    pub owner: Option<String>,
    pub params: Vec<Param>,
    pub body: Option<Body>,
    pub is_const: bool,
    pub extent: Extent,
    /// Start of the function proper: its visibility or signature, after any
    /// attributes and doc comments.
    pub(crate) head: usize,
    /// End of the previous sibling declaration, or of the enclosing `{`.
    pub(crate) floor: usize,
}

impl FnDecl {
    /// Describe a function the tool generated. Its body lives in the
    /// synthetic item, so none is recorded here.
    pub fn synthetic(item: &syn::ItemFn) -> Self {
        Self {
            name: item.sig.ident.to_string(),
            owner: None,
            params: item.sig.inputs.iter().map(param).collect(),
            body: None,
            is_const: item.sig.constness.is_some(),
            extent: Extent::new(0, 0),
            head: 0,
            floor: 0,
        }
    }

    /// "Type::method" for members, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}::{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug)]
pub enum DeclKind {
    Import(syn::ItemUse),
    Function(FnDecl),
    /// Anything else. `members` holds the functions of impl, trait and
    /// extern blocks.
    Other { members: Vec<FnDecl> },
}

#[derive(Debug)]
pub enum Origin {
    Source(Extent),
    Synthetic(Box<syn::Item>),
}

#[derive(Debug)]
pub struct Declaration {
    pub kind: DeclKind,
    pub origin: Origin,
}

impl Declaration {
    pub fn synthetic(kind: DeclKind, item: syn::Item) -> Self {
        Self {
            kind,
            origin: Origin::Synthetic(Box::new(item)),
        }
    }

    pub fn is_import(&self) -> bool {
        matches!(self.kind, DeclKind::Import(_))
    }
}

/// Address of a function: a top-level declaration, or a member of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FnRef {
    pub decl: usize,
    pub member: Option<usize>,
}

pub struct SyntaxTree {
    source: String,
    pub decls: Vec<Declaration>,
    pub comments: Vec<CommentGroup>,
    /// Every comment as lexed, before any edit.
    lexed: Vec<Extent>,
    header_end: usize,
    /// Names of the file's own top-level items.
    item_names: Vec<String>,
}

impl SyntaxTree {
    pub fn parse(source: &str) -> syn::Result<Self> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let file = syn::parse_file(source)?;
        let index = LineIndex::new(source);

        let tokens: TokenStream = blank_shebang(source)
            .parse()
            .map_err(|e| syn::Error::new(proc_macro2::Span::call_site(), e))?;
        let mut spans = Vec::new();
        token_extents(tokens, &index, &mut spans);
        spans.sort_by_key(|e| e.start);

        let mut lexed = Vec::new();
        let mut cursor = shebang_len(source);
        for span in &spans {
            if span.start > cursor {
                comments::lex_gap(source, cursor, span.start, &mut lexed);
            }
            cursor = cursor.max(span.end);
        }
        comments::lex_gap(source, cursor, source.len(), &mut lexed);
        let comments = comments::group(source, &lexed);

        let mut header_end = shebang_len(source);
        for attr in &file.attrs {
            header_end = header_end.max(index.extent(attr.span()).end);
        }
        if header_end == 0 {
            header_end = banner_end(source, &comments, spans.first().map(|e| e.start));
        }

        let item_names = file
            .items
            .iter()
            .filter_map(item_ident)
            .map(|ident| ident.to_string())
            .collect();

        let mut decls = Vec::with_capacity(file.items.len());
        let mut floor = 0;
        for item in &file.items {
            let extent = index.extent(item.span());
            decls.push(Declaration {
                kind: declaration_kind(item, &index, extent, floor),
                origin: Origin::Source(extent),
            });
            floor = extent.end;
        }

        Ok(Self {
            source: source.to_string(),
            decls,
            comments,
            lexed,
            header_end,
            item_names,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Offset after the shebang, inner attributes or leading banner comment.
    pub fn header_end(&self) -> usize {
        self.header_end
    }

    /// Names the file defines at the top level, whatever the item kind.
    pub fn item_names(&self) -> &[String] {
        &self.item_names
    }

    pub(crate) fn lexed_comments(&self) -> &[Extent] {
        &self.lexed
    }

    /// Every function the scanner may consider, in source order.
    pub fn functions(&self) -> Vec<FnRef> {
        let mut refs = Vec::new();
        for (decl, d) in self.decls.iter().enumerate() {
            match &d.kind {
                DeclKind::Function(_) => refs.push(FnRef { decl, member: None }),
                DeclKind::Other { members } => {
                    refs.extend((0..members.len()).map(|m| FnRef {
                        decl,
                        member: Some(m),
                    }));
                }
                DeclKind::Import(_) => {}
            }
        }
        refs
    }

    pub fn function(&self, r: FnRef) -> Option<&FnDecl> {
        match (&self.decls.get(r.decl)?.kind, r.member) {
            (DeclKind::Function(f), None) => Some(f),
            (DeclKind::Other { members }, Some(m)) => members.get(m),
            _ => None,
        }
    }

    pub fn function_mut(&mut self, r: FnRef) -> Option<&mut FnDecl> {
        match (&mut self.decls.get_mut(r.decl)?.kind, r.member) {
            (DeclKind::Function(f), None) => Some(f),
            (DeclKind::Other { members }, Some(m)) => members.get_mut(m),
            _ => None,
        }
    }

    /// First top-level function called `name`.
    pub fn find_function(&self, name: &str) -> Option<FnRef> {
        self.decls
            .iter()
            .position(|d| matches!(&d.kind, DeclKind::Function(f) if f.name == name))
            .map(|decl| FnRef { decl, member: None })
    }
}

fn declaration_kind(
    item: &syn::Item,
    index: &LineIndex<'_>,
    extent: Extent,
    floor: usize,
) -> DeclKind {
    match item {
        syn::Item::Use(u) => DeclKind::Import(u.clone()),
        syn::Item::Fn(f) => {
            let head = head(index, Some(&f.vis), &f.sig);
            DeclKind::Function(function(
                index,
                &f.sig,
                Some(&f.block),
                Placement { extent, head, floor },
                None,
            ))
        }
        syn::Item::Impl(imp) => {
            let owner = type_ident(&imp.self_ty);
            let mut floor = index.extent(imp.brace_token.span.open()).end;
            let mut members = Vec::new();
            for member in &imp.items {
                let member_extent = index.extent(member.span());
                if let syn::ImplItem::Fn(f) = member {
                    let head = head(index, Some(&f.vis), &f.sig);
                    members.push(function(
                        index,
                        &f.sig,
                        Some(&f.block),
                        Placement {
                            extent: member_extent,
                            head,
                            floor,
                        },
                        Some(owner.clone()),
                    ));
                }
                floor = member_extent.end;
            }
            DeclKind::Other { members }
        }
        syn::Item::Trait(tr) => {
            let owner = tr.ident.to_string();
            let mut floor = index.extent(tr.brace_token.span.open()).end;
            let mut members = Vec::new();
            for member in &tr.items {
                let member_extent = index.extent(member.span());
                if let syn::TraitItem::Fn(f) = member {
                    let head = head(index, None, &f.sig);
                    members.push(function(
                        index,
                        &f.sig,
                        f.default.as_ref(),
                        Placement {
                            extent: member_extent,
                            head,
                            floor,
                        },
                        Some(owner.clone()),
                    ));
                }
                floor = member_extent.end;
            }
            DeclKind::Other { members }
        }
        syn::Item::ForeignMod(fm) => {
            let mut floor = index.extent(fm.brace_token.span.open()).end;
            let mut members = Vec::new();
            for member in &fm.items {
                let member_extent = index.extent(member.span());
                if let syn::ForeignItem::Fn(f) = member {
                    let head = head(index, Some(&f.vis), &f.sig);
                    let placement = Placement {
                        extent: member_extent,
                        head,
                        floor,
                    };
                    members.push(function(index, &f.sig, None, placement, None));
                }
                floor = member_extent.end;
            }
            DeclKind::Other { members }
        }
        _ => DeclKind::Other {
            members: Vec::new(),
        },
    }
}

/// Where a function sits among its siblings.
struct Placement {
    extent: Extent,
    head: usize,
    floor: usize,
}

fn function(
    index: &LineIndex<'_>,
    sig: &syn::Signature,
    block: Option<&syn::Block>,
    placement: Placement,
    owner: Option<String>,
) -> FnDecl {
    let fn_indent = index.line_indent(sig.fn_token.span.start().line);
    FnDecl {
        name: sig.ident.to_string(),
        owner,
        params: sig.inputs.iter().map(param).collect(),
        body: block.map(|b| body(index, b, fn_indent)),
        is_const: sig.constness.is_some(),
        extent: placement.extent,
        head: placement.head,
        floor: placement.floor,
    }
}

/// Offset of the visibility, or of the signature when there is none.
fn head(index: &LineIndex<'_>, vis: Option<&syn::Visibility>, sig: &syn::Signature) -> usize {
    match vis {
        Some(vis) if !matches!(vis, syn::Visibility::Inherited) => index.extent(vis.span()).start,
        _ => index.extent(sig.span()).start,
    }
}

fn item_ident(item: &syn::Item) -> Option<&syn::Ident> {
    match item {
        syn::Item::Const(i) => Some(&i.ident),
        syn::Item::Enum(i) => Some(&i.ident),
        syn::Item::ExternCrate(i) => Some(i.rename.as_ref().map_or(&i.ident, |(_, r)| r)),
        syn::Item::Fn(i) => Some(&i.sig.ident),
        syn::Item::Macro(i) => i.ident.as_ref(),
        syn::Item::Mod(i) => Some(&i.ident),
        syn::Item::Static(i) => Some(&i.ident),
        syn::Item::Struct(i) => Some(&i.ident),
        syn::Item::Trait(i) => Some(&i.ident),
        syn::Item::TraitAlias(i) => Some(&i.ident),
        syn::Item::Type(i) => Some(&i.ident),
        syn::Item::Union(i) => Some(&i.ident),
        _ => None,
    }
}

fn param(arg: &syn::FnArg) -> Param {
    match arg {
        syn::FnArg::Receiver(r) => Param {
            name: None,
            ty: (*r.ty).clone(),
        },
        syn::FnArg::Typed(t) => Param {
            name: match &*t.pat {
                syn::Pat::Ident(p) => Some(p.ident.clone()),
                _ => None,
            },
            ty: (*t.ty).clone(),
        },
    }
}

fn body(index: &LineIndex<'_>, block: &syn::Block, fn_indent: &str) -> Body {
    let open = block.brace_token.span.open();
    let first_line = block.stmts.first().map(|s| s.span().start().line);
    let indent = match first_line {
        Some(line) if line > open.start().line => index.line_indent(line).to_string(),
        _ => format!("{fn_indent}    "),
    };
    Body {
        stmts: block.stmts.clone(),
        synthetic: 0,
        open: index.extent(open).end,
        indent,
    }
}

/// Extract the type name from a `syn::Type` for qualified method names.
fn type_ident(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(tp) => tp
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string())
            .unwrap_or_else(|| ty.to_token_stream().to_string()),
        _ => ty.to_token_stream().to_string(),
    }
}

fn shebang_len(source: &str) -> usize {
    if source.starts_with("#!") && !source[2..].trim_start().starts_with('[') {
        source.find('\n').unwrap_or(source.len())
    } else {
        0
    }
}

/// The tokenizer rejects a shebang; turn it into a comment of the same length.
fn blank_shebang(source: &str) -> Cow<'_, str> {
    if shebang_len(source) > 0 {
        Cow::Owned(format!("//{}", &source[2..]))
    } else {
        Cow::Borrowed(source)
    }
}

/// A leading comment group followed by a blank line belongs to the file,
/// not to the first declaration.
fn banner_end(source: &str, groups: &[CommentGroup], first_token: Option<usize>) -> usize {
    let Some(first) = groups.first() else {
        return 0;
    };
    let extent = first.extent();
    if !source[..extent.start].trim().is_empty() {
        return 0;
    }
    let next = first_token.unwrap_or(source.len());
    let next_comment = groups.get(1).map_or(next, |g| g.extent().start.min(next));
    let between = &source[extent.end..next_comment];
    if between.bytes().filter(|&b| b == b'\n').count() >= 2 {
        extent.end
    } else {
        0
    }
}

/// Collect byte extents of every token, including both delimiters of groups.
fn token_extents(tokens: TokenStream, index: &LineIndex<'_>, out: &mut Vec<Extent>) {
    for tt in tokens {
        match tt {
            TokenTree::Group(g) => {
                out.push(index.extent(g.span_open()));
                token_extents(g.stream(), index, out);
                out.push(index.extent(g.span_close()));
            }
            other => out.push(index.extent(other.span())),
        }
    }
}

/// Maps `proc-macro2` line/column positions to byte offsets.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { source, starts }
    }

    /// `pos.line` is 1-based; `pos.column` counts chars.
    fn offset(&self, pos: LineColumn) -> usize {
        let Some(&line_start) = self.starts.get(pos.line.saturating_sub(1)) else {
            return self.source.len();
        };
        self.source[line_start..]
            .char_indices()
            .nth(pos.column)
            .map_or(self.source.len(), |(i, _)| line_start + i)
    }

    fn extent(&self, span: proc_macro2::Span) -> Extent {
        Extent::new(self.offset(span.start()), self.offset(span.end()))
    }

    fn line_indent(&self, line: usize) -> &'a str {
        let Some(&start) = self.starts.get(line.saturating_sub(1)) else {
            return "";
        };
        let rest = &self.source[start..];
        let len = rest
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(rest.len());
        &rest[..len]
    }
}
