/// Tree-sitter based Ruby outline extractor.
use crate::errors::Result;
use crate::extraction::{
    first_named_child_of_type, is_constant_name, name_or_anonymous, unquote, Extractor,
};
use crate::parser::{SyntaxNode, SyntaxTree};
use crate::types::{Extraction, Symbol, SymbolKind};

/// Extracts the outline of Ruby files: requires, modules, classes, methods
/// and constants.
pub struct RubyExtractor;

impl RubyExtractor {
    pub fn extract_root<N: SyntaxNode>(root: &N) -> Extraction {
        let mut out = Extraction::default();

        for node in root.named_children() {
            match node.kind() {
                "call" => {
                    if let Some(path) = Self::required_path(&node) {
                        out.imports.push(path);
                    }
                }
                "module" => out.symbols.push(Self::module(&node)),
                "class" => out.symbols.push(Self::class(&node)),
                "method" => out.symbols.push(Self::method(&node, SymbolKind::Function)),
                "assignment" => {
                    if let Some(symbol) = Self::constant(&node) {
                        out.symbols.push(symbol);
                    }
                }
                _ => {}
            }
        }

        out
    }

    /// The path argument of `require` / `require_relative`.
    fn required_path<N: SyntaxNode>(call: &N) -> Option<String> {
        let method = first_named_child_of_type(call, "identifier")?;
        if !matches!(method.text(), "require" | "require_relative") {
            return None;
        }
        let args = first_named_child_of_type(call, "argument_list")?;
        let path = first_named_child_of_type(&args, "string")?;
        Some(unquote(path.text()))
    }

    /// `Foo` or `Foo::Bar`.
    fn constant_name<N: SyntaxNode>(node: &N) -> String {
        name_or_anonymous(
            first_named_child_of_type(node, "constant")
                .or_else(|| first_named_child_of_type(node, "scope_resolution")),
        )
    }

    /// A module with its classes and methods as children.
    fn module<N: SyntaxNode>(node: &N) -> Symbol {
        let mut children = Vec::new();
        if let Some(body) = first_named_child_of_type(node, "body_statement") {
            for child in body.named_children() {
                match child.kind() {
                    "class" => children.push(Self::class(&child)),
                    "method" | "singleton_method" => {
                        children.push(Self::method(&child, SymbolKind::Method))
                    }
                    _ => {}
                }
            }
        }

        Symbol {
            kind: SymbolKind::Module,
            name: Self::constant_name(node),
            signature: None,
            line: node.line(),
            children,
        }
    }

    /// A class with its methods as children; the superclass becomes the signature.
    fn class<N: SyntaxNode>(node: &N) -> Symbol {
        let children = first_named_child_of_type(node, "body_statement")
            .map(|body| {
                body.named_children()
                    .iter()
                    .filter(|c| matches!(c.kind(), "method" | "singleton_method"))
                    .map(|c| Self::method(c, SymbolKind::Method))
                    .collect()
            })
            .unwrap_or_default();

        Symbol {
            kind: SymbolKind::Class,
            name: Self::constant_name(node),
            signature: first_named_child_of_type(node, "superclass")
                .map(|s| s.text().to_string()),
            line: node.line(),
            children,
        }
    }

    fn method<N: SyntaxNode>(node: &N, kind: SymbolKind) -> Symbol {
        let name = name_or_anonymous(first_named_child_of_type(node, "identifier"));
        let name = if node.kind() == "singleton_method" {
            format!("self.{}", name)
        } else {
            name
        };
        Symbol::leaf(
            kind,
            name,
            first_named_child_of_type(node, "method_parameters").map(|p| p.text().to_string()),
            node.line(),
        )
    }

    /// `MAX_RETRIES = 3` at the top level.
    fn constant<N: SyntaxNode>(node: &N) -> Option<Symbol> {
        let left = node.named_child(0)?;
        if left.kind() != "constant" || !is_constant_name(left.text()) {
            return None;
        }
        Some(Symbol::leaf(
            SymbolKind::Constant,
            left.text(),
            None,
            node.line(),
        ))
    }
}

impl Extractor for RubyExtractor {
    fn extract(&self, tree: &SyntaxTree) -> Result<Extraction> {
        Ok(Self::extract_root(&tree.root()))
    }
}
