/// Tree-sitter based Python outline extractor.
use crate::errors::Result;
use crate::extraction::{
    first_named_child_of_type, is_constant_name, name_or_anonymous, named_children_of_type,
    Extractor,
};
use crate::parser::{SyntaxNode, SyntaxTree};
use crate::types::{Extraction, Symbol, SymbolKind};

/// Extracts the outline of Python modules.
///
/// Python has no export marker, so a leading underscore marks a top-level
/// name as private.
pub struct PythonExtractor;

impl PythonExtractor {
    pub fn extract_root<N: SyntaxNode>(root: &N) -> Extraction {
        let mut out = Extraction::default();

        for node in root.named_children() {
            match node.kind() {
                // import os, sys as system
                "import_statement" => {
                    for name in named_children_of_type(&node, &["dotted_name", "aliased_import"]) {
                        let target = if name.kind() == "aliased_import" {
                            first_named_child_of_type(&name, "dotted_name")
                        } else {
                            Some(name)
                        };
                        if let Some(target) = target {
                            out.imports.push(target.text().to_string());
                        }
                    }
                }
                // from X import Y / from . import Y
                "import_from_statement" => {
                    let module = first_named_child_of_type(&node, "relative_import")
                        .or_else(|| first_named_child_of_type(&node, "dotted_name"));
                    if let Some(module) = module {
                        out.imports.push(module.text().to_string());
                    }
                }
                "class_definition" | "function_definition" | "decorated_definition" => {
                    if let Some(symbol) = Self::definition(&node, false) {
                        if !symbol.name.starts_with('_') {
                            out.symbols.push(symbol);
                        }
                    }
                }
                // FOO = ...
                "expression_statement" => {
                    if let Some(symbol) = Self::constant(&node) {
                        out.symbols.push(symbol);
                    }
                }
                _ => {}
            }
        }

        out
    }

    /// Builds a symbol for a class or function definition, unwrapping
    /// decorators. Functions nested in a class body are methods.
    fn definition<N: SyntaxNode>(node: &N, in_class: bool) -> Option<Symbol> {
        let node = if node.kind() == "decorated_definition" {
            node.named_children()
                .into_iter()
                .find(|c| matches!(c.kind(), "class_definition" | "function_definition"))?
        } else {
            node.clone()
        };

        let name = name_or_anonymous(first_named_child_of_type(&node, "identifier"));
        match node.kind() {
            "class_definition" => {
                let bases = first_named_child_of_type(&node, "argument_list")
                    .map(|args| args.text().to_string());
                let children = first_named_child_of_type(&node, "block")
                    .map(|block| {
                        block
                            .named_children()
                            .iter()
                            .filter(|c| {
                                matches!(c.kind(), "function_definition" | "decorated_definition")
                            })
                            .filter_map(|c| Self::definition(c, true))
                            .filter(|s| s.kind == SymbolKind::Method)
                            .collect()
                    })
                    .unwrap_or_default();
                Some(Symbol {
                    kind: SymbolKind::Class,
                    name,
                    signature: bases,
                    line: node.line(),
                    children,
                })
            }
            "function_definition" => {
                let kind = if in_class {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                Some(Symbol::leaf(kind, name, Self::signature(&node), node.line()))
            }
            _ => None,
        }
    }

    /// `(params) -> return_type`, verbatim.
    fn signature<N: SyntaxNode>(func: &N) -> Option<String> {
        let params = first_named_child_of_type(func, "parameters")?;
        Some(match first_named_child_of_type(func, "type") {
            Some(ret) => format!("{} -> {}", params.text(), ret.text()),
            None => params.text().to_string(),
        })
    }

    /// A top-level assignment to an all-upper-case identifier.
    fn constant<N: SyntaxNode>(statement: &N) -> Option<Symbol> {
        let assignment = first_named_child_of_type(statement, "assignment")?;
        let left = assignment.named_child(0)?;
        if left.kind() != "identifier"
            || left.text().starts_with('_')
            || !is_constant_name(left.text())
        {
            return None;
        }
        Some(Symbol::leaf(
            SymbolKind::Constant,
            left.text(),
            None,
            statement.line(),
        ))
    }
}

impl Extractor for PythonExtractor {
    fn extract(&self, tree: &SyntaxTree) -> Result<Extraction> {
        Ok(Self::extract_root(&tree.root()))
    }
}
