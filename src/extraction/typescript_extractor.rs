/// Tree-sitter based TypeScript / TSX / JavaScript outline extractor.
///
/// Only `export`ed declarations are visible; imports and re-exports record
/// their module specifier.
use crate::errors::Result;
use crate::extraction::{first_named_child_of_type, name_or_anonymous, node_text, Extractor};
use crate::parser::{SyntaxNode, SyntaxTree};
use crate::types::{Extraction, Symbol, SymbolKind};

/// Extracts the outline of TypeScript, TSX and JavaScript files.
pub struct TypeScriptExtractor;

impl TypeScriptExtractor {
    /// Walk the root's children and collect imports and exported declarations.
    pub fn extract_root<N: SyntaxNode>(root: &N) -> Extraction {
        let mut out = Extraction::default();

        for node in root.named_children() {
            match node.kind() {
                "import_statement" => {
                    if let Some(source) = Self::module_specifier(&node) {
                        out.imports.push(source);
                    }
                }
                "export_statement" => Self::visit_export(&mut out, &node),
                _ => {}
            }
        }

        out
    }

    /// Handle `export <declaration>` and `export … from "<module>"`.
    fn visit_export<N: SyntaxNode>(out: &mut Extraction, node: &N) {
        // Re-exports name another module, which is a dependency like an import.
        if let Some(source) = Self::reexport_source(node) {
            out.imports.push(source);
            return;
        }

        let Some(decl) = node
            .named_children()
            .into_iter()
            .find(|c| c.kind() != "decorator" && c.kind() != "comment")
        else {
            return;
        };
        let line = node.line();

        let symbol = match decl.kind() {
            "function_declaration" | "generator_function_declaration" => Symbol::leaf(
                SymbolKind::Function,
                name_or_anonymous(first_named_child_of_type(&decl, "identifier")),
                Self::signature(&decl),
                line,
            ),
            "class_declaration" | "abstract_class_declaration" => Symbol {
                kind: SymbolKind::Class,
                name: name_or_anonymous(Self::type_name(&decl)),
                signature: None,
                line,
                children: Self::class_methods(&decl),
            },
            "interface_declaration" => Symbol::leaf(
                SymbolKind::Interface,
                name_or_anonymous(Self::type_name(&decl)),
                None,
                line,
            ),
            "type_alias_declaration" | "enum_declaration" => Symbol::leaf(
                SymbolKind::Type,
                name_or_anonymous(Self::type_name(&decl)),
                None,
                line,
            ),
            "lexical_declaration" | "variable_declaration" => {
                match Self::variable_symbol(&decl, line) {
                    Some(symbol) => symbol,
                    None => return,
                }
            }
            _ => return,
        };
        out.symbols.push(symbol);
    }

    /// `export { a } from "m"`, `export * as ns from "m"` and `export * from "m"`.
    /// A bare string elsewhere, as in `export default "m"`, is a value.
    fn reexport_source<N: SyntaxNode>(node: &N) -> Option<String> {
        let has_clause = node
            .named_children()
            .iter()
            .any(|c| matches!(c.kind(), "export_clause" | "namespace_export"));
        let star = node
            .text()
            .strip_prefix("export")
            .is_some_and(|rest| rest.trim_start().starts_with('*'));
        if has_clause || star {
            Self::module_specifier(node)
        } else {
            None
        }
    }

    /// The string fragment of a statement's module source, if it has one.
    fn module_specifier<N: SyntaxNode>(node: &N) -> Option<String> {
        let source = first_named_child_of_type(node, "string")?;
        let fragment = first_named_child_of_type(&source, "string_fragment");
        Some(match fragment {
            Some(fragment) => fragment.text().to_string(),
            None => crate::extraction::unquote(source.text()),
        })
    }

    /// Type declarations use `type_identifier` in TypeScript and `identifier`
    /// in JavaScript.
    fn type_name<N: SyntaxNode>(decl: &N) -> Option<N> {
        first_named_child_of_type(decl, "type_identifier")
            .or_else(|| first_named_child_of_type(decl, "identifier"))
    }

    /// Parameter list text followed by the return type annotation, if any.
    fn signature<N: SyntaxNode>(func: &N) -> Option<String> {
        let params = first_named_child_of_type(func, "formal_parameters")?;
        let ret = first_named_child_of_type(func, "type_annotation");
        Some(format!("{}{}", params.text(), node_text(ret.as_ref())))
    }

    /// `export const x = …`: a function when bound to an arrow function or
    /// function expression, otherwise a constant.
    fn variable_symbol<N: SyntaxNode>(decl: &N, line: u32) -> Option<Symbol> {
        let declarator = first_named_child_of_type(decl, "variable_declarator")?;
        let name = name_or_anonymous(first_named_child_of_type(&declarator, "identifier"));
        let function_value = declarator.named_children().into_iter().find(|c| {
            matches!(
                c.kind(),
                "arrow_function" | "function_expression" | "function"
            )
        });

        Some(match function_value {
            Some(func) => Symbol::leaf(SymbolKind::Function, name, Self::signature(&func), line),
            None => Symbol::leaf(SymbolKind::Constant, name, None, line),
        })
    }

    /// Methods declared directly in a class body.
    fn class_methods<N: SyntaxNode>(class: &N) -> Vec<Symbol> {
        let Some(body) = first_named_child_of_type(class, "class_body") else {
            return Vec::new();
        };

        body.named_children()
            .into_iter()
            .filter(|child| child.kind() == "method_definition")
            .filter_map(|method| {
                let name = first_named_child_of_type(&method, "property_identifier")
                    .or_else(|| first_named_child_of_type(&method, "private_property_identifier"))?;
                Some(Symbol::leaf(
                    SymbolKind::Method,
                    name.text(),
                    Self::signature(&method),
                    method.line(),
                ))
            })
            .collect()
    }
}

impl Extractor for TypeScriptExtractor {
    fn extract(&self, tree: &SyntaxTree) -> Result<Extraction> {
        Ok(Self::extract_root(&tree.root()))
    }
}
