/// Tree-sitter based Go outline extractor.
///
/// Go marks exported identifiers by capitalization, so only names starting
/// with an upper-case letter are reported.
use crate::errors::Result;
use crate::extraction::{
    first_named_child_of_type, name_or_anonymous, named_children_of_type, unquote, Extractor,
};
use crate::parser::{SyntaxNode, SyntaxTree};
use crate::types::{Extraction, Symbol, SymbolKind};

/// Extracts the outline of Go source files.
pub struct GoExtractor;

impl GoExtractor {
    pub fn extract_root<N: SyntaxNode>(root: &N) -> Extraction {
        let mut out = Extraction::default();

        for node in root.named_children() {
            match node.kind() {
                "import_declaration" => Self::visit_imports(&mut out, &node),
                "type_declaration" => Self::visit_type_declaration(&mut out, &node),
                "function_declaration" => Self::visit_function(&mut out, &node),
                "method_declaration" => Self::visit_method(&mut out, &node),
                "const_declaration" => Self::visit_const_declaration(&mut out, &node),
                _ => {}
            }
        }

        out
    }

    /// Imports can be `import "fmt"` or `import ( "fmt"; io "io" )`.
    fn visit_imports<N: SyntaxNode>(out: &mut Extraction, node: &N) {
        for child in node.named_children() {
            match child.kind() {
                "import_spec" => Self::visit_single_import(out, &child),
                "import_spec_list" => {
                    for spec in named_children_of_type(&child, &["import_spec"]) {
                        Self::visit_single_import(out, &spec);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_single_import<N: SyntaxNode>(out: &mut Extraction, spec: &N) {
        let path = first_named_child_of_type(spec, "interpreted_string_literal")
            .or_else(|| first_named_child_of_type(spec, "raw_string_literal"));
        if let Some(path) = path {
            out.imports.push(unquote(path.text()));
        }
    }

    /// A type declaration may hold several specs: `type ( A struct{}; B = int )`.
    fn visit_type_declaration<N: SyntaxNode>(out: &mut Extraction, node: &N) {
        for spec in named_children_of_type(node, &["type_spec", "type_alias"]) {
            let name = name_or_anonymous(first_named_child_of_type(&spec, "type_identifier"));
            if !Self::is_exported(&name) {
                continue;
            }
            let kind = if first_named_child_of_type(&spec, "interface_type").is_some() {
                SymbolKind::Interface
            } else {
                SymbolKind::Type
            };
            out.symbols.push(Symbol::leaf(kind, name, None, spec.line()));
        }
    }

    fn visit_function<N: SyntaxNode>(out: &mut Extraction, node: &N) {
        let name = name_or_anonymous(first_named_child_of_type(node, "identifier"));
        if !Self::is_exported(&name) {
            return;
        }
        let signature = Self::extract_signature(node, 0);
        out.symbols.push(Symbol::leaf(
            SymbolKind::Function,
            name,
            signature,
            node.line(),
        ));
    }

    /// Methods stay top-level; the receiver leads the signature.
    fn visit_method<N: SyntaxNode>(out: &mut Extraction, node: &N) {
        let name = name_or_anonymous(first_named_child_of_type(node, "field_identifier"));
        if !Self::is_exported(&name) {
            return;
        }
        let receiver = first_named_child_of_type(node, "parameter_list");
        let signature = match (receiver, Self::extract_signature(node, 1)) {
            (Some(receiver), Some(rest)) => Some(format!("{} {}", receiver.text(), rest)),
            (Some(receiver), None) => Some(receiver.text().to_string()),
            (None, rest) => rest,
        };
        out.symbols.push(Symbol::leaf(
            SymbolKind::Method,
            name,
            signature,
            node.line(),
        ));
    }

    fn visit_const_declaration<N: SyntaxNode>(out: &mut Extraction, node: &N) {
        for spec in named_children_of_type(node, &["const_spec"]) {
            for ident in named_children_of_type(&spec, &["identifier"]) {
                let name = ident.text();
                if Self::is_exported(name) {
                    out.symbols
                        .push(Symbol::leaf(SymbolKind::Constant, name, None, spec.line()));
                }
            }
        }
    }

    /// Parameter list text plus the result type, if any.
    ///
    /// `skip` is the number of parameter lists preceding the parameters
    /// (one for a method receiver).
    fn extract_signature<N: SyntaxNode>(node: &N, skip: usize) -> Option<String> {
        let children: Vec<N> = node
            .named_children()
            .into_iter()
            .filter(|c| c.kind() != "comment")
            .collect();
        let params_index = children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind() == "parameter_list")
            .nth(skip)
            .map(|(i, _)| i)?;
        let params = children[params_index].text();

        match children.get(params_index + 1).filter(|c| c.kind() != "block") {
            Some(result) => Some(format!("{} {}", params, result.text())),
            None => Some(params.to_string()),
        }
    }

    /// Go visibility: an upper-case first character means exported.
    fn is_exported(name: &str) -> bool {
        name.starts_with(|c: char| c.is_uppercase())
    }
}

impl Extractor for GoExtractor {
    fn extract(&self, tree: &SyntaxTree) -> Result<Extraction> {
        Ok(Self::extract_root(&tree.root()))
    }
}
