mod go_extractor;
mod python_extractor;
mod ruby_extractor;
/// Tree-sitter based outline extraction.
///
/// Built-in extractors are hand-written per language and generic over
/// [`SyntaxNode`]; synthesized extractors (see `crate::synthesis`) satisfy the
/// same [`Extractor`] boundary from a cached rule.
mod typescript_extractor;

pub use go_extractor::GoExtractor;
pub use python_extractor::PythonExtractor;
pub use ruby_extractor::RubyExtractor;
pub use typescript_extractor::TypeScriptExtractor;

use crate::errors::Result;
use crate::parser::{SyntaxNode, SyntaxTree};
use crate::types::Extraction;

/// Placeholder name for declarations whose name node is missing.
pub const ANONYMOUS: &str = "(anonymous)";

/// Maps a parsed file to its symbols and imports.
pub trait Extractor {
    fn extract(&self, tree: &SyntaxTree) -> Result<Extraction>;
}

/// Source text of a node, or an empty string for `None`.
pub fn node_text<N: SyntaxNode>(node: Option<&N>) -> String {
    node.map(|n| n.text().to_string()).unwrap_or_default()
}

/// Finds the first named child of `node` with the given type tag.
pub fn first_named_child_of_type<N: SyntaxNode>(node: &N, kind: &str) -> Option<N> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .find(|child| child.kind() == kind)
}

/// Collects the named children of `node` whose type tag is one of `kinds`.
pub fn named_children_of_type<N: SyntaxNode>(node: &N, kinds: &[&str]) -> Vec<N> {
    node.named_children()
        .into_iter()
        .filter(|child| kinds.contains(&child.kind()))
        .collect()
}

/// Text of an optional name node, falling back to [`ANONYMOUS`].
pub(crate) fn name_or_anonymous<N: SyntaxNode>(node: Option<N>) -> String {
    node.map(|n| n.text().to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// `true` when `name` has at least one letter and no lower-case letters,
/// the convention for constants in languages without a `const` keyword.
pub(crate) fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && !name.chars().any(|c| c.is_lowercase())
}

/// Strips one layer of matching quotes (`"`, `'` or `` ` ``) from a literal.
pub(crate) fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}
