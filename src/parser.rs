//! Parser adapter: grammar loading and the syntax node capability interface.
//!
//! Extractors never touch `tree_sitter` directly. They consume the
//! [`SyntaxNode`] trait, which exposes exactly what an outline needs: a type
//! tag, a start position, indexed access to named children and the node's text.

use std::collections::HashMap;
use std::sync::Arc;

use tree_sitter::{Language, Parser, Tree};

use crate::errors::{CodeMapError, Result};
use crate::languages::LanguageConfig;

/// Zero-based row and column of a node's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

/// The capabilities an extractor may use on a syntax tree node.
pub trait SyntaxNode: Clone {
    /// Grammar-specific type tag, e.g. `"function_declaration"`.
    fn kind(&self) -> &str;

    fn start_position(&self) -> Position;

    fn named_child_count(&self) -> usize;

    /// Returns the named child at `index` (0-based), if any.
    fn named_child(&self, index: usize) -> Option<Self>;

    /// Source text spanned by the node.
    fn text(&self) -> &str;

    /// 1-based line of the node's first character.
    fn line(&self) -> u32 {
        self.start_position().row as u32 + 1
    }

    /// All named children, in source order.
    fn named_children(&self) -> Vec<Self> {
        (0..self.named_child_count())
            .filter_map(|i| self.named_child(i))
            .collect()
    }
}

/// A tree-sitter node paired with the source it was parsed from.
#[derive(Clone, Copy)]
pub struct TsNode<'a> {
    node: tree_sitter::Node<'a>,
    source: &'a str,
}

impl<'a> TsNode<'a> {
    pub fn new(node: tree_sitter::Node<'a>, source: &'a str) -> Self {
        Self { node, source }
    }

    /// The underlying tree-sitter node.
    pub fn inner(&self) -> tree_sitter::Node<'a> {
        self.node
    }
}

impl SyntaxNode for TsNode<'_> {
    fn kind(&self) -> &str {
        self.node.kind()
    }

    fn start_position(&self) -> Position {
        let point = self.node.start_position();
        Position {
            row: point.row,
            column: point.column,
        }
    }

    fn named_child_count(&self) -> usize {
        self.node.named_child_count() as usize
    }

    fn named_child(&self, index: usize) -> Option<Self> {
        self.node.named_child(index as _).map(|node| TsNode {
            node,
            source: self.source,
        })
    }

    fn text(&self) -> &str {
        self.source.get(self.node.byte_range()).unwrap_or("")
    }

    fn named_children(&self) -> Vec<Self> {
        let mut cursor = self.node.walk();
        self.node
            .named_children(&mut cursor)
            .map(|node| TsNode {
                node,
                source: self.source,
            })
            .collect()
    }
}

/// A parsed file. Tree and source are reference counted so a synthesized
/// extractor can hold nodes for the duration of a call.
pub struct SyntaxTree {
    tree: Arc<Tree>,
    source: Arc<str>,
    language: String,
}

impl SyntaxTree {
    /// Root node of the tree.
    pub fn root(&self) -> TsNode<'_> {
        TsNode::new(self.tree.root_node(), &self.source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Language identifier the tree was parsed with.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of lines in the source (at least 1).
    pub fn line_count(&self) -> u32 {
        self.source.lines().count().max(1) as u32
    }

    pub(crate) fn shared(&self) -> (Arc<Tree>, Arc<str>) {
        (self.tree.clone(), self.source.clone())
    }
}

/// Loads each grammar at most once and reuses a single parser.
pub struct ParserAdapter {
    parser: Parser,
    /// Loaded grammars by language; `None` records a grammar that failed to load.
    grammars: HashMap<&'static str, Option<Language>>,
}

impl ParserAdapter {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            grammars: HashMap::new(),
        }
    }

    /// Returns the grammar for a language, loading it on first use.
    pub fn load_grammar(&mut self, config: &LanguageConfig) -> Result<Language> {
        if let Some(cached) = self.grammars.get(config.language) {
            return cached.clone().ok_or_else(|| missing_grammar(config, "not compiled in"));
        }

        let loaded = match config.grammar {
            Some(grammar) => {
                let language = grammar();
                match self.parser.set_language(&language) {
                    Ok(()) => Some(language),
                    Err(e) => {
                        tracing::warn!(language = config.language, "grammar rejected: {e}");
                        None
                    }
                }
            }
            None => None,
        };
        self.grammars.insert(config.language, loaded.clone());
        loaded.ok_or_else(|| missing_grammar(config, "not compiled in or incompatible"))
    }

    /// Returns `true` if the language's grammar is available.
    pub fn has_grammar(&mut self, config: &LanguageConfig) -> bool {
        self.load_grammar(config).is_ok()
    }

    /// Parses source text with the language's grammar.
    pub fn parse(&mut self, config: &LanguageConfig, source: &str) -> Result<SyntaxTree> {
        let language = self.load_grammar(config)?;
        self.parser
            .set_language(&language)
            .map_err(|e| missing_grammar(config, &e.to_string()))?;
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| CodeMapError::Parse {
                message: "tree-sitter parse returned None".to_string(),
                language: config.language.to_string(),
            })?;

        Ok(SyntaxTree {
            tree: Arc::new(tree),
            source: Arc::from(source),
            language: config.language.to_string(),
        })
    }
}

impl Default for ParserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_grammar(config: &LanguageConfig, message: &str) -> CodeMapError {
    CodeMapError::MissingGrammar {
        language: config.language.to_string(),
        message: message.to_string(),
    }
}
