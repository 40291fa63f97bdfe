use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of symbols an extractor can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Class,
    Type,
    Interface,
    Constant,
    Method,
    Module,
}

#[allow(clippy::should_implement_trait)]
impl SymbolKind {
    /// Returns the string representation of this symbol kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Type => "type",
            SymbolKind::Interface => "interface",
            SymbolKind::Constant => "constant",
            SymbolKind::Method => "method",
            SymbolKind::Module => "module",
        }
    }

    /// Parses a string into a `SymbolKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<SymbolKind> {
        match s {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "type" => Some(SymbolKind::Type),
            "interface" => Some(SymbolKind::Interface),
            "constant" => Some(SymbolKind::Constant),
            "method" => Some(SymbolKind::Method),
            "module" => Some(SymbolKind::Module),
            _ => None,
        }
    }

    /// Whether symbols of this kind may carry nested children.
    pub fn is_container(&self) -> bool {
        matches!(self, SymbolKind::Class | SymbolKind::Module)
    }
}

/// One named, kind-classified declaration found by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    /// Verbatim parameter list (plus return type) text, when the declaration has one.
    pub signature: Option<String>,
    /// 1-based line of the declaration.
    pub line: u32,
    pub children: Vec<Symbol>,
}

impl Symbol {
    /// Creates a symbol with no children.
    pub fn leaf(
        kind: SymbolKind,
        name: impl Into<String>,
        signature: Option<String>,
        line: u32,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            signature,
            line,
            children: Vec::new(),
        }
    }
}

/// Outline of a single source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMap {
    /// Path relative to the project root.
    pub path: String,
    pub language: String,
    pub imports: Vec<String>,
    pub symbols: Vec<Symbol>,
}

/// Aggregate counts for a `CodebaseMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStats {
    pub total_files: usize,
    pub by_language: BTreeMap<String, usize>,
}

/// The structural map of every file that produced an outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodebaseMap {
    pub files: Vec<FileMap>,
    pub stats: MapStats,
}

impl CodebaseMap {
    /// Builds a map from file outlines, sorting them by path and deriving stats.
    pub fn from_files(mut files: Vec<FileMap>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut by_language = BTreeMap::new();
        for file in &files {
            *by_language.entry(file.language.clone()).or_insert(0) += 1;
        }
        Self {
            stats: MapStats {
                total_files: files.len(),
                by_language,
            },
            files,
        }
    }
}

/// What an extractor returns for one syntax tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<String>,
}

impl Extraction {
    /// True when the extractor found neither symbols nor imports.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.imports.is_empty()
    }

    /// Enforces the outline invariants on an extractor's raw output.
    ///
    /// Lines are clamped into `[1, line_count]`, leaf kinds lose their children,
    /// and nameless symbols or blank imports are dropped.
    pub fn normalized(self, line_count: u32) -> Self {
        let max_line = line_count.max(1);
        Self {
            symbols: normalize_symbols(self.symbols, max_line),
            imports: self
                .imports
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }
}

fn normalize_symbols(symbols: Vec<Symbol>, max_line: u32) -> Vec<Symbol> {
    symbols
        .into_iter()
        .filter(|s| !s.name.trim().is_empty())
        .map(|mut s| {
            s.line = s.line.clamp(1, max_line);
            s.children = if s.kind.is_container() {
                normalize_symbols(s.children, max_line)
            } else {
                Vec::new()
            };
            s
        })
        .collect()
}
