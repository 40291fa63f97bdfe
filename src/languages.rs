//! Language registry: file extension to language, grammar and extraction strategy.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tree_sitter::Language;

use crate::extraction::{
    Extractor, GoExtractor, PythonExtractor, RubyExtractor, TypeScriptExtractor,
};

/// Produces a tree-sitter grammar.
pub type GrammarFn = fn() -> Language;

/// How files of a language are turned into an outline.
pub enum ExtractionStrategy {
    /// A hand-written extractor compiled into the crate.
    Builtin(&'static dyn Extractor),
    /// An extractor synthesized on first use and cached on disk.
    Synthesize,
}

impl fmt::Debug for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStrategy::Builtin(_) => f.write_str("Builtin"),
            ExtractionStrategy::Synthesize => f.write_str("Synthesize"),
        }
    }
}

/// Static description of how one file extension is handled.
#[derive(Debug)]
pub struct LanguageConfig {
    /// Extension without the leading dot.
    pub extension: &'static str,
    pub language: &'static str,
    /// `None` when the grammar was not compiled into this build.
    pub grammar: Option<GrammarFn>,
    pub strategy: ExtractionStrategy,
}

impl LanguageConfig {
    pub fn is_builtin(&self) -> bool {
        matches!(self.strategy, ExtractionStrategy::Builtin(_))
    }
}

fn typescript() -> Language {
    tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}

fn tsx() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

fn javascript() -> Language {
    tree_sitter_javascript::LANGUAGE.into()
}

fn python() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn go() -> Language {
    tree_sitter_go::LANGUAGE.into()
}

fn rust() -> Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn java() -> Language {
    tree_sitter_java::LANGUAGE.into()
}

fn scala() -> Language {
    tree_sitter_scala::LANGUAGE.into()
}

fn c() -> Language {
    tree_sitter_c::LANGUAGE.into()
}

fn cpp() -> Language {
    tree_sitter_cpp::LANGUAGE.into()
}

fn c_sharp() -> Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}

fn swift() -> Language {
    tree_sitter_swift::LANGUAGE.into()
}

#[cfg(feature = "lang-ruby")]
const RUBY: Option<GrammarFn> = Some(ruby as GrammarFn);
#[cfg(feature = "lang-ruby")]
fn ruby() -> Language {
    tree_sitter_ruby::LANGUAGE.into()
}
#[cfg(not(feature = "lang-ruby"))]
const RUBY: Option<GrammarFn> = None;

#[cfg(feature = "lang-php")]
const PHP: Option<GrammarFn> = Some(php as GrammarFn);
#[cfg(feature = "lang-php")]
fn php() -> Language {
    tree_sitter_php::LANGUAGE_PHP.into()
}
#[cfg(not(feature = "lang-php"))]
const PHP: Option<GrammarFn> = None;

#[cfg(feature = "lang-bash")]
const BASH: Option<GrammarFn> = Some(bash as GrammarFn);
#[cfg(feature = "lang-bash")]
fn bash() -> Language {
    tree_sitter_bash::LANGUAGE.into()
}
#[cfg(not(feature = "lang-bash"))]
const BASH: Option<GrammarFn> = None;

#[cfg(feature = "lang-lua")]
const LUA: Option<GrammarFn> = Some(lua as GrammarFn);
#[cfg(feature = "lang-lua")]
fn lua() -> Language {
    tree_sitter_lua::LANGUAGE.into()
}
#[cfg(not(feature = "lang-lua"))]
const LUA: Option<GrammarFn> = None;

#[cfg(feature = "lang-zig")]
const ZIG: Option<GrammarFn> = Some(zig as GrammarFn);
#[cfg(feature = "lang-zig")]
fn zig() -> Language {
    tree_sitter_zig::LANGUAGE.into()
}
#[cfg(not(feature = "lang-zig"))]
const ZIG: Option<GrammarFn> = None;

/// Languages with a hand-written extractor.
const BUILTIN: &[(&str, &str, Option<GrammarFn>, &dyn Extractor)] = &[
    ("ts", "typescript", Some(typescript), &TypeScriptExtractor),
    ("tsx", "tsx", Some(tsx), &TypeScriptExtractor),
    ("js", "javascript", Some(javascript), &TypeScriptExtractor),
    ("jsx", "javascript", Some(javascript), &TypeScriptExtractor),
    ("mjs", "javascript", Some(javascript), &TypeScriptExtractor),
    ("cjs", "javascript", Some(javascript), &TypeScriptExtractor),
    ("py", "python", Some(python), &PythonExtractor),
    ("go", "go", Some(go), &GoExtractor),
    ("rb", "ruby", RUBY, &RubyExtractor),
];

/// Languages with a grammar but no hand-written extractor.
const SYNTHESIZABLE: &[(&str, &str, Option<GrammarFn>)] = &[
    ("rs", "rust", Some(rust)),
    ("java", "java", Some(java)),
    ("scala", "scala", Some(scala)),
    ("c", "c", Some(c)),
    ("h", "c", Some(c)),
    ("cpp", "cpp", Some(cpp)),
    ("cc", "cpp", Some(cpp)),
    ("cxx", "cpp", Some(cpp)),
    ("hpp", "cpp", Some(cpp)),
    ("hh", "cpp", Some(cpp)),
    ("cs", "c_sharp", Some(c_sharp)),
    ("swift", "swift", Some(swift)),
    ("php", "php", PHP),
    ("sh", "bash", BASH),
    ("bash", "bash", BASH),
    ("lua", "lua", LUA),
    ("zig", "zig", ZIG),
];

/// Registry of every language the mapper knows about.
///
/// Built-in entries always take precedence over synthesizable ones for the
/// same extension.
pub struct LanguageRegistry {
    builtin: HashMap<&'static str, LanguageConfig>,
    synthesized: HashMap<&'static str, LanguageConfig>,
}

impl LanguageRegistry {
    /// Creates a registry with every built-in and synthesizable language.
    pub fn new() -> Self {
        let builtin = BUILTIN
            .iter()
            .map(|&(extension, language, grammar, extractor)| {
                (
                    extension,
                    LanguageConfig {
                        extension,
                        language,
                        grammar,
                        strategy: ExtractionStrategy::Builtin(extractor),
                    },
                )
            })
            .collect();

        let mut registry = Self {
            builtin,
            synthesized: HashMap::new(),
        };
        for &(extension, language, grammar) in SYNTHESIZABLE {
            registry.register_synthesized(extension, language, grammar);
        }
        registry
    }

    /// Adds a language reachable only through synthesis.
    ///
    /// Returns `false` (and changes nothing visible) when a built-in already
    /// owns the extension.
    pub fn register_synthesized(
        &mut self,
        extension: &'static str,
        language: &'static str,
        grammar: Option<GrammarFn>,
    ) -> bool {
        self.synthesized.insert(
            extension,
            LanguageConfig {
                extension,
                language,
                grammar,
                strategy: ExtractionStrategy::Synthesize,
            },
        );
        !self.builtin.contains_key(extension)
    }

    /// Looks up an extension (without the leading dot).
    pub fn lookup(&self, extension: &str) -> Option<&LanguageConfig> {
        self.builtin
            .get(extension)
            .or_else(|| self.synthesized.get(extension))
    }

    /// Looks up the language of a file path by its extension.
    pub fn lookup_path(&self, path: &Path) -> Option<&LanguageConfig> {
        let extension = path.extension()?.to_str()?;
        self.lookup(extension)
    }

    /// Returns `true` if the file's extension is handled by any strategy.
    pub fn is_known(&self, path: &Path) -> bool {
        self.lookup_path(path).is_some()
    }

    /// Extensions that resolve to the given language, sorted.
    pub fn extensions_for(&self, language: &str) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = self
            .builtin
            .keys()
            .chain(self.synthesized.keys())
            .copied()
            .filter(|ext| self.lookup(ext).map(|c| c.language) == Some(language))
            .collect();
        extensions.sort_unstable();
        extensions.dedup();
        extensions
    }

    /// All language identifiers, sorted and deduplicated.
    pub fn languages(&self) -> Vec<&'static str> {
        let mut languages: Vec<&'static str> = self
            .builtin
            .values()
            .chain(self.synthesized.values())
            .map(|c| c.language)
            .collect();
        languages.sort_unstable();
        languages.dedup();
        languages
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
