//! On-demand synthesis of extractors for languages without a built-in one.
//!
//! For a language that has a grammar but no hand-written extractor, the
//! service resolves a rule in this order: compiled this run, persisted on
//! disk, freshly generated by the oracle. Generation finds a sample file,
//! sends its syntax tree and source to the oracle, validates the answer,
//! compiles it in a Lua sandbox and persists it. Any failure excludes the
//! language for the rest of the run.

mod cache;
mod oracle;
mod prompt;
mod script;

pub use cache::{content_hash, provenance_header, ExtractorCache};
pub use oracle::{oracle_from_config, CommandOracle, GenerationOracle, HttpOracle};
pub use prompt::{
    compose_prompt, dump_tree, strip_export_boilerplate, strip_fences, PromptInput,
    EXTRACT_MARKER, REFERENCE_EXTRACTOR,
};
pub use script::ScriptExtractor;

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::CodeMapConfig;
use crate::errors::{CodeMapError, Result};
use crate::languages::{LanguageConfig, LanguageRegistry};
use crate::parser::ParserAdapter;
use crate::walker::{find_sample, relative_path};

/// Checks an oracle response and reduces it to the rule source.
pub fn validate_response(language: &str, response: &str) -> Result<String> {
    let code = strip_fences(response);
    if !code.contains(EXTRACT_MARKER) {
        return Err(CodeMapError::InvalidGeneratedCode {
            language: language.to_string(),
            reason: format!("response does not contain `{}`", EXTRACT_MARKER),
        });
    }
    Ok(strip_export_boilerplate(&code))
}

/// Resolves extractors for synthesizable languages, synthesizing them on a
/// cache miss.
pub struct SynthesisService {
    project_root: PathBuf,
    config: CodeMapConfig,
    cache: ExtractorCache,
    /// `None` disables generation; persisted rules are still used.
    oracle: Option<Box<dyn GenerationOracle>>,
}

impl SynthesisService {
    pub fn new(
        project_root: &Path,
        config: CodeMapConfig,
        oracle: Option<Box<dyn GenerationOracle>>,
    ) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            cache: ExtractorCache::new(project_root),
            config,
            oracle,
        }
    }

    pub fn cache(&self) -> &ExtractorCache {
        &self.cache
    }

    /// Returns the extractor for a language, or `None` when the language is
    /// excluded for this run. At most one synthesis is attempted per language.
    pub fn resolve(
        &mut self,
        language: &LanguageConfig,
        dirs: &[PathBuf],
        registry: &LanguageRegistry,
        parser: &mut ParserAdapter,
    ) -> Option<Rc<ScriptExtractor>> {
        let name = language.language;
        if self.cache.has_failed(name) {
            return None;
        }
        if let Some(extractor) = self.cache.get(name) {
            return Some(extractor);
        }

        match self.cache.load_from_disk(name, self.config.script_memory_limit) {
            Ok(Some(extractor)) => {
                tracing::debug!(language = name, "using cached extractor");
                return Some(self.cache.insert(extractor));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(language = name, "ignoring unusable cached extractor: {e}");
            }
        }

        match self.synthesize(language, dirs, registry, parser) {
            Ok(extractor) => Some(self.cache.insert(extractor)),
            Err(e) => {
                tracing::warn!(language = name, "skipping language: {e}");
                self.cache.mark_failed(name);
                None
            }
        }
    }

    /// Generates, validates, compiles and persists a rule for one language.
    fn synthesize(
        &self,
        language: &LanguageConfig,
        dirs: &[PathBuf],
        registry: &LanguageRegistry,
        parser: &mut ParserAdapter,
    ) -> Result<ScriptExtractor> {
        let name = language.language;
        let oracle = self
            .oracle
            .as_ref()
            .ok_or_else(|| CodeMapError::OracleUnavailable {
                message: "synthesis is disabled".to_string(),
            })?;

        let extensions = registry.extensions_for(name);
        let sample = find_sample(&self.project_root, dirs, &extensions, &self.config)
            .ok_or_else(|| CodeMapError::File {
                message: format!("no {} sample file found", name),
                path: self.project_root.display().to_string(),
            })?;
        let sample_relative = relative_path(&self.project_root, &sample);
        let source = fs::read_to_string(&sample).map_err(|e| CodeMapError::File {
            message: format!("failed to read sample: {}", e),
            path: sample_relative.clone(),
        })?;

        let tree = parser.parse(language, &source)?;
        let tree_dump = dump_tree(&tree.root(), self.config.tree_dump_depth);
        let prompt = compose_prompt(&PromptInput {
            language: name,
            sample_path: &sample_relative,
            tree_dump: &tree_dump,
            source: &source,
            tree_dump_depth: self.config.tree_dump_depth,
            source_excerpt_chars: self.config.source_excerpt_chars,
        });

        tracing::info!(language = name, sample = %sample_relative, "generating extractor");
        let response = oracle.generate(&prompt)?;
        let code = validate_response(name, &response)?;

        // Compile before persisting so a broken rule never reaches the cache.
        let extractor = ScriptExtractor::compile(name, &code, self.config.script_memory_limit)?;
        let path = self
            .cache
            .persist(name, &sample_relative, &source, &code)?;
        tracing::info!(
            language = name,
            "cached extractor: {}",
            relative_path(&self.project_root, &path)
        );

        Ok(extractor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_response_strips_fences_and_boilerplate() {
        let response = "```lua\nfunction extract(root)\n  return {}\nend\nreturn extract\n```";
        let code = validate_response("rust", response).unwrap();
        assert_eq!(code, "function extract(root)\n  return {}\nend");
    }

    #[test]
    fn test_validate_response_requires_marker() {
        let err = validate_response("rust", "I cannot help with that.").unwrap_err();
        assert!(matches!(
            err,
            CodeMapError::InvalidGeneratedCode { ref language, .. } if language == "rust"
        ));
    }
}
