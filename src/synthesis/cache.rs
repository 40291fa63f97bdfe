//! Memory- and disk-backed store of synthesized extraction rules.
//!
//! Each synthesized language has one file, `<root>/.codemap/extractors/<language>.lua`,
//! holding a provenance header of `--` comments followed by the rule source.
//! Deleting the file forces the rule to be synthesized again.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sha2::{Digest, Sha256};

use crate::config::{get_extractors_dir, write_atomic};
use crate::errors::{CodeMapError, Result};
use crate::synthesis::prompt::{strip_export_boilerplate, strip_leading_comments};
use crate::synthesis::script::ScriptExtractor;

/// Compute the SHA-256 hash of a string, returned as a lowercase hex string.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Comment block written above a persisted rule.
pub fn provenance_header(language: &str, sample_path: &str, sample_hash: &str) -> String {
    format!(
        "--\n\
         -- auto-generated {language} extractor for codemap\n\
         -- generated from: {sample_path}\n\
         -- sample sha256: {sample_hash}\n\
         -- delete this file to regenerate\n\
         --\n\
         -- helpers available: node_text, first_named_child_of_type, named_children_of_type\n\
         --\n\n"
    )
}

/// Compiled rules for this run, plus the languages whose synthesis already failed.
pub struct ExtractorCache {
    dir: PathBuf,
    compiled: HashMap<String, Rc<ScriptExtractor>>,
    failed: HashSet<String>,
}

impl ExtractorCache {
    pub fn new(project_root: &Path) -> Self {
        Self {
            dir: get_extractors_dir(project_root),
            compiled: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    /// Path of the cache file for a language.
    pub fn cache_path(&self, language: &str) -> PathBuf {
        self.dir.join(format!("{}.lua", language))
    }

    /// A rule already compiled during this run.
    pub fn get(&self, language: &str) -> Option<Rc<ScriptExtractor>> {
        self.compiled.get(language).cloned()
    }

    pub fn insert(&mut self, extractor: ScriptExtractor) -> Rc<ScriptExtractor> {
        let extractor = Rc::new(extractor);
        self.compiled
            .insert(extractor.language().to_string(), extractor.clone());
        extractor
    }

    pub fn mark_failed(&mut self, language: &str) {
        self.failed.insert(language.to_string());
    }

    pub fn has_failed(&self, language: &str) -> bool {
        self.failed.contains(language)
    }

    /// Reads and compiles the persisted rule for a language.
    ///
    /// Returns `Ok(None)` when no cache file exists.
    pub fn load_from_disk(
        &self,
        language: &str,
        memory_limit: usize,
    ) -> Result<Option<ScriptExtractor>> {
        let path = self.cache_path(language);
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path).map_err(|e| CodeMapError::File {
            message: format!("failed to read cached extractor: {}", e),
            path: path.display().to_string(),
        })?;
        let code = strip_export_boilerplate(strip_leading_comments(&text));
        ScriptExtractor::compile(language, &code, memory_limit).map(Some)
    }

    /// Writes a rule to disk with its provenance header.
    pub fn persist(
        &self,
        language: &str,
        sample_path: &str,
        sample_source: &str,
        code: &str,
    ) -> Result<PathBuf> {
        let path = self.cache_path(language);
        let contents = format!(
            "{}{}\n",
            provenance_header(language, sample_path, &content_hash(sample_source)),
            code.trim_end()
        );
        write_atomic(&path, &contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RULE: &str = "function extract(root)\n  return { symbols = {}, imports = {} }\nend";

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_persist_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = ExtractorCache::new(dir.path());

        let path = cache
            .persist("rust", "src/lib.rs", "fn main() {}", RULE)
            .unwrap();
        assert_eq!(path, dir.path().join(".codemap/extractors/rust.lua"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("--\n-- auto-generated rust extractor"));
        assert!(text.contains("-- generated from: src/lib.rs"));
        assert!(text.contains(&format!("-- sample sha256: {}", content_hash("fn main() {}"))));
        assert!(text.ends_with("end\n"));

        let loaded = cache.load_from_disk("rust", 1 << 24).unwrap().unwrap();
        assert_eq!(loaded.language(), "rust");
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = ExtractorCache::new(dir.path());
        assert!(cache.load_from_disk("java", 1 << 24).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_compile_failure() {
        let dir = TempDir::new().unwrap();
        let cache = ExtractorCache::new(dir.path());
        fs::create_dir_all(dir.path().join(".codemap/extractors")).unwrap();
        fs::write(cache.cache_path("java"), "-- header\nfunction extract(").unwrap();

        let err = cache.load_from_disk("java", 1 << 24).err().unwrap();
        assert!(matches!(err, CodeMapError::CompileFailure { .. }));
    }

    #[test]
    fn test_failed_languages() {
        let dir = TempDir::new().unwrap();
        let mut cache = ExtractorCache::new(dir.path());
        assert!(!cache.has_failed("zig"));
        cache.mark_failed("zig");
        assert!(cache.has_failed("zig"));
    }
}
