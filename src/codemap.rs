use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{load_config, CodeMapConfig};
use crate::errors::{CodeMapError, Result};
use crate::extraction::Extractor;
use crate::languages::{ExtractionStrategy, LanguageRegistry};
use crate::parser::ParserAdapter;
use crate::synthesis::{oracle_from_config, GenerationOracle, SynthesisService};
use crate::types::{CodebaseMap, FileMap};
use crate::walker::{discover_files, DiscoveredFile};

/// Central orchestrator: walks the scan directories, parses each file and
/// runs the matching extractor, synthesizing extractors where needed.
///
/// Grammars, compiled rules and failed languages are remembered for the
/// lifetime of the mapper, so mapping again reuses them.
pub struct CodeMapper {
    project_root: PathBuf,
    config: CodeMapConfig,
    registry: LanguageRegistry,
    parser: ParserAdapter,
    synthesis: SynthesisService,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl CodeMapper {
    /// Opens a project with its on-disk configuration and the configured oracle.
    pub fn open(project_root: &Path) -> Result<Self> {
        let config = load_config(project_root)?;
        let oracle = oracle_from_config(&config.oracle, project_root);
        Ok(Self::build(project_root, config, oracle))
    }

    /// Creates a mapper with an explicit configuration and oracle.
    pub fn with_oracle(
        project_root: &Path,
        config: CodeMapConfig,
        oracle: Box<dyn GenerationOracle>,
    ) -> Self {
        Self::build(project_root, config, Some(oracle))
    }

    /// Creates a mapper that never synthesizes; rules already cached on disk
    /// are still used.
    pub fn without_synthesis(project_root: &Path, config: CodeMapConfig) -> Self {
        Self::build(project_root, config, None)
    }

    fn build(
        project_root: &Path,
        config: CodeMapConfig,
        oracle: Option<Box<dyn GenerationOracle>>,
    ) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            synthesis: SynthesisService::new(project_root, config.clone(), oracle),
            config,
            registry: LanguageRegistry::new(),
            parser: ParserAdapter::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config(&self) -> &CodeMapConfig {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

impl CodeMapper {
    /// Maps every known source file under the scan directories.
    ///
    /// Only an unreadable scan directory is an error; problems with a single
    /// file or language are logged and the file is left out.
    pub fn map(&mut self, dirs: &[PathBuf]) -> Result<CodebaseMap> {
        let start = Instant::now();
        let files = discover_files(&self.project_root, dirs, &self.registry, &self.config)?;
        tracing::debug!(count = files.len(), "discovered files");

        let mut maps = Vec::new();
        for file in &files {
            match self.map_file(file, dirs) {
                Ok(Some(file_map)) => maps.push(file_map),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %file.relative, "skipping file: {e}"),
            }
        }

        let map = CodebaseMap::from_files(maps);
        tracing::info!(
            files = map.stats.total_files,
            duration_ms = start.elapsed().as_millis() as u64,
            "mapped codebase"
        );
        Ok(map)
    }

    /// Produces the outline of one file, or `None` when the file is empty,
    /// its language is unavailable, or nothing was extracted.
    fn map_file(&mut self, file: &DiscoveredFile, dirs: &[PathBuf]) -> Result<Option<FileMap>> {
        let Some(language) = self.registry.lookup_path(&file.path) else {
            return Ok(None);
        };

        let source = std::fs::read_to_string(&file.path).map_err(|e| CodeMapError::File {
            message: format!("failed to read file: {}", e),
            path: file.relative.clone(),
        })?;
        if source.trim().is_empty() {
            tracing::debug!(path = %file.relative, "skipping empty file");
            return Ok(None);
        }

        let tree = self.parser.parse(language, &source)?;
        let extraction = match language.strategy {
            ExtractionStrategy::Builtin(extractor) => extractor.extract(&tree)?,
            ExtractionStrategy::Synthesize => {
                let Some(extractor) =
                    self.synthesis
                        .resolve(language, dirs, &self.registry, &mut self.parser)
                else {
                    return Ok(None);
                };
                extractor.extract(&tree)?
            }
        };

        let extraction = extraction.normalized(tree.line_count());
        if extraction.is_empty() {
            return Ok(None);
        }

        Ok(Some(FileMap {
            path: file.relative.clone(),
            language: language.language.to_string(),
            imports: extraction.imports,
            symbols: extraction.symbols,
        }))
    }
}

/// Maps a project using its on-disk configuration.
pub fn map_codebase(project_root: &Path, dirs: &[PathBuf]) -> Result<CodebaseMap> {
    CodeMapper::open(project_root)?.map(dirs)
}
