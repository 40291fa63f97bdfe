use std::fs;
use std::path::{Path, PathBuf};

use codemap::config::{save_config, CodeMapConfig, OracleConfig};
use codemap::errors::CodeMapError;
use codemap::types::SymbolKind;
use codemap::{format_json, format_markdown, map_codebase, parse_json, CodeMapper};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn offline_mapper(root: &Path) -> CodeMapper {
    CodeMapper::without_synthesis(root, CodeMapConfig::default())
}

fn dirs(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

#[test]
fn test_single_exported_function_with_import() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/hello.ts",
        "import { x } from \"./x\";\n\nexport function hello() {\n  return x;\n}\n",
    );

    let map = offline_mapper(dir.path()).map(&dirs(&["src"])).unwrap();

    assert_eq!(map.files.len(), 1);
    assert_eq!(map.stats.total_files, 1);
    let file = &map.files[0];
    assert_eq!(file.path, "src/hello.ts");
    assert_eq!(file.language, "typescript");
    assert_eq!(file.imports, vec!["./x"]);
    assert_eq!(file.symbols.len(), 1);
    assert_eq!(file.symbols[0].kind, SymbolKind::Function);
    assert_eq!(file.symbols[0].name, "hello");
    assert_eq!(file.symbols[0].signature.as_deref(), Some("()"));
    assert_eq!(file.symbols[0].line, 3);
}

#[test]
fn test_root_with_only_excluded_dirs() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "node_modules/lib/index.js", "export const A = 1;\n");
    write(dir.path(), "dist/bundle.js", "export const B = 2;\n");
    write(dir.path(), ".git/hooks/hook.py", "import os\n");
    write(dir.path(), "__pycache__/mod.py", "import sys\n");

    let map = offline_mapper(dir.path()).map(&dirs(&["."])).unwrap();
    assert!(map.files.is_empty());
    assert_eq!(map.stats.total_files, 0);
    assert!(map.stats.by_language.is_empty());
}

#[test]
fn test_stats_match_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.py", "import os\n");
    write(dir.path(), "b.py", "def run():\n    pass\n");
    write(dir.path(), "c.py", "x = 1\n"); // nothing visible
    write(dir.path(), "web/app.ts", "export const A = 1;\n");
    write(dir.path(), "web/app.js", "export function f() {}\n");
    write(dir.path(), "go/main.go", "package main\n\nfunc Run() {}\n");
    write(dir.path(), "README.md", "# readme\n");

    let map = offline_mapper(dir.path()).map(&dirs(&["."])).unwrap();

    assert_eq!(map.stats.total_files, map.files.len());
    for (language, count) in &map.stats.by_language {
        let actual = map.files.iter().filter(|f| &f.language == language).count();
        assert_eq!(actual, *count, "count for {}", language);
    }
    let paths: Vec<&str> = map.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["a.py", "b.py", "go/main.go", "web/app.js", "web/app.ts"]
    );
    assert_eq!(map.stats.by_language.get("python"), Some(&2));
    assert!(map.files.iter().all(|f| !f.imports.is_empty() || !f.symbols.is_empty()));
}

#[test]
fn test_empty_and_blank_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "empty.py", "");
    write(dir.path(), "blank.ts", "  \n\n\t\n");
    write(dir.path(), "real.py", "import json\n");

    let map = offline_mapper(dir.path()).map(&dirs(&["."])).unwrap();
    assert_eq!(map.files.len(), 1);
    assert_eq!(map.files[0].path, "real.py");
}

#[test]
fn test_symbol_lines_within_file() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "lib.py",
        "import os\n\nLIMIT = 5\n\nclass A:\n    def m(self):\n        pass\n\ndef f():\n    pass",
    );

    let map = offline_mapper(dir.path()).map(&dirs(&["."])).unwrap();
    let line_count = 10;
    for symbol in &map.files[0].symbols {
        assert!(symbol.line >= 1 && symbol.line <= line_count);
        for child in &symbol.children {
            assert!(child.line >= 1 && child.line <= line_count);
        }
    }
}

#[test]
fn test_multiple_scan_dirs_are_deduplicated() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/a.py", "import os\n");
    write(dir.path(), "src/sub/b.py", "import sys\n");

    let map = offline_mapper(dir.path())
        .map(&dirs(&["src", "src/sub", "./src"]))
        .unwrap();
    let paths: Vec<&str> = map.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.py", "src/sub/b.py"]);
}

#[test]
fn test_missing_scan_dir_is_error() {
    let dir = TempDir::new().unwrap();
    let err = offline_mapper(dir.path())
        .map(&dirs(&["does-not-exist"]))
        .unwrap_err();
    assert!(matches!(err, CodeMapError::File { .. }));
}

#[test]
fn test_absolute_scan_dir_outside_root_keeps_its_path() {
    let root = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    write(other.path(), "x.py", "import os\n");

    let map = offline_mapper(root.path())
        .map(&[other.path().to_path_buf()])
        .unwrap();
    assert_eq!(map.files.len(), 1);
    let expected = other.path().join("x.py").to_string_lossy().replace('\\', "/");
    assert_eq!(map.files[0].path, expected);
    assert!(!map.files[0].path.starts_with("//"));
}

#[test]
fn test_exclude_globs_and_max_file_size() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.min.js", "export const A = 1;\n");
    write(dir.path(), "gen/schema.py", "import os\n");
    write(dir.path(), "big.py", &format!("import os\n{}", "# pad\n".repeat(100)));
    write(dir.path(), "small.py", "import os\n");

    let config = CodeMapConfig {
        exclude: vec!["**/*.min.*".to_string(), "gen/**".to_string()],
        max_file_size: 100,
        ..CodeMapConfig::default()
    };
    let map = CodeMapper::without_synthesis(dir.path(), config)
        .map(&dirs(&["."]))
        .unwrap();
    let paths: Vec<&str> = map.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["small.py"]);
}

#[test]
fn test_map_codebase_with_saved_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "svc/main.go", "package main\n\nimport \"fmt\"\n\nfunc Main() {}\n");
    write(dir.path(), "svc/lib.rs", "pub fn lib() {}\n");
    let config = CodeMapConfig {
        oracle: OracleConfig::Disabled,
        ..CodeMapConfig::default()
    };
    save_config(dir.path(), &config).unwrap();

    let map = map_codebase(dir.path(), &dirs(&["svc"])).unwrap();
    assert_eq!(map.stats.total_files, 1);
    assert_eq!(map.files[0].language, "go");
    assert_eq!(map.files[0].imports, vec!["fmt"]);
}

#[test]
fn test_outputs_round_trip_and_render() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "pkg/store.py",
        "import os\n\nclass Store:\n    def get(self, key):\n        pass\n",
    );
    write(dir.path(), "pkg/api.ts", "export interface Api {}\n");

    let map = offline_mapper(dir.path()).map(&dirs(&["pkg"])).unwrap();

    let json = format_json(&map).unwrap();
    assert_eq!(parse_json(&json).unwrap(), map);

    let markdown = format_markdown(&map);
    assert!(markdown.starts_with("# Codebase Map\n\n2 files ("));
    assert!(markdown.contains("## pkg/store.py (python)\nimports: os\n- `class Store`\n  - `method get(self, key)`\n"));
    assert!(markdown.contains("## pkg/api.ts (typescript)\n- `interface Api`\n"));
    assert!(!markdown.contains("rust"));
}
