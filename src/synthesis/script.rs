//! Sandboxed Lua runtime for synthesized extraction rules.
//!
//! A rule is a chunk defining `function extract(root)`. It runs with a private
//! environment holding the node helpers and the pure parts of the standard
//! library, so it can read the syntax tree and nothing else.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mlua::{
    Function, HookTriggers, Lua, LuaOptions, StdLib, Table, UserData, UserDataFields,
    UserDataMethods, UserDataRef, Value, Variadic, VmState,
};
use tree_sitter::Tree;

use crate::errors::{CodeMapError, Result};
use crate::extraction::Extractor;
use crate::parser::SyntaxTree;
use crate::types::{Extraction, Symbol, SymbolKind};

/// Globals copied into a rule's environment.
const SAFE_GLOBALS: &[&str] = &[
    "ipairs", "pairs", "next", "select", "type", "tostring", "tonumber", "error", "pcall",
    "string", "table", "math",
];

/// Instructions a rule may execute per load or per `extract` call.
pub const INSTRUCTION_BUDGET: u64 = 100_000_000;

const HOOK_INTERVAL: u32 = 10_000;

/// Deepest `children` nesting kept from a rule's result. Depth 2 covers
/// module, class, method.
const MAX_SYMBOL_DEPTH: usize = 2;

/// A syntax node handed to Lua: the shared tree plus the named-child path
/// from the root.
struct LuaNode {
    tree: Arc<Tree>,
    source: Arc<str>,
    path: Vec<usize>,
}

impl LuaNode {
    fn root(tree: Arc<Tree>, source: Arc<str>) -> Self {
        Self {
            tree,
            source,
            path: Vec::new(),
        }
    }

    fn get_node(&self) -> mlua::Result<tree_sitter::Node<'_>> {
        let mut node = self.tree.root_node();
        for &index in &self.path {
            node = node
                .named_child(index as _)
                .ok_or_else(|| mlua::Error::external("node not found"))?;
        }
        Ok(node)
    }

    fn child(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            tree: self.tree.clone(),
            source: self.source.clone(),
            path,
        }
    }

    fn text(&self) -> mlua::Result<String> {
        let node = self.get_node()?;
        Ok(self
            .source
            .get(node.byte_range())
            .unwrap_or_default()
            .to_string())
    }

    /// Indices of the named children whose type is one of `kinds`.
    fn children_of_type(&self, kinds: &[String]) -> mlua::Result<Vec<usize>> {
        let node = self.get_node()?;
        Ok((0..node.named_child_count() as usize)
            .filter(|&i| {
                node.named_child(i as _)
                    .map(|c| kinds.iter().any(|k| k == c.kind()))
                    .unwrap_or(false)
            })
            .collect())
    }
}

impl UserData for LuaNode {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("type", |_, this| Ok(this.get_node()?.kind().to_string()));
        fields.add_field_method_get("named_child_count", |_, this| {
            Ok(this.get_node()?.named_child_count() as usize)
        });
        fields.add_field_method_get("start_row", |_, this| {
            Ok(this.get_node()?.start_position().row)
        });
        fields.add_field_method_get("start_column", |_, this| {
            Ok(this.get_node()?.start_position().column)
        });
        fields.add_field_method_get("text", |_, this| this.text());
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // node:named_child(i) -> node or nil, 0-based
        methods.add_method("named_child", |_, this, index: i64| {
            let count = this.get_node()?.named_child_count() as i64;
            if index < 0 || index >= count {
                return Ok(None);
            }
            Ok(Some(this.child(index as usize)))
        });
    }
}

/// Builds the environment table a rule chunk runs in.
fn sandbox_env(lua: &Lua) -> mlua::Result<Table> {
    let env = lua.create_table()?;
    let globals = lua.globals();
    for name in SAFE_GLOBALS {
        env.set(*name, globals.get::<Value>(*name)?)?;
    }

    env.set(
        "node_text",
        lua.create_function(|_, node: Option<UserDataRef<LuaNode>>| match node {
            Some(node) => node.text(),
            None => Ok(String::new()),
        })?,
    )?;
    env.set(
        "first_named_child_of_type",
        lua.create_function(|_, (node, kind): (Option<UserDataRef<LuaNode>>, String)| {
            let Some(node) = node else {
                return Ok(None);
            };
            let first = node.children_of_type(&[kind])?.first().copied();
            Ok(first.map(|i| node.child(i)))
        })?,
    )?;
    env.set(
        "named_children_of_type",
        lua.create_function(
            |_, (node, kinds): (Option<UserDataRef<LuaNode>>, Variadic<String>)| {
                let Some(node) = node else {
                    return Ok(Vec::new());
                };
                Ok(node
                    .children_of_type(&kinds)?
                    .into_iter()
                    .map(|i| node.child(i))
                    .collect::<Vec<_>>())
            },
        )?,
    )?;

    Ok(env)
}

/// A compiled synthesized rule.
pub struct ScriptExtractor {
    language: String,
    // Keeps the state alive alongside the function handle.
    _lua: Lua,
    extract: Function,
    executed: Arc<AtomicU64>,
}

impl ScriptExtractor {
    /// Compiles a rule in a fresh sandboxed Lua state.
    ///
    /// The chunk must define a global `extract` function. `memory_limit` caps
    /// the state's allocations in bytes; loading and every `extract` call are
    /// also held to [`INSTRUCTION_BUDGET`].
    pub fn compile(language: &str, code: &str, memory_limit: usize) -> Result<Self> {
        Self::compile_with_budget(language, code, memory_limit, INSTRUCTION_BUDGET)
    }

    pub fn compile_with_budget(
        language: &str,
        code: &str,
        memory_limit: usize,
        instruction_budget: u64,
    ) -> Result<Self> {
        let compile_failure = |e: mlua::Error| CodeMapError::CompileFailure {
            language: language.to_string(),
            message: e.to_string(),
        };

        let lua = Lua::new_with(
            StdLib::STRING | StdLib::TABLE | StdLib::MATH,
            LuaOptions::new(),
        )
        .map_err(compile_failure)?;
        lua.set_memory_limit(memory_limit).map_err(compile_failure)?;

        let executed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&executed);
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
            move |_, _| {
                let total = counter.fetch_add(HOOK_INTERVAL as u64, Ordering::Relaxed)
                    + HOOK_INTERVAL as u64;
                if total > instruction_budget {
                    return Err(mlua::Error::RuntimeError(format!(
                        "instruction budget of {instruction_budget} exhausted"
                    )));
                }
                Ok(VmState::Continue)
            },
        );

        let env = sandbox_env(&lua).map_err(compile_failure)?;
        lua.load(code)
            .set_name(format!("{language} extractor"))
            .set_environment(env.clone())
            .exec()
            .map_err(compile_failure)?;

        let extract = match env.get::<Value>("extract").map_err(compile_failure)? {
            Value::Function(f) => f,
            _ => {
                return Err(CodeMapError::CompileFailure {
                    language: language.to_string(),
                    message: "chunk does not define an extract function".to_string(),
                })
            }
        };

        Ok(Self {
            language: language.to_string(),
            _lua: lua,
            extract,
            executed,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn extraction_error(&self, message: impl Into<String>) -> CodeMapError {
        CodeMapError::Extraction {
            message: message.into(),
            language: self.language.clone(),
        }
    }
}

impl Extractor for ScriptExtractor {
    fn extract(&self, tree: &SyntaxTree) -> Result<Extraction> {
        let (tree, source) = tree.shared();
        self.executed.store(0, Ordering::Relaxed);
        let result: Value = self
            .extract
            .call(LuaNode::root(tree, source))
            .map_err(|e| self.extraction_error(e.to_string()))?;

        let Value::Table(result) = result else {
            return Err(self.extraction_error(format!(
                "extract returned {} instead of a table",
                result.type_name()
            )));
        };
        extraction_from_table(&result).map_err(|e| self.extraction_error(e.to_string()))
    }
}

/// Converts a rule's `{ symbols = ..., imports = ... }` result.
///
/// Conversion is lenient: entries with an unknown kind or no name are dropped
/// rather than failing the whole file. Nesting deeper than
/// `MAX_SYMBOL_DEPTH` is cut off, which also stops self-referencing tables.
fn extraction_from_table(result: &Table) -> mlua::Result<Extraction> {
    let mut out = Extraction::default();

    if let Value::Table(imports) = result.get::<Value>("imports")? {
        for import in imports.sequence_values::<Value>() {
            if let Some(import) = value_to_string(&import?) {
                out.imports.push(import);
            }
        }
    }

    if let Value::Table(symbols) = result.get::<Value>("symbols")? {
        out.symbols = symbols_from_table(&symbols, 0)?;
    }

    Ok(out)
}

fn symbols_from_table(symbols: &Table, depth: usize) -> mlua::Result<Vec<Symbol>> {
    let mut out = Vec::new();
    for entry in symbols.sequence_values::<Value>() {
        let Value::Table(entry) = entry? else {
            continue;
        };
        let Some(kind) = value_to_string(&entry.get::<Value>("kind")?)
            .and_then(|k| SymbolKind::from_str(&k))
        else {
            continue;
        };
        let Some(name) = value_to_string(&entry.get::<Value>("name")?) else {
            continue;
        };
        let signature = value_to_string(&entry.get::<Value>("signature")?)
            .filter(|s| !s.is_empty());
        let line = match entry.get::<Value>("line")? {
            Value::Integer(n) => n.clamp(1, u32::MAX as i64) as u32,
            Value::Number(n) => n.clamp(1.0, u32::MAX as f64) as u32,
            _ => 1,
        };
        let children = match entry.get::<Value>("children")? {
            Value::Table(children) if kind.is_container() && depth < MAX_SYMBOL_DEPTH => {
                symbols_from_table(&children, depth + 1)?
            }
            _ => Vec::new(),
        };

        out.push(Symbol {
            kind,
            name,
            signature,
            line,
            children,
        });
    }
    Ok(out)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string_lossy().to_string()),
        Value::Integer(n) => Some(n.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;
    use crate::parser::ParserAdapter;
    use crate::synthesis::prompt::REFERENCE_EXTRACTOR;

    const MEMORY_LIMIT: usize = 16 * 1024 * 1024;

    fn parse(extension: &str, source: &str) -> SyntaxTree {
        let registry = LanguageRegistry::new();
        let config = registry.lookup(extension).unwrap();
        ParserAdapter::new().parse(config, source).unwrap()
    }

    #[test]
    fn test_reference_extractor_runs_on_typescript() {
        let tree = parse(
            "ts",
            r#"import { readFile } from "fs";

export function load(path: string): string {
  return path;
}

export class Store {
  get(key: string) {}
  set(key: string, value: string) {}
}

export interface Options {
  verbose: boolean;
}
"#,
        );
        let extractor =
            ScriptExtractor::compile("typescript", REFERENCE_EXTRACTOR, MEMORY_LIMIT).unwrap();
        let out = extractor.extract(&tree).unwrap();

        assert_eq!(out.imports, vec!["fs"]);
        assert_eq!(out.symbols.len(), 3);

        let load = &out.symbols[0];
        assert_eq!(load.kind, SymbolKind::Function);
        assert_eq!(load.name, "load");
        assert_eq!(load.signature.as_deref(), Some("(path: string): string"));
        assert_eq!(load.line, 3);

        let store = &out.symbols[1];
        assert_eq!(store.kind, SymbolKind::Class);
        assert_eq!(store.name, "Store");
        let methods: Vec<&str> = store.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(methods, vec!["get", "set"]);

        assert_eq!(out.symbols[2].kind, SymbolKind::Interface);
        assert_eq!(out.symbols[2].name, "Options");
    }

    #[test]
    fn test_sandbox_hides_unsafe_globals() {
        let code = r#"
function extract(root)
  return {
    symbols = {},
    imports = {
      tostring(io), tostring(os), tostring(require), tostring(load),
      tostring(dofile), tostring(package), tostring(debug),
    },
  }
end
"#;
        let tree = parse("ts", "export const A = 1;\n");
        let extractor = ScriptExtractor::compile("typescript", code, MEMORY_LIMIT).unwrap();
        let out = extractor.extract(&tree).unwrap();
        assert_eq!(out.imports.len(), 7);
        assert!(out.imports.iter().all(|v| v == "nil"), "{:?}", out.imports);
    }

    #[test]
    fn test_compile_failure_on_syntax_error() {
        let err = ScriptExtractor::compile("rust", "function extract(root", MEMORY_LIMIT)
            .err()
            .unwrap();
        assert!(matches!(err, CodeMapError::CompileFailure { .. }));
    }

    #[test]
    fn test_compile_failure_without_extract() {
        let err = ScriptExtractor::compile("rust", "local x = 1", MEMORY_LIMIT)
            .err()
            .unwrap();
        assert!(matches!(err, CodeMapError::CompileFailure { .. }));
    }

    #[test]
    fn test_runtime_error_is_extraction_error() {
        let code = "function extract(root)\n  error(\"boom\")\nend";
        let tree = parse("ts", "export const A = 1;\n");
        let extractor = ScriptExtractor::compile("typescript", code, MEMORY_LIMIT).unwrap();
        let err = extractor.extract(&tree).unwrap_err();
        assert!(matches!(err, CodeMapError::Extraction { .. }));
    }

    #[test]
    fn test_lenient_conversion() {
        let code = r#"
function extract(root)
  return {
    symbols = {
      { kind = "function", name = "kept", line = 1, children = { { kind = "method", name = "x" } } },
      { kind = "macro", name = "dropped", line = 1 },
      { kind = "class", line = 1 },
      { kind = "class", name = "Box", signature = "", line = 2,
        children = { { kind = "method", name = "open", line = 2 } } },
    },
    imports = { "a", 42 },
  }
end
"#;
        let tree = parse("ts", "export const A = 1;\nexport const B = 2;\n");
        let extractor = ScriptExtractor::compile("typescript", code, MEMORY_LIMIT).unwrap();
        let out = extractor.extract(&tree).unwrap();

        assert_eq!(out.imports, vec!["a", "42"]);
        assert_eq!(out.symbols.len(), 2);
        assert_eq!(out.symbols[0].name, "kept");
        assert!(out.symbols[0].children.is_empty());
        assert_eq!(out.symbols[1].name, "Box");
        assert_eq!(out.symbols[1].signature, None);
        assert_eq!(out.symbols[1].children.len(), 1);
    }

    #[test]
    fn test_self_referencing_children_are_cut_off() {
        let code = r#"
function extract(root)
  local s = { kind = "class", name = "A", line = 1 }
  s.children = { s }
  return { symbols = { s }, imports = {} }
end
"#;
        let tree = parse("ts", "export const A = 1;\n");
        let extractor = ScriptExtractor::compile("typescript", code, MEMORY_LIMIT).unwrap();
        let out = extractor.extract(&tree).unwrap();

        assert_eq!(out.symbols.len(), 1);
        let child = &out.symbols[0].children[0];
        assert_eq!(child.name, "A");
        assert_eq!(child.children.len(), 1);
        assert!(child.children[0].children.is_empty());
    }

    #[test]
    fn test_module_class_method_nesting_is_kept() {
        let code = r#"
function extract(root)
  local method = { kind = "method", name = "run", line = 1 }
  local class = { kind = "class", name = "Job", line = 1, children = { method } }
  return { symbols = { { kind = "module", name = "App", line = 1, children = { class } } } }
end
"#;
        let tree = parse("ts", "export const A = 1;\n");
        let extractor = ScriptExtractor::compile("typescript", code, MEMORY_LIMIT).unwrap();
        let out = extractor.extract(&tree).unwrap();
        assert_eq!(out.symbols[0].children[0].children[0].name, "run");
    }

    #[test]
    fn test_endless_extract_hits_instruction_budget() {
        let code = "function extract(root)\n  while true do end\nend";
        let tree = parse("ts", "export const A = 1;\n");
        let extractor =
            ScriptExtractor::compile_with_budget("typescript", code, MEMORY_LIMIT, 1_000_000)
                .unwrap();
        let err = extractor.extract(&tree).unwrap_err();
        assert!(matches!(err, CodeMapError::Extraction { .. }));
        assert!(err.to_string().contains("instruction budget"), "{}", err);
    }

    #[test]
    fn test_endless_chunk_fails_to_compile() {
        let code = "while true do end\nfunction extract(root) return {} end";
        let err = ScriptExtractor::compile_with_budget("typescript", code, MEMORY_LIMIT, 1_000_000)
            .err()
            .unwrap();
        assert!(matches!(err, CodeMapError::CompileFailure { .. }));
    }

    #[test]
    fn test_budget_resets_between_calls() {
        let code = r#"
function extract(root)
  local n = 0
  for i = 1, 100000 do n = n + 1 end
  return { symbols = {}, imports = { tostring(n) } }
end
"#;
        let tree = parse("ts", "export const A = 1;\n");
        let extractor =
            ScriptExtractor::compile_with_budget("typescript", code, MEMORY_LIMIT, 1_000_000)
                .unwrap();
        for _ in 0..10 {
            assert_eq!(extractor.extract(&tree).unwrap().imports, vec!["100000"]);
        }
    }

    #[test]
    fn test_node_api() {
        let code = r#"
function extract(root)
  local first = root:named_child(0)
  local missing = root:named_child(99)
  return {
    symbols = {},
    imports = {
      first.type, tostring(first.start_row), tostring(first.start_column),
      tostring(root.named_child_count), tostring(missing), first.text,
    },
  }
end
"#;
        let tree = parse("ts", "export const A = 1;\n");
        let extractor = ScriptExtractor::compile("typescript", code, MEMORY_LIMIT).unwrap();
        let out = extractor.extract(&tree).unwrap();
        assert_eq!(
            out.imports,
            vec!["export_statement", "0", "0", "1", "nil", "export const A = 1;"]
        );
    }
}
