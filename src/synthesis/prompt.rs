//! Request composition and response cleanup for extractor synthesis.

use crate::parser::SyntaxNode;

/// Characters of node text shown per line of a tree dump.
const DUMP_TEXT_CHARS: usize = 80;

/// Marker every accepted response must contain.
pub const EXTRACT_MARKER: &str = "function extract";

/// A worked rule for TypeScript, shown to the oracle as a reference.
pub const REFERENCE_EXTRACTOR: &str = r#"-- Reference: TypeScript extractor
function extract(root)
  local symbols, imports = {}, {}
  for i = 0, root.named_child_count - 1 do
    local node = root:named_child(i)
    local line = node.start_row + 1
    if node.type == "import_statement" then
      local source = first_named_child_of_type(node, "string")
      local fragment = source and first_named_child_of_type(source, "string_fragment")
      if fragment then
        table.insert(imports, fragment.text)
      end
    elseif node.type == "export_statement" then
      local func = first_named_child_of_type(node, "function_declaration")
      local class = first_named_child_of_type(node, "class_declaration")
      local iface = first_named_child_of_type(node, "interface_declaration")
      if func then
        table.insert(symbols, {
          kind = "function",
          name = node_text(first_named_child_of_type(func, "identifier")),
          signature = node_text(first_named_child_of_type(func, "formal_parameters"))
            .. node_text(first_named_child_of_type(func, "type_annotation")),
          line = line,
        })
      elseif class then
        local methods = {}
        local body = first_named_child_of_type(class, "class_body")
        if body then
          for _, method in ipairs(named_children_of_type(body, "method_definition")) do
            table.insert(methods, {
              kind = "method",
              name = node_text(first_named_child_of_type(method, "property_identifier")),
              signature = node_text(first_named_child_of_type(method, "formal_parameters")),
              line = method.start_row + 1,
            })
          end
        end
        table.insert(symbols, {
          kind = "class",
          name = node_text(first_named_child_of_type(class, "type_identifier")),
          line = line,
          children = methods,
        })
      elseif iface then
        table.insert(symbols, {
          kind = "interface",
          name = node_text(first_named_child_of_type(iface, "type_identifier")),
          line = line,
        })
      end
    end
  end
  return { symbols = symbols, imports = imports }
end"#;

/// Renders the named nodes of a tree down to `max_depth`, one per line:
/// `<indent><type> | <first 80 chars of text>`, starting with the root's
/// children at depth 0.
pub fn dump_tree<N: SyntaxNode>(root: &N, max_depth: usize) -> String {
    let mut lines = Vec::new();
    for child in root.named_children() {
        dump_node(&child, 0, max_depth, &mut lines);
    }
    lines.join("\n")
}

fn dump_node<N: SyntaxNode>(node: &N, depth: usize, max_depth: usize, lines: &mut Vec<String>) {
    if depth > max_depth {
        return;
    }
    let text: String = node.text().chars().take(DUMP_TEXT_CHARS).collect();
    lines.push(format!(
        "{}{} | {}",
        "  ".repeat(depth),
        node.kind(),
        text.replace('\n', "\\n")
    ));
    for child in node.named_children() {
        dump_node(&child, depth + 1, max_depth, lines);
    }
}

/// Inputs for one synthesis request.
pub struct PromptInput<'a> {
    pub language: &'a str,
    /// Sample path relative to the project root.
    pub sample_path: &'a str,
    pub tree_dump: &'a str,
    pub source: &'a str,
    pub tree_dump_depth: usize,
    pub source_excerpt_chars: usize,
}

/// Builds the request sent to the generation oracle.
pub fn compose_prompt(input: &PromptInput<'_>) -> String {
    let excerpt: String = input
        .source
        .chars()
        .take(input.source_excerpt_chars)
        .collect();

    format!(
        r#"# Task

Generate a tree-sitter extractor function for **{language}** source files, written in Lua 5.4.

# Syntax Tree

Here is the tree-sitter syntax tree ({depth} levels deep) for a real {language} file ({sample}):

```
{dump}
```

# Source File

```
{excerpt}
```

# Reference Extractor

```lua
{reference}
```

# Requirements

Write a single Lua function called `extract` that:
1. Takes a tree-sitter root node as its only argument
2. Returns `{{ symbols = {{...}}, imports = {{...}} }}`
3. Extracts public/exported functions, classes, types, interfaces, methods, modules, constants
4. Extracts import/require/use statements as plain strings
5. For classes and modules with methods, nests methods as `children`

Symbol shape:
```
{{ kind = "function"|"class"|"type"|"interface"|"constant"|"method"|"module",
  name = string, signature = string or nil, line = integer, children = {{ Symbol... }} }}
```

Node API:
- `node.type` -> string (syntax node type, like "function_declaration")
- `node.named_child_count` -> integer
- `node:named_child(i)` -> node or nil, `i` starts at 0
- `node.start_row` -> integer, 0-based
- `node.text` -> string

Available helpers (already in scope, do NOT declare them):
- `node_text(node)` -> string, "" for nil
- `first_named_child_of_type(node, type)` -> node or nil
- `named_children_of_type(node, type1, type2, ...)` -> array of nodes

Rules:
- Use the node types you see above; they are the actual types for this language
- Walk `root.named_child_count` / `root:named_child(i)`
- Use `node.start_row + 1` for line numbers
- Return empty tables if nothing is found
- For languages with visibility (pub, public, export), only include public symbols
- Only the helpers above and the string, table and math libraries are available
- Keep it under 80 lines

Respond with ONLY the Lua function. No markdown fences, no explanation.
Start with `function extract(root)` and end with `end`.
"#,
        language = input.language,
        depth = input.tree_dump_depth,
        sample = input.sample_path,
        dump = input.tree_dump,
        excerpt = excerpt,
        reference = REFERENCE_EXTRACTOR,
    )
}

/// Removes a surrounding markdown code fence, with or without a language tag.
pub fn strip_fences(response: &str) -> String {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. "lua") on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// Removes a trailing `return extract` or `return { extract = extract }`.
pub fn strip_export_boilerplate(code: &str) -> String {
    let trimmed = code.trim_end();
    let Some((head, last)) = trimmed.rsplit_once('\n') else {
        return trimmed.to_string();
    };
    let compact: String = last.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.trim_end_matches(';');
    if compact == "returnextract" || compact == "return{extract=extract}" {
        head.trim_end().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Drops leading `--` comment lines and blank lines (the cache file header).
pub fn strip_leading_comments(code: &str) -> &str {
    let mut rest = code;
    loop {
        let line_end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let line = rest[..line_end].trim();
        if line_end == 0 || !(line.is_empty() || line.starts_with("--")) {
            return rest;
        }
        rest = &rest[line_end..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_language_tag() {
        let response = "```lua\nfunction extract(root)\nend\n```";
        assert_eq!(strip_fences(response), "function extract(root)\nend");
    }

    #[test]
    fn test_strip_fences_without_fence() {
        assert_eq!(
            strip_fences("  function extract(root) end  "),
            "function extract(root) end"
        );
    }

    #[test]
    fn test_strip_export_boilerplate() {
        let code = "function extract(root)\nend\nreturn extract";
        assert_eq!(strip_export_boilerplate(code), "function extract(root)\nend");

        let code = "function extract(root)\nend\nreturn { extract = extract };\n";
        assert_eq!(strip_export_boilerplate(code), "function extract(root)\nend");

        let code = "function extract(root)\n  return { symbols = {}, imports = {} }\nend";
        assert_eq!(strip_export_boilerplate(code), code);
    }

    #[test]
    fn test_strip_leading_comments() {
        let text = "-- generated\n--\n\nfunction extract(root)\n  -- inner\nend\n";
        assert_eq!(
            strip_leading_comments(text),
            "function extract(root)\n  -- inner\nend\n"
        );
        assert_eq!(strip_leading_comments("-- only\n"), "");
    }

    #[test]
    fn test_reference_extractor_has_marker() {
        assert!(REFERENCE_EXTRACTOR.contains(EXTRACT_MARKER));
    }

    #[test]
    fn test_compose_prompt_truncates_source() {
        let source = "x".repeat(5000);
        let prompt = compose_prompt(&PromptInput {
            language: "rust",
            sample_path: "src/lib.rs",
            tree_dump: "function_item | fn main() {}",
            source: &source,
            tree_dump_depth: 3,
            source_excerpt_chars: 3000,
        });
        assert!(prompt.contains("**rust**"));
        assert!(prompt.contains("src/lib.rs"));
        assert!(prompt.contains("function_item | fn main() {}"));
        assert!(prompt.contains(&"x".repeat(3000)));
        assert!(!prompt.contains(&"x".repeat(3001)));
        assert!(prompt.contains("Keep it under 80 lines"));
    }
}
