use crate::errors::Result;
use crate::types::{CodebaseMap, Symbol};

/// Formats a `CodebaseMap` as a Markdown outline.
///
/// The output opens with a per-language file count (most files first), then
/// one section per file listing its imports and symbols, with methods nested
/// one level under their class or module.
pub fn format_markdown(map: &CodebaseMap) -> String {
    let mut lines: Vec<String> = vec!["# Codebase Map".to_string(), String::new()];

    let mut by_language: Vec<(&String, &usize)> = map.stats.by_language.iter().collect();
    by_language.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let counts: Vec<String> = by_language
        .iter()
        .map(|(language, count)| format!("{}: {}", language, count))
        .collect();
    lines.push(format!(
        "{} files ({})",
        map.stats.total_files,
        counts.join(", ")
    ));
    lines.push(String::new());

    for file in &map.files {
        lines.push(format!("## {} ({})", file.path, file.language));

        if !file.imports.is_empty() {
            lines.push(format!("imports: {}", file.imports.join(", ")));
        }

        for symbol in &file.symbols {
            lines.push(format!("- `{}`", symbol_label(symbol)));
            for child in &symbol.children {
                lines.push(format!("  - `{}`", symbol_label(child)));
            }
        }

        lines.push(String::new());
    }

    lines.join("\n")
}

/// `kind name<signature>`, the signature appended verbatim.
fn symbol_label(symbol: &Symbol) -> String {
    format!(
        "{} {}{}",
        symbol.kind.as_str(),
        symbol.name,
        symbol.signature.as_deref().unwrap_or("")
    )
}

/// Serializes a `CodebaseMap` as pretty-printed JSON.
pub fn format_json(map: &CodebaseMap) -> Result<String> {
    Ok(serde_json::to_string_pretty(map)?)
}

/// Reads a `CodebaseMap` back from its JSON form.
pub fn parse_json(json: &str) -> Result<CodebaseMap> {
    Ok(serde_json::from_str(json)?)
}
