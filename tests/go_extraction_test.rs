use codemap::extraction::{Extractor, GoExtractor};
use codemap::languages::LanguageRegistry;
use codemap::parser::ParserAdapter;
use codemap::types::*;

fn extract(source: &str) -> Extraction {
    let registry = LanguageRegistry::new();
    let config = registry.lookup("go").unwrap();
    let tree = ParserAdapter::new().parse(config, source).unwrap();
    GoExtractor.extract(&tree).unwrap()
}

#[test]
fn test_go_extract_imports() {
    let source = r#"package main

import "fmt"

import (
    "os"
    str "strings"
    `path/filepath`
)
"#;
    let result = extract(source);
    assert_eq!(result.imports, vec!["fmt", "os", "strings", "path/filepath"]);
    assert!(result.symbols.is_empty());
}

#[test]
fn test_go_extract_function() {
    let source = r#"package main

// Add adds two numbers.
func Add(a, b int) int {
    return a + b
}

func Split(s string) (string, error) {
    return s, nil
}

func Run() {
}

func helper() {}
"#;
    let result = extract(source);
    let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Add", "Split", "Run"]); // lowercase = unexported

    let add = &result.symbols[0];
    assert_eq!(add.kind, SymbolKind::Function);
    assert_eq!(add.signature.as_deref(), Some("(a, b int) int"));
    assert_eq!(add.line, 4);

    assert_eq!(
        result.symbols[1].signature.as_deref(),
        Some("(s string) (string, error)")
    );
    assert_eq!(result.symbols[2].signature.as_deref(), Some("()"));
}

#[test]
fn test_go_extract_types() {
    let source = r#"package model

type User struct {
    Name string
}

type Reader interface {
    Read(p []byte) (int, error)
}

type (
    ID = string
    internal struct{}
    Count int
)
"#;
    let result = extract(source);
    let types: Vec<(SymbolKind, &str)> = result
        .symbols
        .iter()
        .map(|s| (s.kind, s.name.as_str()))
        .collect();
    assert_eq!(
        types,
        vec![
            (SymbolKind::Type, "User"),
            (SymbolKind::Interface, "Reader"),
            (SymbolKind::Type, "ID"),
            (SymbolKind::Type, "Count"),
        ]
    );
    assert!(result.symbols.iter().all(|s| s.children.is_empty()));
}

#[test]
fn test_go_extract_methods() {
    let source = r#"package server

type Server struct{}

func (s *Server) Start(addr string) error {
    return nil
}

func (s Server) Name() string {
    return ""
}

func (s *Server) stop() {}
"#;
    let result = extract(source);
    let methods: Vec<&Symbol> = result
        .symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Method)
        .collect();
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0].name, "Start");
    assert_eq!(
        methods[0].signature.as_deref(),
        Some("(s *Server) (addr string) error")
    );
    assert_eq!(methods[1].name, "Name");
    assert_eq!(methods[1].signature.as_deref(), Some("(s Server) () string"));
}

#[test]
fn test_go_extract_constants() {
    let source = r#"package config

const MaxSize = 1024

const (
    DefaultHost, DefaultPort = "localhost", 8080
    timeout = 30
)

var Exported = 1
"#;
    let result = extract(source);
    let constants: Vec<(&str, u32)> = result
        .symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Constant)
        .map(|s| (s.name.as_str(), s.line))
        .collect();
    assert_eq!(
        constants,
        vec![("MaxSize", 3), ("DefaultHost", 6), ("DefaultPort", 6)]
    );
    assert_eq!(result.symbols.len(), 3);
}
