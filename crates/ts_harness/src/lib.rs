use anyhow::Result;
use protocol::{EdgeType, Language, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol};
use tree_sitter::{Node, Parser};

pub struct TypeScriptHarness {
    ts_parser: Parser,
    tsx_parser: Parser,
    js_parser: Parser,
}

impl TypeScriptHarness {
    pub fn new() -> Result<Self> {
        let mut ts_parser = Parser::new();
        ts_parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?;

        let mut tsx_parser = Parser::new();
        tsx_parser.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())?;

        let mut js_parser = Parser::new();
        js_parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;

        Ok(Self { ts_parser, tsx_parser, js_parser })
    }

    /// Selects the TypeScript, TSX, or JavaScript grammar by extension —
    /// `.ts`/`.tsx` files previously always fell back to the JavaScript
    /// grammar, which silently drops type annotations and interfaces.
    pub fn parse(
        &mut self,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        content: &str,
    ) -> Result<ParseResult> {
        let (parser, lang) = if file_path.ends_with(".tsx") {
            (&mut self.tsx_parser, Language::TypeScript)
        } else if file_path.ends_with(".ts") {
            (&mut self.ts_parser, Language::TypeScript)
        } else {
            (&mut self.js_parser, Language::JavaScript)
        };

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter failed to produce a tree"))?;

        let mut result = ParseResult::tree_sitter();
        let root = tree.root_node();
        extract_symbols(root, content, project_id, language_id, file_path, lang, None, &mut result);
        extract_imports(root, content, project_id, file_path, &mut result);
        Ok(result)
    }
}

fn extract_symbols(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    lang: Language,
    parent_qname: Option<&str>,
    out: &mut ParseResult,
) {
    match node.kind() {
        "function_declaration" | "function_expression" | "arrow_function" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Function, file_path, node);
                symbol.is_exported = is_exported(node);
                symbol.is_async = has_async_keyword(node, source);
                symbol.parent_scope = parent_qname.map(str::to_string);
                if is_react_component(&name, node) {
                    symbol.language_features = serde_json::json!({ "isReactComponent": true });
                }
                out.symbols.push(symbol);
                walk_children(node, source, project_id, language_id, file_path, lang, Some(&qualified_name), out);
                return;
            }
        }
        "class_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Class, file_path, node);
                symbol.is_exported = is_exported(node);
                symbol.parent_scope = parent_qname.map(str::to_string);

                if let Some(heritage) = find_child_kind(node, "class_heritage") {
                    for clause in heritage.children(&mut heritage.walk()) {
                        if clause.kind() == "extends_clause" {
                            if let Some(base) = clause.child(1) {
                                out.relationships.push(UniversalRelationship::new(
                                    project_id,
                                    qualified_name.clone(),
                                    node_text(base, source),
                                    EdgeType::Inherits,
                                ));
                            }
                        } else if clause.kind() == "implements_clause" {
                            for t in clause.children(&mut clause.walk()) {
                                if t.kind() == "type_identifier" {
                                    out.relationships.push(UniversalRelationship::new(
                                        project_id,
                                        qualified_name.clone(),
                                        node_text(t, source),
                                        EdgeType::Implements,
                                    ));
                                }
                            }
                        }
                    }
                }

                out.symbols.push(symbol);

                if let Some(body) = node.child_by_field_name("body") {
                    for child in body.children(&mut body.walk()) {
                        if child.kind() == "method_definition" {
                            extract_method(child, source, project_id, language_id, file_path, lang, &qualified_name, out);
                        }
                    }
                }
                return;
            }
        }
        "variable_declarator" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(name_node, source);
                let is_arrow_fn = node
                    .child_by_field_name("value")
                    .map(|v| v.kind() == "arrow_function")
                    .unwrap_or(false);
                let kind = if is_arrow_fn { SymbolKind::Function } else { SymbolKind::Variable };
                let qualified_name = qname(parent_qname, &name);
                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
                symbol.parent_scope = parent_qname.map(str::to_string);
                out.symbols.push(symbol);

                if is_arrow_fn {
                    if let Some(value) = node.child_by_field_name("value") {
                        walk_children(value, source, project_id, language_id, file_path, lang, Some(&qualified_name), out);
                    }
                }
                return;
            }
        }
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                let callee_name = node_text(func, source);
                if let Some(caller) = parent_qname {
                    let mut rel = UniversalRelationship::new(project_id, caller, callee_name, EdgeType::Calls);
                    rel.context_line = Some(func.start_position().row as u32 + 1);
                    out.relationships.push(rel);
                }
            }
        }
        _ => {}
    }

    walk_children(node, source, project_id, language_id, file_path, lang, parent_qname, out);
}

fn walk_children(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    lang: Language,
    parent_qname: Option<&str>,
    out: &mut ParseResult,
) {
    for child in node.children(&mut node.walk()) {
        extract_symbols(child, source, project_id, language_id, file_path, lang, parent_qname, out);
    }
}

fn extract_method(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    lang: Language,
    class_qname: &str,
    out: &mut ParseResult,
) {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = node_text(name_node, source);
        let qualified_name = qname(Some(class_qname), &name);
        let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Method, file_path, node);
        symbol.parent_scope = Some(class_qname.to_string());
        symbol.is_async = has_async_keyword(node, source);
        out.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            walk_children(body, source, project_id, language_id, file_path, lang, Some(&qualified_name), out);
        }
    }
}

fn extract_imports(node: Node, source: &str, project_id: i64, file_path: &str, out: &mut ParseResult) {
    for child in node.children(&mut node.walk()) {
        if matches!(child.kind(), "import_statement" | "export_statement") {
            if let Some(source_node) = child.child_by_field_name("source") {
                let import_path = node_text(source_node, source);
                let import_path = import_path.trim_matches(|c| c == '\'' || c == '"');
                let resolved = resolve_import_path(file_path, import_path);
                out.relationships
                    .push(UniversalRelationship::new(project_id, file_path, resolved, EdgeType::Imports));
            }
        }
    }
}

fn resolve_import_path(current_file: &str, import_path: &str) -> String {
    if import_path.starts_with("./") || import_path.starts_with("../") {
        let current_dir = std::path::Path::new(current_file).parent().unwrap_or(std::path::Path::new(""));
        current_dir.join(import_path).to_string_lossy().to_string()
    } else {
        import_path.to_string()
    }
}

fn symbol_at(
    project_id: i64,
    language_id: i64,
    name: &str,
    qualified_name: &str,
    kind: SymbolKind,
    file_path: &str,
    node: Node,
) -> UniversalSymbol {
    let mut symbol = UniversalSymbol::new(
        project_id,
        language_id,
        name,
        qualified_name,
        kind,
        file_path,
        node.start_position().row as u32 + 1,
        node.start_position().column as u32,
    );
    symbol.end_line = Some(node.end_position().row as u32 + 1);
    symbol
}

/// A component if its name is PascalCase and its body returns JSX anywhere —
/// matches the convention React itself relies on (components are capitalized
/// so JSX can tell them apart from host elements).
fn is_react_component(name: &str, node: Node) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false) && returns_jsx(node)
}

fn returns_jsx(node: Node) -> bool {
    if matches!(node.kind(), "jsx_element" | "jsx_self_closing_element" | "jsx_fragment") {
        return true;
    }
    node.children(&mut node.walk()).any(returns_jsx)
}

fn is_exported(node: Node) -> bool {
    node.parent().map(|p| p.kind() == "export_statement").unwrap_or(false)
}

fn has_async_keyword(node: Node, source: &str) -> bool {
    node_text(node, source).trim_start().starts_with("async")
}

fn find_child_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    node.children(&mut node.walk()).find(|c| c.kind() == kind)
}

fn qname(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
    }
}

fn node_text(node: Node, source: &str) -> String {
    source.get(node.byte_range()).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_ts_files_use_the_typescript_grammar() {
        let mut harness = TypeScriptHarness::new().unwrap();
        let src = "interface Point { x: number; y: number; }\nfunction add(a: number, b: number): number { return a + b; }\n";
        let result = harness.parse(1, 1, "math.ts", src).unwrap();
        assert!(result.symbols.iter().any(|s| s.name == "add" && s.kind == SymbolKind::Function));
    }

    #[test]
    fn class_with_methods_produces_method_symbols_with_parent_scope() {
        let mut harness = TypeScriptHarness::new().unwrap();
        let src = "class Calculator {\n  add(a, b) { return a + b; }\n  sub(a, b) { return a - b; }\n}\n";
        let result = harness.parse(1, 1, "calculator.ts", src).unwrap();
        let methods: Vec<_> = result.symbols.iter().filter(|s| s.kind == SymbolKind::Method).collect();
        assert_eq!(methods.len(), 2);
        assert!(methods.iter().all(|m| m.parent_scope.as_deref() == Some("Calculator")));
    }

    #[test]
    fn relative_imports_resolve_against_the_importing_file() {
        let mut harness = TypeScriptHarness::new().unwrap();
        let src = "import { Widget } from './widget';\n";
        let result = harness.parse(1, 1, "components/index.ts", src).unwrap();
        let import = result.relationships.iter().find(|r| r.relationship_type == EdgeType::Imports).unwrap();
        assert_eq!(import.to_name, "components/widget");
    }

    #[test]
    fn jsx_extension_uses_javascript_grammar() {
        let mut harness = TypeScriptHarness::new().unwrap();
        let src = "function Greeter() { return 1; }\n";
        let result = harness.parse(1, 1, "greeter.jsx", src).unwrap();
        assert!(result.symbols.iter().any(|s| s.name == "Greeter"));
    }

    #[test]
    fn pascal_case_function_returning_jsx_is_flagged_as_react_component() {
        let mut harness = TypeScriptHarness::new().unwrap();
        let src = "function TerrainViewer() { return <div/>; }\n";
        let result = harness.parse(1, 1, "terrain_viewer.tsx", src).unwrap();
        let symbol = result.symbols.iter().find(|s| s.name == "TerrainViewer").unwrap();
        assert_eq!(symbol.language_features["isReactComponent"], true);
    }

    #[test]
    fn lowercase_function_returning_jsx_is_not_flagged() {
        let mut harness = TypeScriptHarness::new().unwrap();
        let src = "function widget() { return <div/>; }\n";
        let result = harness.parse(1, 1, "widget.tsx", src).unwrap();
        let symbol = result.symbols.iter().find(|s| s.name == "widget").unwrap();
        assert_eq!(symbol.language_features, serde_json::Value::Null);
    }
}
