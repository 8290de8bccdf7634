use anyhow::Result;
use protocol::{EdgeType, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol};
use tree_sitter::{Node, Parser};

pub struct GoHarness {
    parser: Parser,
}

impl GoHarness {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter failed to produce a tree"))?;

        let root = tree.root_node();
        let package_name = package_name(root, content);
        let mut result = ParseResult::tree_sitter();
        extract(root, content, project_id, language_id, file_path, &package_name, &mut result);
        extract_imports(root, content, project_id, file_path, &mut result);
        Ok(result)
    }
}

/// Reads the actual `package` clause rather than guessing from the parent
/// directory name (which is wrong whenever the directory doesn't match the
/// declared package, e.g. `internal/` layouts or `package main` mixed with
/// library packages in the same tree).
fn package_name(root: Node, source: &str) -> String {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "package_clause" {
            if let Some(ident) = child.children(&mut child.walk()).find(|c| c.kind() == "package_identifier") {
                return text(ident, source);
            }
        }
    }
    "main".to_string()
}

fn extract(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    package: &str,
    out: &mut ParseResult,
) {
    match node.kind() {
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = format!("{package}.{name}");
                let mut symbol =
                    symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Function, file_path, node);
                symbol.is_exported = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
                symbol.namespace = Some(package.to_string());
                out.symbols.push(symbol);

                if let Some(body) = node.child_by_field_name("body") {
                    collect_calls(body, source, project_id, &qualified_name, out);
                }
                return;
            }
        }
        "method_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let receiver_type = node
                    .child_by_field_name("receiver")
                    .and_then(|recv| recv.child_by_field_name("type"))
                    .map(|t| receiver_type_name(t, source))
                    .unwrap_or_default();

                let qualified_name = if receiver_type.is_empty() {
                    format!("{package}.{name}")
                } else {
                    format!("{package}.{receiver_type}.{name}")
                };
                let mut symbol =
                    symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Method, file_path, node);
                symbol.is_exported = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
                symbol.namespace = Some(package.to_string());
                if !receiver_type.is_empty() {
                    symbol.parent_scope = Some(format!("{package}.{receiver_type}"));
                    let is_pointer_receiver = node
                        .child_by_field_name("receiver")
                        .and_then(|recv| recv.child_by_field_name("type"))
                        .map(|t| t.kind() == "pointer_type")
                        .unwrap_or(false);
                    symbol.language_features = serde_json::json!({
                        "receiverType": receiver_type,
                        "isPointerReceiver": is_pointer_receiver,
                    });
                }
                out.symbols.push(symbol);

                if let Some(body) = node.child_by_field_name("body") {
                    collect_calls(body, source, project_id, &qualified_name, out);
                }
                return;
            }
        }
        "type_declaration" => {
            for spec in node.children(&mut node.walk()) {
                if spec.kind() == "type_spec" {
                    if let Some(name_node) = spec.child_by_field_name("name") {
                        let name = text(name_node, source);
                        let type_node = spec.child_by_field_name("type");
                        let kind = match type_node.map(|t| t.kind()) {
                            Some("struct_type") => SymbolKind::Struct,
                            Some("interface_type") => SymbolKind::Interface,
                            _ => SymbolKind::TypeAlias,
                        };
                        let qualified_name = format!("{package}.{name}");
                        let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, spec);
                        symbol.is_exported = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
                        symbol.namespace = Some(package.to_string());
                        out.symbols.push(symbol);

                        if let Some(t) = type_node {
                            if t.kind() == "struct_type" {
                                extract_struct_fields(t, source, project_id, language_id, file_path, &qualified_name, out);
                            }
                        }
                    }
                }
            }
            return;
        }
        "var_declaration" | "const_declaration" => {
            for child in node.children(&mut node.walk()) {
                if matches!(child.kind(), "var_spec" | "const_spec") {
                    if let Some(name_node) = child.child_by_field_name("name") {
                        let name = text(name_node, source);
                        let qualified_name = format!("{package}.{name}");
                        let mut symbol =
                            symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Variable, file_path, child);
                        symbol.namespace = Some(package.to_string());
                        out.symbols.push(symbol);
                    }
                }
            }
            return;
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        extract(child, source, project_id, language_id, file_path, package, out);
    }
}

fn extract_struct_fields(
    struct_type: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    struct_qname: &str,
    out: &mut ParseResult,
) {
    if let Some(field_list) = struct_type.child_by_field_name("body") {
        for field in field_list.children(&mut field_list.walk()) {
            if field.kind() == "field_declaration" {
                if let Some(name_node) = field.child_by_field_name("name") {
                    let name = text(name_node, source);
                    let qualified_name = format!("{struct_qname}.{name}");
                    let mut symbol =
                        symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Field, file_path, field);
                    symbol.parent_scope = Some(struct_qname.to_string());
                    symbol.return_type = field.child_by_field_name("type").map(|t| text(t, source));
                    out.symbols.push(symbol);
                }
            }
        }
    }
}

fn collect_calls(node: Node, source: &str, project_id: i64, caller_qname: &str, out: &mut ParseResult) {
    if node.kind() == "call_expression" {
        if let Some(func) = node.child_by_field_name("function") {
            let mut rel = UniversalRelationship::new(project_id, caller_qname, text(func, source), EdgeType::Calls);
            rel.context_line = Some(func.start_position().row as u32 + 1);
            out.relationships.push(rel);
        }
    }
    for child in node.children(&mut node.walk()) {
        collect_calls(child, source, project_id, caller_qname, out);
    }
}

fn extract_imports(node: Node, source: &str, project_id: i64, file_path: &str, out: &mut ParseResult) {
    if node.kind() == "import_spec" {
        if let Some(path_node) = node.child_by_field_name("path") {
            let import_path = text(path_node, source);
            let import_path = import_path.trim_matches('"');
            out.relationships
                .push(UniversalRelationship::new(project_id, file_path, import_path, EdgeType::Imports));
        }
    }
    for child in node.children(&mut node.walk()) {
        extract_imports(child, source, project_id, file_path, out);
    }
}

fn receiver_type_name(node: Node, source: &str) -> String {
    match node.kind() {
        "pointer_type" => node
            .child_by_field_name("type")
            .map(|t| text(t, source))
            .unwrap_or_default(),
        _ => text(node, source),
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

fn text(node: Node, source: &str) -> String {
    source.get(node.byte_range()).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_is_read_from_the_clause_not_the_directory() {
        let mut harness = GoHarness::new().unwrap();
        let src = "package widgets\n\nfunc New() int { return 0 }\n";
        let result = harness.parse(1, 1, "internal/stuff/file.go", src).unwrap();
        let sym = result.symbols.iter().find(|s| s.name == "New").unwrap();
        assert_eq!(sym.qualified_name, "widgets.New");
    }

    #[test]
    fn exported_identifiers_are_flagged() {
        let mut harness = GoHarness::new().unwrap();
        let src = "package widgets\n\nfunc Public() {}\nfunc private() {}\n";
        let result = harness.parse(1, 1, "widgets.go", src).unwrap();
        let public = result.symbols.iter().find(|s| s.name == "Public").unwrap();
        let private = result.symbols.iter().find(|s| s.name == "private").unwrap();
        assert!(public.is_exported);
        assert!(!private.is_exported);
    }

    #[test]
    fn method_receiver_becomes_parent_scope() {
        let mut harness = GoHarness::new().unwrap();
        let src = "package widgets\n\ntype Widget struct{}\n\nfunc (w *Widget) Render() {}\n";
        let result = harness.parse(1, 1, "widgets.go", src).unwrap();
        let render = result.symbols.iter().find(|s| s.name == "Render").unwrap();
        assert_eq!(render.parent_scope.as_deref(), Some("widgets.Widget"));
    }

    #[test]
    fn pointer_receiver_is_recorded_in_language_features() {
        let mut harness = GoHarness::new().unwrap();
        let src = "package widgets\n\ntype Widget struct{}\n\nfunc (w *Widget) Render() {}\n";
        let result = harness.parse(1, 1, "widgets.go", src).unwrap();
        let render = result.symbols.iter().find(|s| s.name == "Render").unwrap();
        assert_eq!(render.language_features["receiverType"], "Widget");
        assert_eq!(render.language_features["isPointerReceiver"], true);
    }

    #[test]
    fn value_receiver_is_not_a_pointer_receiver() {
        let mut harness = GoHarness::new().unwrap();
        let src = "package widgets\n\ntype Widget struct{}\n\nfunc (w Widget) Render() {}\n";
        let result = harness.parse(1, 1, "widgets.go", src).unwrap();
        let render = result.symbols.iter().find(|s| s.name == "Render").unwrap();
        assert_eq!(render.language_features["receiverType"], "Widget");
        assert_eq!(render.language_features["isPointerReceiver"], false);
    }
}
