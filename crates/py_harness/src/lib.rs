use anyhow::Result;
use protocol::{EdgeType, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol};
use tree_sitter::{Node, Parser};

pub struct PythonHarness {
    parser: Parser,
}

impl PythonHarness {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter failed to produce a tree"))?;

        let mut result = ParseResult::tree_sitter();
        extract(tree.root_node(), content, project_id, language_id, file_path, None, &mut result);
        extract_imports(tree.root_node(), content, project_id, file_path, &mut result);
        Ok(result)
    }
}

fn extract(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    parent_qname: Option<&str>,
    out: &mut ParseResult,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                let kind = if parent_qname.is_some() && is_method_position(node) {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };

                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
                symbol.is_async = text(node, source).trim_start().starts_with("async");
                symbol.parent_scope = parent_qname.map(str::to_string);
                if let Some(features) = language_features(&decorators(node, source), Some(symbol.is_async), &[]) {
                    symbol.language_features = features;
                }
                if let Some(params) = node.child_by_field_name("parameters") {
                    symbol.signature = Some(format!("{}{}", name, text(params, source)));
                }

                out.symbols.push(symbol);

                if let Some(body) = node.child_by_field_name("body") {
                    extract(body, source, project_id, language_id, file_path, Some(&qualified_name), out);
                }
                return;
            }
        }
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Class, file_path, node);
                symbol.parent_scope = parent_qname.map(str::to_string);

                let mut base_classes = Vec::new();
                if let Some(superclasses) = node.child_by_field_name("superclasses") {
                    for arg in superclasses.children(&mut superclasses.walk()) {
                        if matches!(arg.kind(), "identifier" | "attribute") {
                            let base_name = text(arg, source);
                            out.relationships.push(UniversalRelationship::new(
                                project_id,
                                qualified_name.clone(),
                                base_name.clone(),
                                EdgeType::Inherits,
                            ));
                            base_classes.push(base_name);
                        }
                    }
                }
                if let Some(features) = language_features(&decorators(node, source), None, &base_classes) {
                    symbol.language_features = features;
                }

                out.symbols.push(symbol);
                if let Some(body) = node.child_by_field_name("body") {
                    extract(body, source, project_id, language_id, file_path, Some(&qualified_name), out);
                }
                return;
            }
        }
        "assignment" => {
            if parent_qname.is_none() {
                if let Some(left) = node.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        let name = text(left, source);
                        if !name.starts_with("__") {
                            let qualified_name = qname(parent_qname, &name);
                            out.symbols.push(symbol_at(
                                project_id,
                                language_id,
                                &name,
                                &qualified_name,
                                SymbolKind::Variable,
                                file_path,
                                node,
                            ));
                        }
                    }
                }
            }
        }
        "call" => {
            if let Some(func) = node.child_by_field_name("function") {
                if let Some(caller) = parent_qname {
                    let mut rel = UniversalRelationship::new(project_id, caller, text(func, source), EdgeType::Calls);
                    rel.context_line = Some(func.start_position().row as u32 + 1);
                    out.relationships.push(rel);
                }
            }
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        extract(child, source, project_id, language_id, file_path, parent_qname, out);
    }
}

/// A `function_definition` inside a `block` whose parent is a `class_definition`'s
/// body is a method; free functions nested in other functions stay `Function`.
fn is_method_position(node: Node) -> bool {
    node.parent()
        .and_then(|block| block.parent())
        .map(|maybe_class| maybe_class.kind() == "class_definition")
        .unwrap_or(false)
}

fn decorators(node: Node, source: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        if s.kind() == "decorator" {
            tags.push(text(s, source).trim_start_matches('@').to_string());
            sibling = s.prev_sibling();
        } else {
            break;
        }
    }
    tags.reverse();
    tags
}

/// `decorators`/`isCoroutine`/`baseClasses`, whichever apply — `None` when a
/// symbol carries none of them, leaving `language_features` null.
fn language_features(decorators: &[String], is_coroutine: Option<bool>, base_classes: &[String]) -> Option<serde_json::Value> {
    if decorators.is_empty() && is_coroutine != Some(true) && base_classes.is_empty() {
        return None;
    }
    let mut features = serde_json::json!({});
    if !decorators.is_empty() {
        features["decorators"] = serde_json::json!(decorators);
    }
    if is_coroutine == Some(true) {
        features["isCoroutine"] = serde_json::json!(true);
    }
    if !base_classes.is_empty() {
        features["baseClasses"] = serde_json::json!(base_classes);
    }
    Some(features)
}

fn extract_imports(node: Node, source: &str, project_id: i64, file_path: &str, out: &mut ParseResult) {
    match node.kind() {
        "import_statement" => {
            for child in node.children(&mut node.walk()) {
                if matches!(child.kind(), "dotted_name" | "aliased_import") {
                    out.relationships
                        .push(UniversalRelationship::new(project_id, file_path, text(child, source), EdgeType::Imports));
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                out.relationships.push(UniversalRelationship::new(
                    project_id,
                    file_path,
                    text(module, source),
                    EdgeType::Imports,
                ));
                for child in node.children(&mut node.walk()) {
                    if child.id() == module.id() {
                        continue;
                    }
                    match child.kind() {
                        "dotted_name" => {
                            out.relationships.push(UniversalRelationship::new(
                                project_id,
                                file_path,
                                text(child, source),
                                EdgeType::References,
                            ));
                        }
                        "aliased_import" => {
                            if let Some(name_node) = child.child_by_field_name("name") {
                                out.relationships.push(UniversalRelationship::new(
                                    project_id,
                                    file_path,
                                    text(name_node, source),
                                    EdgeType::References,
                                ));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    }
    for child in node.children(&mut node.walk()) {
        extract_imports(child, source, project_id, file_path, out);
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

fn qname(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
    }
}

fn text(node: Node, source: &str) -> String {
    source.get(node.byte_range()).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_function_and_call_are_extracted() {
        let mut harness = PythonHarness::new().unwrap();
        let src = "def add(a, b):\n    return helper(a, b)\n";
        let result = harness.parse(1, 1, "math.py", src).unwrap();
        assert!(result.symbols.iter().any(|s| s.name == "add" && s.kind == SymbolKind::Function));
        assert!(result.relationships.iter().any(|r| r.to_name == "helper" && r.relationship_type == EdgeType::Calls));
    }

    #[test]
    fn class_method_gets_method_kind_and_class_base_is_inherits_edge() {
        let mut harness = PythonHarness::new().unwrap();
        let src = "class Dog(Animal):\n    def bark(self):\n        pass\n";
        let result = harness.parse(1, 1, "animals.py", src).unwrap();
        let bark = result.symbols.iter().find(|s| s.name == "bark").unwrap();
        assert_eq!(bark.kind, SymbolKind::Method);
        assert!(result
            .relationships
            .iter()
            .any(|r| r.from_name == "Dog" && r.to_name == "Animal" && r.relationship_type == EdgeType::Inherits));
    }

    #[test]
    fn decorators_are_captured_in_language_features() {
        let mut harness = PythonHarness::new().unwrap();
        let src = "@staticmethod\ndef helper():\n    pass\n";
        let result = harness.parse(1, 1, "utils.py", src).unwrap();
        let helper = result.symbols.iter().find(|s| s.name == "helper").unwrap();
        assert_eq!(helper.language_features["decorators"][0], "staticmethod");
    }

    #[test]
    fn async_function_is_marked_coroutine() {
        let mut harness = PythonHarness::new().unwrap();
        let src = "async def fetch():\n    pass\n";
        let result = harness.parse(1, 1, "net.py", src).unwrap();
        let fetch = result.symbols.iter().find(|s| s.name == "fetch").unwrap();
        assert!(fetch.is_async);
        assert_eq!(fetch.language_features["isCoroutine"], true);
    }

    #[test]
    fn class_base_classes_are_recorded_in_language_features() {
        let mut harness = PythonHarness::new().unwrap();
        let src = "class Dog(Animal, Mixin):\n    pass\n";
        let result = harness.parse(1, 1, "animals.py", src).unwrap();
        let dog = result.symbols.iter().find(|s| s.name == "Dog").unwrap();
        assert_eq!(dog.language_features["baseClasses"], serde_json::json!(["Animal", "Mixin"]));
    }

    #[test]
    fn from_import_emits_references_edge_for_imported_name() {
        let mut harness = PythonHarness::new().unwrap();
        let src = "from collections import OrderedDict\n";
        let result = harness.parse(1, 1, "main.py", src).unwrap();
        assert!(result
            .relationships
            .iter()
            .any(|r| r.to_name == "collections" && r.relationship_type == EdgeType::Imports));
        assert!(result
            .relationships
            .iter()
            .any(|r| r.to_name == "OrderedDict" && r.relationship_type == EdgeType::References));
    }
}
