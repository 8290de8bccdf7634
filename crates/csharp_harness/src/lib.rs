use anyhow::{Context, Result};
use protocol::{EdgeType, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol, Visibility};
use tree_sitter::{Node, Parser};

pub struct CSharpHarness {
    parser: Parser,
}

impl CSharpHarness {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .context("failed to set C# language")?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        let tree = self.parser.parse(content, None).context("tree-sitter failed to produce a tree")?;
        let mut result = ParseResult::tree_sitter();
        walk(tree.root_node(), content, project_id, language_id, file_path, None, &mut result);
        Ok(result)
    }
}

impl Default for CSharpHarness {
    fn default() -> Self {
        Self::new().expect("tree-sitter-c-sharp grammar failed to load")
    }
}

fn walk(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    parent_qname: Option<&str>,
    out: &mut ParseResult,
) {
    match node.kind() {
        "using_directive" => {
            if let Some(name_node) = node.children(&mut node.walk()).find(|c| matches!(c.kind(), "qualified_name" | "identifier")) {
                out.relationships
                    .push(UniversalRelationship::new(project_id, file_path, text(name_node, source), EdgeType::Imports));
            }
        }
        "namespace_declaration" | "file_scoped_namespace_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                for child in node.children(&mut node.walk()) {
                    walk(child, source, project_id, language_id, file_path, Some(&qualified_name), out);
                }
                return;
            }
        }
        "class_declaration" | "interface_declaration" | "struct_declaration" => {
            let kind = match node.kind() {
                "interface_declaration" => SymbolKind::Interface,
                "struct_declaration" => SymbolKind::Struct,
                _ => SymbolKind::Class,
            };
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname, &name);

                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
                symbol.namespace = parent_qname.map(str::to_string);
                symbol.parent_scope = parent_qname.map(str::to_string);
                symbol.visibility = visibility_of(node, source);
                symbol.semantic_tags = attributes(node, source);

                if let Some(bases) = node.child_by_field_name("bases") {
                    for (i, t) in bases.children(&mut bases.walk()).filter(|c| c.kind() == "identifier" || c.kind() == "generic_name").enumerate() {
                        let edge_type = if i == 0 && kind != SymbolKind::Interface { EdgeType::Inherits } else { EdgeType::Implements };
                        out.relationships.push(UniversalRelationship::new(project_id, qualified_name.clone(), text(t, source), edge_type));
                    }
                }

                out.symbols.push(symbol);
                if let Some(body) = node.child_by_field_name("body") {
                    for child in body.children(&mut body.walk()) {
                        walk(child, source, project_id, language_id, file_path, Some(&qualified_name), out);
                    }
                }
                return;
            }
        }
        "method_declaration" | "constructor_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                let kind = if node.kind() == "constructor_declaration" { SymbolKind::Constructor } else { SymbolKind::Method };

                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
                symbol.parent_scope = parent_qname.map(str::to_string);
                symbol.visibility = visibility_of(node, source);
                symbol.is_async = has_modifier(node, source, "async");
                symbol.semantic_tags = attributes(node, source);
                symbol.return_type = node.child_by_field_name("type").map(|t| text(t, source));
                out.symbols.push(symbol);

                if let Some(body) = node.child_by_field_name("body") {
                    collect_calls(body, source, project_id, &qualified_name, out);
                }
                return;
            }
        }
        "property_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname, &name);
                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Property, file_path, node);
                symbol.parent_scope = parent_qname.map(str::to_string);
                symbol.visibility = visibility_of(node, source);
                symbol.return_type = node.child_by_field_name("type").map(|t| text(t, source));
                out.symbols.push(symbol);
            }
            return;
        }
        "field_declaration" => {
            if let Some(parent) = parent_qname {
                let field_type = node.child_by_field_name("type").map(|t| text(t, source));
                for declarator in node.children(&mut node.walk()) {
                    if declarator.kind() == "variable_declarator" {
                        if let Some(name_node) = declarator.child_by_field_name("name") {
                            let name = text(name_node, source);
                            let qualified_name = qname(Some(parent), &name);
                            let mut symbol =
                                symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Field, file_path, declarator);
                            symbol.parent_scope = Some(parent.to_string());
                            symbol.visibility = visibility_of(node, source);
                            symbol.return_type = field_type.clone();
                            out.symbols.push(symbol);
                        }
                    }
                }
            }
            return;
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        walk(child, source, project_id, language_id, file_path, parent_qname, out);
    }
}

fn collect_calls(node: Node, source: &str, project_id: i64, caller_qname: &str, out: &mut ParseResult) {
    if node.kind() == "invocation_expression" {
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

fn visibility_of(node: Node, source: &str) -> Visibility {
    let raw = text(node, source);
    let modifiers: Vec<&str> = raw
        .split_whitespace()
        .take_while(|w| !matches!(*w, "class" | "interface" | "struct" | "void" | "int" | "string"))
        .collect();
    if modifiers.contains(&"public") {
        Visibility::Public
    } else if modifiers.contains(&"private") {
        Visibility::Private
    } else if modifiers.contains(&"protected") {
        Visibility::Protected
    } else if modifiers.contains(&"internal") {
        Visibility::Internal
    } else {
        Visibility::Default
    }
}

fn has_modifier(node: Node, source: &str, keyword: &str) -> bool {
    text(node, source).split_whitespace().take_while(|w| *w != "(").any(|w| w == keyword)
}

fn attributes(node: Node, source: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        if s.kind() == "attribute_list" {
            for attr in s.children(&mut s.walk()) {
                if attr.kind() == "attribute" {
                    tags.push(text(attr, source));
                }
            }
            sibling = s.prev_sibling();
        } else {
            break;
        }
    }
    tags.reverse();
    tags
}

fn qname(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
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
    fn namespace_scopes_a_class_and_its_method() {
        let mut harness = CSharpHarness::new().unwrap();
        let src = "namespace MyNamespace {\n  public class Calculator {\n    public int Add(int a, int b) { return a + b; }\n  }\n}\n";
        let result = harness.parse(1, 1, "Calculator.cs", src).unwrap();
        let add = result.symbols.iter().find(|s| s.name == "Add").unwrap();
        assert_eq!(add.qualified_name, "MyNamespace.Calculator.Add");
        assert_eq!(add.visibility, Visibility::Public);
    }

    #[test]
    fn interface_implementation_becomes_implements_edge() {
        let mut harness = CSharpHarness::new().unwrap();
        let src = "class Widget : IDisposable {\n  public void Dispose() {}\n}\n";
        let result = harness.parse(1, 1, "Widget.cs", src).unwrap();
        assert!(result
            .relationships
            .iter()
            .any(|r| r.from_name == "Widget" && r.to_name == "IDisposable" && r.relationship_type == EdgeType::Implements));
    }
}
