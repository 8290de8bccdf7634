use anyhow::{Context, Result};
use protocol::{EdgeType, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol, Visibility};
use tree_sitter::{Node, Parser};

pub struct JavaHarness {
    parser: Parser,
}

impl JavaHarness {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .context("failed to set Java language")?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        let tree = self.parser.parse(content, None).context("tree-sitter failed to produce a tree")?;
        let root = tree.root_node();
        let package = package_name(root, content);
        let mut result = ParseResult::tree_sitter();
        walk(root, content, project_id, language_id, file_path, &package, None, &mut result);
        Ok(result)
    }
}

fn package_name(root: Node, source: &str) -> Option<String> {
    root.children(&mut root.walk())
        .find(|c| c.kind() == "package_declaration")
        .and_then(|decl| decl.children(&mut decl.walk()).find(|c| matches!(c.kind(), "scoped_identifier" | "identifier")))
        .map(|n| text(n, source))
}

fn walk(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    package: &Option<String>,
    parent_qname: Option<&str>,
    out: &mut ParseResult,
) {
    match node.kind() {
        "import_declaration" => {
            if let Some(path_node) = node.children(&mut node.walk()).find(|c| matches!(c.kind(), "scoped_identifier" | "identifier")) {
                out.relationships
                    .push(UniversalRelationship::new(project_id, file_path, text(path_node, source), EdgeType::Imports));
            }
        }
        "class_declaration" | "interface_declaration" | "enum_declaration" | "annotation_type_declaration" => {
            let kind = match node.kind() {
                "interface_declaration" => SymbolKind::Interface,
                "enum_declaration" => SymbolKind::Enum,
                _ => SymbolKind::Class,
            };
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = text(name_node, source);
                let qualified_name = qname(parent_qname.or(package.as_deref()), &name);

                let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
                symbol.namespace = package.clone();
                symbol.parent_scope = parent_qname.map(str::to_string);
                symbol.visibility = visibility_of(node, source);
                symbol.semantic_tags = annotations(node, source);

                if let Some(superclass) = node.child_by_field_name("superclass") {
                    if let Some(type_node) = find_type_identifier(superclass) {
                        out.relationships.push(UniversalRelationship::new(
                            project_id,
                            qualified_name.clone(),
                            text(type_node, source),
                            EdgeType::Inherits,
                        ));
                    }
                }
                if let Some(interfaces) = node.child_by_field_name("interfaces") {
                    for t in interfaces.children(&mut interfaces.walk()) {
                        if t.kind() == "type_identifier" {
                            out.relationships.push(UniversalRelationship::new(
                                project_id,
                                qualified_name.clone(),
                                text(t, source),
                                EdgeType::Implements,
                            ));
                        }
                    }
                }

                out.symbols.push(symbol);
                if let Some(body) = node.child_by_field_name("body") {
                    for child in body.children(&mut body.walk()) {
                        walk(child, source, project_id, language_id, file_path, package, Some(&qualified_name), out);
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
                symbol.is_abstract = has_modifier(node, source, "abstract");
                symbol.semantic_tags = annotations(node, source);
                symbol.return_type = node.child_by_field_name("type").map(|t| text(t, source));
                out.symbols.push(symbol);

                if let Some(body) = node.child_by_field_name("body") {
                    collect_calls(body, source, project_id, &qualified_name, out);
                }
                return;
            }
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
        walk(child, source, project_id, language_id, file_path, package, parent_qname, out);
    }
}

fn collect_calls(node: Node, source: &str, project_id: i64, caller_qname: &str, out: &mut ParseResult) {
    if node.kind() == "method_invocation" {
        if let Some(name_node) = node.child_by_field_name("name") {
            let mut rel = UniversalRelationship::new(project_id, caller_qname, text(name_node, source), EdgeType::Calls);
            rel.context_line = Some(name_node.start_position().row as u32 + 1);
            out.relationships.push(rel);
        }
    }
    for child in node.children(&mut node.walk()) {
        collect_calls(child, source, project_id, caller_qname, out);
    }
}

fn find_type_identifier(node: Node) -> Option<Node> {
    if node.kind() == "type_identifier" {
        return Some(node);
    }
    node.children(&mut node.walk()).find_map(find_type_identifier)
}

fn visibility_of(node: Node, source: &str) -> Visibility {
    let text = text(node, source);
    let modifiers = text
        .split_whitespace()
        .take_while(|w| !matches!(*w, "class" | "interface" | "enum" | "void" | "@interface"))
        .collect::<Vec<_>>();
    if modifiers.iter().any(|m| *m == "public") {
        Visibility::Public
    } else if modifiers.iter().any(|m| *m == "private") {
        Visibility::Private
    } else if modifiers.iter().any(|m| *m == "protected") {
        Visibility::Protected
    } else {
        Visibility::Default
    }
}

fn has_modifier(node: Node, source: &str, keyword: &str) -> bool {
    node.child_by_field_name("modifiers")
        .map(|m| text(m, source).split_whitespace().any(|w| w == keyword))
        .unwrap_or(false)
}

fn annotations(node: Node, source: &str) -> Vec<String> {
    node.child_by_field_name("modifiers")
        .map(|m| {
            m.children(&mut m.walk())
                .filter(|c| c.kind() == "marker_annotation" || c.kind() == "annotation")
                .map(|c| text(c, source).trim_start_matches('@').to_string())
                .collect()
        })
        .unwrap_or_default()
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
