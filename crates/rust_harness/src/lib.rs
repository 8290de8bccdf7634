use anyhow::{Context, Result};
use protocol::{EdgeType, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol, Visibility};
use tree_sitter::{Node, Parser};

pub struct RustHarness {
    parser: Parser,
}

impl RustHarness {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .context("failed to set Rust language")?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        let tree = self.parser.parse(content, None).context("tree-sitter failed to produce a tree")?;
        let mut result = ParseResult::tree_sitter();
        let mut modules: Vec<String> = Vec::new();
        walk(tree.root_node(), content, project_id, language_id, file_path, &mut modules, None, &mut result);
        Ok(result)
    }
}

fn walk(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    modules: &mut Vec<String>,
    impl_type: Option<&str>,
    out: &mut ParseResult,
) {
    match node.kind() {
        "function_item" | "function_signature_item" => {
            handle_function(node, source, project_id, language_id, file_path, modules, impl_type, out);
            return;
        }
        "struct_item" => {
            handle_item(node, source, project_id, language_id, file_path, modules, SymbolKind::Struct, out);
            return;
        }
        "enum_item" => {
            handle_item(node, source, project_id, language_id, file_path, modules, SymbolKind::Enum, out);
            return;
        }
        "trait_item" => {
            handle_item(node, source, project_id, language_id, file_path, modules, SymbolKind::Interface, out);
        }
        "impl_item" => {
            handle_impl(node, source, project_id, language_id, file_path, modules, out);
            return;
        }
        "mod_item" => {
            handle_module(node, source, project_id, language_id, file_path, modules, out);
            return;
        }
        "use_declaration" => {
            handle_use(node, source, project_id, file_path, out);
        }
        "const_item" | "static_item" => {
            handle_const_or_static(node, source, project_id, language_id, file_path, modules, out);
        }
        "type_item" => {
            handle_item(node, source, project_id, language_id, file_path, modules, SymbolKind::TypeAlias, out);
        }
        "macro_definition" => {
            handle_item(node, source, project_id, language_id, file_path, modules, SymbolKind::Macro, out);
        }
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                if let Some(caller) = modules.last().cloned() {
                    let mut rel = UniversalRelationship::new(project_id, caller, text(func, source), EdgeType::Calls);
                    rel.context_line = Some(func.start_position().row as u32 + 1);
                    out.relationships.push(rel);
                }
            }
        }
        _ => {}
    }

    for child in node.children(&mut node.walk()) {
        walk(child, source, project_id, language_id, file_path, modules, impl_type, out);
    }
}

fn handle_function(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    modules: &mut Vec<String>,
    impl_type: Option<&str>,
    out: &mut ParseResult,
) {
    let name_node = match node.child_by_field_name("name") {
        Some(n) => n,
        None => return,
    };
    let name = text(name_node, source);
    let container = impl_type.map(str::to_string).or_else(|| modules.last().cloned());
    let qualified_name = qname(container.as_deref(), &name);
    let kind = if impl_type.is_some() { SymbolKind::Method } else { SymbolKind::Function };

    let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
    symbol.parent_scope = container.clone();
    symbol.is_async = has_modifier(node, source, "async");
    symbol.visibility = visibility_of(node, source);
    if let Some(params) = node.child_by_field_name("parameters") {
        let return_type = node.child_by_field_name("return_type").map(|t| text(t, source));
        symbol.signature = Some(format!("fn {}{}{}", name, text(params, source), return_type.as_deref().map(|t| format!(" -> {t}")).unwrap_or_default()));
        symbol.return_type = return_type;
    }
    out.symbols.push(symbol);

    modules.push(qualified_name.clone());
    if let Some(body) = node.child_by_field_name("body") {
        walk(body, source, project_id, language_id, file_path, modules, impl_type, out);
    }
    modules.pop();
}

fn handle_item(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    modules: &mut Vec<String>,
    kind: SymbolKind,
    out: &mut ParseResult,
) {
    let name_node = match node.child_by_field_name("name") {
        Some(n) => n,
        None => return,
    };
    let name = text(name_node, source);
    let qualified_name = qname(modules.last().map(String::as_str), &name);

    let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, kind, file_path, node);
    symbol.parent_scope = modules.last().cloned();
    symbol.visibility = visibility_of(node, source);
    symbol.semantic_tags = derive_attributes(node, source);
    out.symbols.push(symbol);
}

fn handle_impl(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    modules: &mut Vec<String>,
    out: &mut ParseResult,
) {
    let type_node = match node.child_by_field_name("type") {
        Some(t) => t,
        None => return,
    };
    let type_name = text(type_node, source);
    let trait_node = node.child_by_field_name("trait");

    if let Some(trait_node) = trait_node {
        let trait_name = text(trait_node, source);
        out.relationships.push(UniversalRelationship::new(project_id, type_name.clone(), trait_name, EdgeType::Implements));
    }

    let qualified_type = qname(modules.last().map(String::as_str), &type_name);
    if let Some(body) = node.child_by_field_name("body") {
        for child in body.children(&mut body.walk()) {
            walk(child, source, project_id, language_id, file_path, modules, Some(&qualified_type), out);
        }
    }
}

fn handle_module(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    modules: &mut Vec<String>,
    out: &mut ParseResult,
) {
    let name_node = match node.child_by_field_name("name") {
        Some(n) => n,
        None => return,
    };
    let name = text(name_node, source);
    let qualified_name = qname(modules.last().map(String::as_str), &name);

    let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Module, file_path, node);
    symbol.parent_scope = modules.last().cloned();
    symbol.visibility = visibility_of(node, source);
    out.symbols.push(symbol);

    modules.push(qualified_name);
    if let Some(body) = node.child_by_field_name("body") {
        for child in body.children(&mut body.walk()) {
            walk(child, source, project_id, language_id, file_path, modules, None, out);
        }
    }
    modules.pop();
}

fn handle_use(node: Node, source: &str, project_id: i64, file_path: &str, out: &mut ParseResult) {
    if let Some(arg) = node.child_by_field_name("argument") {
        out.relationships.push(UniversalRelationship::new(project_id, file_path, flatten_use_tree(arg, source), EdgeType::Imports));
    }
}

fn flatten_use_tree(node: Node, source: &str) -> String {
    match node.kind() {
        "scoped_identifier" | "identifier" => text(node, source),
        "use_as_clause" => node
            .child_by_field_name("path")
            .map(|p| text(p, source))
            .unwrap_or_else(|| text(node, source)),
        _ => text(node, source),
    }
}

fn handle_const_or_static(
    node: Node,
    source: &str,
    project_id: i64,
    language_id: i64,
    file_path: &str,
    modules: &mut Vec<String>,
    out: &mut ParseResult,
) {
    let name_node = match node.child_by_field_name("name") {
        Some(n) => n,
        None => return,
    };
    let name = text(name_node, source);
    let qualified_name = qname(modules.last().map(String::as_str), &name);
    let mut symbol = symbol_at(project_id, language_id, &name, &qualified_name, SymbolKind::Variable, file_path, node);
    symbol.parent_scope = modules.last().cloned();
    symbol.visibility = visibility_of(node, source);
    symbol.return_type = node.child_by_field_name("type").map(|t| text(t, source));
    out.symbols.push(symbol);
}

fn visibility_of(node: Node, source: &str) -> Visibility {
    let mut sibling = node.child(0);
    while let Some(n) = sibling {
        if n.kind() == "visibility_modifier" {
            let raw = text(n, source);
            return if raw.contains("pub(crate)") { Visibility::Internal } else { Visibility::Public };
        }
        sibling = n.next_sibling();
    }
    Visibility::Private
}

fn has_modifier(node: Node, source: &str, keyword: &str) -> bool {
    text(node, source).split_whitespace().take_while(|w| *w != "fn").any(|w| w == keyword)
}

fn derive_attributes(node: Node, source: &str) -> Vec<String> {
    let mut derives = Vec::new();
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        if s.kind() == "attribute_item" {
            let raw = text(s, source);
            if let Some(inner) = raw.strip_prefix("#[derive(").and_then(|r| r.strip_suffix(")]")) {
                derives.extend(inner.split(',').map(|d| d.trim().to_string()));
            }
            sibling = s.prev_sibling();
        } else {
            break;
        }
    }
    derives.reverse();
    derives
}

fn qname(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) => format!("{p}::{name}"),
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
