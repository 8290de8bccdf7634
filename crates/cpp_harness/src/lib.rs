use anyhow::{Context, Result};
use protocol::{EdgeType, Language, ParseResult, SymbolKind, UniversalRelationship, UniversalSymbol, Visibility};
use tree_sitter::{Node, Parser};

#[cfg(test)]
mod debug;
#[cfg(test)]
mod edge_cases;
#[cfg(test)]
mod complex_tests;

pub struct CppHarness {
    parser: Parser,
    is_cpp: bool,
}

/// Scope stack used to build qualified names and track the current
/// member-access region while walking a class/struct body.
struct ParseContext {
    scopes: Vec<String>,
    access: Vec<Visibility>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            scopes: Vec::new(),
            access: Vec::new(),
        }
    }

    fn build_fqn(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", self.scopes.join("::"), name)
        }
    }

    fn parent_scope(&self) -> Option<String> {
        self.scopes.last().cloned()
    }

    fn push(&mut self, name: String, default_access: Visibility) {
        self.scopes.push(name);
        self.access.push(default_access);
    }

    fn pop(&mut self) {
        self.scopes.pop();
        self.access.pop();
    }

    fn set_access(&mut self, keyword: &str) {
        if let Some(top) = self.access.last_mut() {
            *top = match keyword {
                "public" => Visibility::Public,
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => *top,
            };
        }
    }

    fn current_access(&self) -> Visibility {
        self.access.last().copied().unwrap_or(Visibility::Public)
    }
}

impl CppHarness {
    pub fn new_cpp() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .context("failed to set C++ language")?;
        Ok(Self { parser, is_cpp: true })
    }

    pub fn new_c() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .context("failed to set C language")?;
        Ok(Self { parser, is_cpp: false })
    }

    pub fn parse(&mut self, project_id: i64, language_id: i64, file_path: &str, content: &str) -> Result<ParseResult> {
        let tree = self.parser.parse(content, None).context("tree-sitter failed to produce a tree")?;
        let mut result = ParseResult::tree_sitter();
        let mut context = ParseContext::new();

        self.walk_node(
            tree.root_node(),
            content,
            project_id,
            language_id,
            file_path,
            None,
            &mut result,
            &mut context,
        )?;

        if self.is_cpp {
            if let Some(module_symbol) = module_declaration(content, project_id, language_id, file_path) {
                result.symbols.push(module_symbol);
            }
        }
        Ok(result)
    }

    fn lang(&self) -> Language {
        if self.is_cpp { Language::Cpp } else { Language::C }
    }

    fn walk_node(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        parent_id: Option<&str>,
        out: &mut ParseResult,
        context: &mut ParseContext,
    ) -> Result<()> {
        match node.kind() {
            "function_definition" => {
                self.handle_function(node, content, project_id, language_id, file_path, out, context)?;
            }
            "class_specifier" if self.is_cpp => {
                self.handle_container(node, content, project_id, language_id, file_path, out, context, SymbolKind::Class)?;
            }
            "struct_specifier" => {
                self.handle_container(node, content, project_id, language_id, file_path, out, context, SymbolKind::Struct)?;
            }
            "enum_specifier" => {
                self.handle_enum(node, content, project_id, language_id, file_path, out, context)?;
            }
            "namespace_definition" if self.is_cpp => {
                self.handle_namespace(node, content, project_id, language_id, file_path, out, context)?;
            }
            "field_declaration" => {
                self.handle_field(node, content, project_id, language_id, file_path, out, context)?;
            }
            "access_specifier" => {
                context.set_access(&self.text(node, content));
            }
            "preproc_include" => {
                self.handle_include(node, content, project_id, file_path, out)?;
            }
            _ => {
                for child in node.children(&mut node.walk()) {
                    self.walk_node(child, content, project_id, language_id, file_path, parent_id, out, context)?;
                }
            }
        }
        Ok(())
    }

    fn handle_function(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        out: &mut ParseResult,
        context: &mut ParseContext,
    ) -> Result<()> {
        let declarator = match node.child_by_field_name("declarator") {
            Some(d) => d,
            None => return Ok(()),
        };
        // `function_name` returns the raw declarator text, which for an
        // out-of-line member definition (`Foo::bar() {...}` written at
        // namespace scope) is the qualified `Foo::bar`, not a simple name.
        let raw_name = match self.function_name(declarator, content) {
            Some(n) => n,
            None => return Ok(()),
        };
        let is_out_of_line = raw_name.contains("::") && context.scopes.is_empty();
        let name = raw_name.rsplit("::").next().unwrap_or(&raw_name).to_string();

        let return_type = node
            .child_by_field_name("type")
            .map(|n| self.text(n, content))
            .unwrap_or_else(|| "void".to_string());
        let params = self.function_params(declarator, content);
        let signature = format!("{} {}({})", return_type, name, params.join(", "));
        let qualified_name = context.build_fqn(&raw_name);

        let kind = if is_out_of_line {
            SymbolKind::Method
        } else {
            SymbolKind::Method.container_guard(context.parent_scope().is_some())
        };

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
        symbol.signature = Some(signature);
        symbol.return_type = Some(return_type);
        symbol.namespace = context.parent_scope();
        symbol.visibility = if context.scopes.is_empty() { Visibility::Public } else { context.current_access() };

        if is_out_of_line {
            // Invariant (b): link to the in-class declaration by qualified
            // name instead of by lexical containment (Pass 1/2 in the
            // resolver), since this definition's own span sits outside the
            // class body it belongs to.
            symbol.semantic_tags.push("out_of_line_definition".to_string());
        } else {
            symbol.parent_scope = context.parent_scope();
        }

        let mut language_features = self.cpp_language_features(node, content).unwrap_or(serde_json::Value::Null);
        if is_out_of_line {
            if language_features.is_null() {
                language_features = serde_json::json!({});
            }
            language_features["isOutOfLineDefinition"] = serde_json::json!(true);
        }
        symbol.language_features = language_features;

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, content, project_id, &symbol.qualified_name, file_path, out)?;
        }
        out.symbols.push(symbol);
        Ok(())
    }

    fn handle_container(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        out: &mut ParseResult,
        context: &mut ParseContext,
        kind: SymbolKind,
    ) -> Result<()> {
        let name_node = match node.child_by_field_name("name") {
            Some(n) => n,
            None => return Ok(()),
        };
        let name = self.text(name_node, content);
        let qualified_name = context.build_fqn(&name);

        let mut symbol = UniversalSymbol::new(
            project_id,
            language_id,
            name.clone(),
            qualified_name.clone(),
            kind,
            file_path,
            name_node.start_position().row as u32 + 1,
            name_node.start_position().column as u32,
        );
        symbol.end_line = Some(node.end_position().row as u32 + 1);
        symbol.namespace = context.parent_scope();
        symbol.parent_scope = context.parent_scope();
        if let Some(params) = self.template_params(node, content) {
            symbol.language_features = serde_json::json!({ "isTemplate": true, "templateParams": params });
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "base_class_clause" {
                for sub in child.children(&mut child.walk()) {
                    if matches!(sub.kind(), "type_identifier" | "qualified_identifier") {
                        let base_name = self.text(sub, content);
                        let mut rel = UniversalRelationship::new(
                            project_id,
                            qualified_name.clone(),
                            base_name,
                            EdgeType::Inherits,
                        );
                        rel.context_line = Some(sub.start_position().row as u32 + 1);
                        out.relationships.push(rel);
                    }
                }
            }
        }

        out.symbols.push(symbol);

        // Default access is private for class, public for struct (C++ rule).
        let default_access = if matches!(kind, SymbolKind::Class) { Visibility::Private } else { Visibility::Public };
        context.push(name, default_access);
        if let Some(body) = node.child_by_field_name("body") {
            for child in body.children(&mut body.walk()) {
                self.walk_node(child, content, project_id, language_id, file_path, None, out, context)?;
            }
        }
        context.pop();
        Ok(())
    }

    fn handle_namespace(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        out: &mut ParseResult,
        context: &mut ParseContext,
    ) -> Result<()> {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n, content))
            .unwrap_or_else(|| "<anonymous>".to_string());
        let qualified_name = context.build_fqn(&name);

        let mut symbol = UniversalSymbol::new(
            project_id,
            language_id,
            name.clone(),
            qualified_name,
            SymbolKind::Namespace,
            file_path,
            node.start_position().row as u32 + 1,
            node.start_position().column as u32,
        );
        symbol.end_line = Some(node.end_position().row as u32 + 1);
        symbol.namespace = context.parent_scope();
        symbol.parent_scope = context.parent_scope();
        out.symbols.push(symbol);

        context.push(name, Visibility::Public);
        if let Some(body) = node.child_by_field_name("body") {
            for child in body.children(&mut body.walk()) {
                self.walk_node(child, content, project_id, language_id, file_path, None, out, context)?;
            }
        }
        context.pop();
        Ok(())
    }

    fn handle_enum(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        out: &mut ParseResult,
        context: &mut ParseContext,
    ) -> Result<()> {
        let name_node = match node.child_by_field_name("name") {
            Some(n) => n,
            None => return Ok(()),
        };
        let name = self.text(name_node, content);
        let qualified_name = context.build_fqn(&name);

        let mut symbol = UniversalSymbol::new(
            project_id,
            language_id,
            name,
            qualified_name,
            SymbolKind::Enum,
            file_path,
            name_node.start_position().row as u32 + 1,
            name_node.start_position().column as u32,
        );
        symbol.end_line = Some(node.end_position().row as u32 + 1);
        symbol.namespace = context.parent_scope();
        symbol.parent_scope = context.parent_scope();
        out.symbols.push(symbol);
        Ok(())
    }

    fn handle_field(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        out: &mut ParseResult,
        context: &mut ParseContext,
    ) -> Result<()> {
        if context.scopes.is_empty() {
            return Ok(());
        }
        let declarator = match node.child_by_field_name("declarator") {
            Some(d) => d,
            None => return Ok(()),
        };
        if self.declarator_is_function(declarator) {
            return self.handle_method_declaration(node, declarator, content, project_id, language_id, file_path, out, context);
        }
        let name = match self.function_name(declarator, content) {
            Some(n) => n,
            None => return Ok(()),
        };
        let field_type = node
            .child_by_field_name("type")
            .map(|n| self.text(n, content));
        let qualified_name = context.build_fqn(&name);

        let mut symbol = UniversalSymbol::new(
            project_id,
            language_id,
            name,
            qualified_name,
            SymbolKind::Field,
            file_path,
            node.start_position().row as u32 + 1,
            node.start_position().column as u32,
        );
        symbol.return_type = field_type;
        symbol.namespace = context.parent_scope();
        symbol.parent_scope = context.parent_scope();
        symbol.visibility = context.current_access();
        out.symbols.push(symbol);
        Ok(())
    }

    /// A `field_declaration` whose declarator is a `function_declarator` is a
    /// member-function prototype (no body), e.g. `virtual void draw() = 0;` —
    /// the in-class declaration that an out-of-line definition links back to.
    fn handle_method_declaration(
        &self,
        node: Node,
        declarator: Node,
        content: &str,
        project_id: i64,
        language_id: i64,
        file_path: &str,
        out: &mut ParseResult,
        context: &mut ParseContext,
    ) -> Result<()> {
        let name = match self.function_name(declarator, content) {
            Some(n) => n,
            None => return Ok(()),
        };
        let return_type = node.child_by_field_name("type").map(|n| self.text(n, content));
        let params = self.function_params(declarator, content);
        let signature = return_type.as_deref().map(|rt| format!("{} {}({})", rt, name, params.join(", ")));
        let qualified_name = context.build_fqn(&name);

        let mut symbol = UniversalSymbol::new(
            project_id,
            language_id,
            name,
            qualified_name,
            SymbolKind::Method,
            file_path,
            node.start_position().row as u32 + 1,
            node.start_position().column as u32,
        );
        symbol.end_line = Some(node.end_position().row as u32 + 1);
        symbol.signature = signature;
        symbol.return_type = return_type;
        symbol.namespace = context.parent_scope();
        symbol.parent_scope = context.parent_scope();
        symbol.visibility = context.current_access();
        symbol.is_definition = false;
        if let Some(features) = self.cpp_language_features(node, content) {
            symbol.language_features = features;
        }
        out.symbols.push(symbol);
        Ok(())
    }

    /// Whether a declarator resolves (through pointer/reference wrapping) to
    /// a `function_declarator` — distinguishes a method prototype from a
    /// plain data field, both of which are `field_declaration` nodes.
    fn declarator_is_function(&self, declarator: Node) -> bool {
        let mut current = declarator;
        loop {
            match current.kind() {
                "function_declarator" => return true,
                "pointer_declarator" | "reference_declarator" => match current.child_by_field_name("declarator") {
                    Some(child) => current = child,
                    None => return false,
                },
                _ => return false,
            }
        }
    }

    /// `isVirtual`/`isOverride`/`isFinal`/`isConstexpr`/`isTemplate`, read
    /// off the declaration/definition node itself — `None` when none apply,
    /// matching the sparse convention of leaving `language_features` null
    /// when a symbol carries no language-specific data.
    fn cpp_language_features(&self, node: Node, content: &str) -> Option<serde_json::Value> {
        let is_virtual = self.has_keyword_token(node, content, "virtual");
        let is_override = self.has_keyword_token(node, content, "override");
        let is_final = self.has_keyword_token(node, content, "final");
        let is_constexpr = self.has_keyword_token(node, content, "constexpr");
        let template_params = self.template_params(node, content);

        if !is_virtual && !is_override && !is_final && !is_constexpr && template_params.is_none() {
            return None;
        }

        let mut features = serde_json::json!({});
        if is_virtual {
            features["isVirtual"] = serde_json::json!(true);
        }
        if is_override {
            features["isOverride"] = serde_json::json!(true);
        }
        if is_final {
            features["isFinal"] = serde_json::json!(true);
        }
        if is_constexpr {
            features["isConstexpr"] = serde_json::json!(true);
        }
        if let Some(params) = template_params {
            features["isTemplate"] = serde_json::json!(true);
            features["templateParams"] = serde_json::json!(params);
        }
        Some(features)
    }

    /// Scans `node`'s subtree for a leaf token matching `keyword`, stopping
    /// at a `compound_statement` so a method body's contents (which might
    /// reuse these words as identifiers) are never searched.
    fn has_keyword_token(&self, node: Node, content: &str, keyword: &str) -> bool {
        if node.kind() == "compound_statement" {
            return false;
        }
        if node.child_count() == 0 {
            return self.text(node, content) == keyword;
        }
        node.children(&mut node.walk()).any(|c| self.has_keyword_token(c, content, keyword))
    }

    /// `node`'s template parameter list, if it (or the member-function
    /// declaration it belongs to) is wrapped in a `template_declaration`.
    fn template_params(&self, node: Node, content: &str) -> Option<Vec<String>> {
        let parent = node.parent()?;
        if parent.kind() != "template_declaration" {
            return None;
        }
        let param_list = parent.child_by_field_name("parameters")?;
        let params: Vec<String> = param_list
            .children(&mut param_list.walk())
            .filter(|c| {
                matches!(
                    c.kind(),
                    "type_parameter_declaration"
                        | "parameter_declaration"
                        | "optional_parameter_declaration"
                        | "variadic_type_parameter_declaration"
                )
            })
            .map(|c| self.text(c, content))
            .collect();
        Some(params)
    }

    fn handle_include(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        file_path: &str,
        out: &mut ParseResult,
    ) -> Result<()> {
        if let Some(path_node) = node.child_by_field_name("path") {
            let include_path = self
                .text(path_node, content)
                .trim_matches(|c| c == '"' || c == '<' || c == '>')
                .to_string();
            let mut rel = UniversalRelationship::new(project_id, file_path, include_path, EdgeType::Imports);
            rel.context_line = Some(path_node.start_position().row as u32 + 1);
            out.relationships.push(rel);
        }
        Ok(())
    }

    fn collect_calls(
        &self,
        node: Node,
        content: &str,
        project_id: i64,
        caller_qname: &str,
        file_path: &str,
        out: &mut ParseResult,
    ) -> Result<()> {
        if node.kind() == "call_expression" {
            if let Some(func_node) = node.child_by_field_name("function") {
                if let Some(name) = self.extract_identifier(func_node, content) {
                    let mut rel = UniversalRelationship::new(project_id, caller_qname, name, EdgeType::Calls);
                    rel.context_line = Some(func_node.start_position().row as u32 + 1);
                    out.relationships.push(rel);
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.collect_calls(child, content, project_id, caller_qname, file_path, out)?;
        }
        Ok(())
    }

    fn function_name(&self, declarator: Node, content: &str) -> Option<String> {
        let mut current = declarator;
        loop {
            match current.kind() {
                "function_declarator" | "pointer_declarator" | "reference_declarator" => {
                    current = current.child_by_field_name("declarator")?;
                }
                "identifier" | "field_identifier" | "destructor_name" | "qualified_identifier" => {
                    return Some(self.text(current, content));
                }
                _ => return None,
            }
        }
    }

    fn function_params(&self, declarator: Node, content: &str) -> Vec<String> {
        let mut params = Vec::new();
        let mut current = declarator;
        let func_decl = loop {
            if current.kind() == "function_declarator" {
                break Some(current);
            }
            match current.child_by_field_name("declarator") {
                Some(child) => current = child,
                None => break None,
            }
        };

        if let Some(func) = func_decl {
            if let Some(param_list) = func.child_by_field_name("parameters") {
                for child in param_list.children(&mut param_list.walk()) {
                    if child.kind() == "parameter_declaration" {
                        params.push(self.text(child, content));
                    }
                }
            }
        }
        params
    }

    fn extract_identifier(&self, node: Node, content: &str) -> Option<String> {
        match node.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" => Some(self.text(node, content)),
            _ => node
                .children(&mut node.walk())
                .find_map(|child| self.extract_identifier(child, content)),
        }
    }

    fn text(&self, node: Node, content: &str) -> String {
        node.utf8_text(content.as_bytes()).unwrap_or("").to_string()
    }
}

/// Scans the top level of a translation unit for a C++20 `export module X;`
/// or `module X;` declaration. tree-sitter-cpp's grammar doesn't model
/// modules yet, so this reads line text directly — the same kind of
/// line-level scan the cross-language detector uses for service discovery.
fn module_declaration(content: &str, project_id: i64, language_id: i64, file_path: &str) -> Option<UniversalSymbol> {
    for (row, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if let Some(rest) = line.strip_prefix("export module ") {
            let name = rest.trim_end_matches(';').trim();
            if name.is_empty() {
                continue;
            }
            let mut symbol = UniversalSymbol::new(
                project_id,
                language_id,
                name,
                name,
                SymbolKind::Module,
                file_path,
                row as u32 + 1,
                0,
            );
            symbol.is_exported = true;
            symbol.language_features = serde_json::json!({ "isExportedModule": true, "moduleName": name });
            return Some(symbol);
        }
        if let Some(rest) = line.strip_prefix("module ") {
            let name = rest.trim_end_matches(';').trim();
            if name.is_empty() {
                continue;
            }
            let mut symbol = UniversalSymbol::new(
                project_id,
                language_id,
                name,
                name,
                SymbolKind::Module,
                file_path,
                row as u32 + 1,
                0,
            );
            symbol.language_features = serde_json::json!({ "isExportedModule": false, "moduleName": name });
            return Some(symbol);
        }
    }
    None
}

trait ContainerGuard {
    fn container_guard(self, inside_container: bool) -> SymbolKind;
}

impl ContainerGuard for SymbolKind {
    /// A free `function_definition` is a `Function`; the same node kind
    /// inside a class/struct body is a `Method`.
    fn container_guard(self, inside_container: bool) -> SymbolKind {
        if inside_container {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_free_function_and_call_edge() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "int add(int a, int b) { return helper(a, b); }\n";
        let result = harness.parse(1, 1, "math.cpp", src).unwrap();
        assert!(result.symbols.iter().any(|s| s.name == "add" && s.kind == SymbolKind::Function));
        assert!(result.relationships.iter().any(|r| r.to_name == "helper" && r.relationship_type == EdgeType::Calls));
    }

    #[test]
    fn struct_fields_get_container_parent_scope() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "struct Point { int x; int y; };\n";
        let result = harness.parse(1, 1, "point.hpp", src).unwrap();
        let point = result.symbols.iter().find(|s| s.name == "Point").unwrap();
        assert_eq!(point.kind, SymbolKind::Struct);
        let x = result.symbols.iter().find(|s| s.name == "x").unwrap();
        assert_eq!(x.parent_scope.as_deref(), Some("Point"));
    }

    #[test]
    fn class_inheritance_becomes_inherits_edge() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "class Derived : public Base { };\n";
        let result = harness.parse(1, 1, "derived.hpp", src).unwrap();
        assert!(result
            .relationships
            .iter()
            .any(|r| r.from_name == "Derived" && r.to_name == "Base" && r.relationship_type == EdgeType::Inherits));
    }

    #[test]
    fn in_class_prototype_is_a_non_definition_method() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "class Widget { public: void draw(); };\n";
        let result = harness.parse(1, 1, "widget.hpp", src).unwrap();
        let draw = result.symbols.iter().find(|s| s.name == "draw").unwrap();
        assert_eq!(draw.kind, SymbolKind::Method);
        assert!(!draw.is_definition);
        assert_eq!(draw.parent_scope.as_deref(), Some("Widget"));
    }

    #[test]
    fn out_of_line_definition_is_flagged_and_left_unparented() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "class Widget { public: void draw(); };\nvoid Widget::draw() { paint(); }\n";
        let result = harness.parse(1, 1, "widget.cpp", src).unwrap();
        let def = result
            .symbols
            .iter()
            .find(|s| s.name == "draw" && s.is_definition)
            .unwrap();
        assert_eq!(def.qualified_name, "Widget::draw");
        assert!(def.parent_scope.is_none());
        assert!(def.semantic_tags.iter().any(|t| t == "out_of_line_definition"));
        assert_eq!(def.language_features["isOutOfLineDefinition"], serde_json::json!(true));
    }

    #[test]
    fn virtual_override_and_final_become_language_features() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "class Shape { public: virtual void draw() override final; };\n";
        let result = harness.parse(1, 1, "shape.hpp", src).unwrap();
        let draw = result.symbols.iter().find(|s| s.name == "draw").unwrap();
        assert_eq!(draw.language_features["isVirtual"], serde_json::json!(true));
        assert_eq!(draw.language_features["isOverride"], serde_json::json!(true));
        assert_eq!(draw.language_features["isFinal"], serde_json::json!(true));
    }

    #[test]
    fn template_class_records_template_params() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "template<typename T> class Box { T value; };\n";
        let result = harness.parse(1, 1, "box.hpp", src).unwrap();
        let boxx = result.symbols.iter().find(|s| s.name == "Box").unwrap();
        assert_eq!(boxx.language_features["isTemplate"], serde_json::json!(true));
        assert_eq!(boxx.language_features["templateParams"][0], serde_json::json!("typename T"));
    }

    #[test]
    fn exported_module_declaration_is_captured() {
        let mut harness = CppHarness::new_cpp().unwrap();
        let src = "export module graphics.shapes;\nexport class Circle {};\n";
        let result = harness.parse(1, 1, "shapes.cppm", src).unwrap();
        let module = result.symbols.iter().find(|s| s.kind == SymbolKind::Module).unwrap();
        assert_eq!(module.name, "graphics.shapes");
        assert!(module.is_exported);
        assert_eq!(module.language_features["isExportedModule"], serde_json::json!(true));
    }
}
