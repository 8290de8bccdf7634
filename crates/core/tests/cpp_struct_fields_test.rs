//! Scenario 1: a C++ struct's fields are linked to the struct as parent,
//! each field's qualified name scoped under the struct's, after a full
//! indexing pass (harness output carries `parent_scope`; the resolver turns
//! that into `parent_symbol_id` during interning).

use module_sentinel::{orchestrator, Config};
use protocol::{Language, SymbolKind};
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn struct_fields_are_linked_to_their_struct() {
    let db_dir = tempdir().unwrap();
    let db = store::GraphStore::open(&db_dir.path().join("graph.db")).unwrap();

    let project_dir = tempdir().unwrap();
    let src = "struct GenericResourceDesc { \
uint32_t width; uint32_t height; uint32_t depth; ResourceType type; Format format; \
uint32_t mipLevels; uint32_t arrayLayers; SampleCount samples; bool hostVisible; int extraField; };\n";
    fs::write(project_dir.path().join("resource.cpp"), src).unwrap();

    let config = Config::default();
    let result = orchestrator::run(&db, &config, "demo", project_dir.path(), &[Language::Cpp], false, Arc::new(AtomicBool::new(false))).unwrap();
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);

    let project = db.find_project_by_name("demo").unwrap().unwrap();
    let project_id = project.id.unwrap();

    let structs = db.find_symbols_by_qualified_name(project_id, "GenericResourceDesc").unwrap();
    assert_eq!(structs.len(), 1);
    let struct_id = structs[0].id.unwrap();
    assert_eq!(structs[0].kind, SymbolKind::Struct);

    let symbols = db.find_symbols_in_file(project_id, "resource.cpp").unwrap();
    let fields: Vec<_> = symbols.iter().filter(|s| s.kind == SymbolKind::Field).collect();
    assert_eq!(fields.len(), 10);
    for field in &fields {
        assert_eq!(field.parent_symbol_id, Some(struct_id));
        assert_eq!(field.qualified_name, format!("GenericResourceDesc::{}", field.name));
    }
}
