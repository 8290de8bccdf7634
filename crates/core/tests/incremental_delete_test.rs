//! Scenario 5: deleting a file from disk and re-running removes its rows
//! from `file_index` and `universal_symbols`, drops relationships sourced
//! from it, and leaves relationships that merely targeted it unresolved
//! with `to_name` preserved.

use module_sentinel::{orchestrator, Config};
use protocol::Language;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn deleting_a_file_clears_its_rows_and_unresolves_inbound_edges() {
    let db_dir = tempdir().unwrap();
    let db = store::GraphStore::open(&db_dir.path().join("graph.db")).unwrap();

    let project_dir = tempdir().unwrap();
    let a_path = project_dir.path().join("a.cpp");
    fs::write(&a_path, "int helper() { return 1; }\n").unwrap();
    fs::write(project_dir.path().join("b.cpp"), "int caller() { return helper(); }\n").unwrap();

    let config = Config::default();
    orchestrator::run(&db, &config, "demo", project_dir.path(), &[Language::Cpp], false, Arc::new(AtomicBool::new(false))).unwrap();

    let project = db.find_project_by_name("demo").unwrap().unwrap();
    let project_id = project.id.unwrap();

    // Sanity: helper() resolved before the delete.
    let before = db.all_relationships(project_id).unwrap();
    assert!(before.iter().any(|r| r.to_name == "helper" && r.to_symbol_id.is_some()));

    fs::remove_file(&a_path).unwrap();
    let second = orchestrator::run(&db, &config, "demo", project_dir.path(), &[Language::Cpp], false, Arc::new(AtomicBool::new(false))).unwrap();
    assert!(second.errors.is_empty(), "unexpected errors: {:?}", second.errors);

    assert!(db.find_symbols_in_file(project_id, "a.cpp").unwrap().is_empty());
    assert!(db.all_file_records(project_id).unwrap().iter().all(|r| r.relative_path != "a.cpp"));

    let after = db.all_relationships(project_id).unwrap();
    let helper_edge = after.iter().find(|r| r.to_name == "helper").expect("inbound edge to helper should survive, unresolved");
    assert_eq!(helper_edge.to_symbol_id, None);
    assert_eq!(helper_edge.to_name, "helper");
}
