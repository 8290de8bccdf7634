//! Scenario 6: two files declaring the same inline function signature are
//! both stored, with the second flagged `duplicate_of` the first.

use module_sentinel::{orchestrator, Config};
use protocol::Language;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn identical_inline_function_in_two_files_collapses_to_one_canonical() {
    let db_dir = tempdir().unwrap();
    let db = store::GraphStore::open(&db_dir.path().join("graph.db")).unwrap();

    let project_dir = tempdir().unwrap();
    fs::write(project_dir.path().join("a.cpp"), "inline int helper(int x) { return x; }\n").unwrap();
    fs::write(project_dir.path().join("b.cpp"), "inline int helper(int x) { return x + 0; }\n").unwrap();

    let config = Config::default();
    let result = orchestrator::run(&db, &config, "demo", project_dir.path(), &[Language::Cpp], false, Arc::new(AtomicBool::new(false))).unwrap();
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);

    let project = db.find_project_by_name("demo").unwrap().unwrap();
    let project_id = project.id.unwrap();

    let helpers = db.find_symbols_by_qualified_name(project_id, "helper").unwrap();
    assert_eq!(helpers.len(), 2, "both declarations must be stored");

    let canonical_count = helpers.iter().filter(|s| s.duplicate_of.is_none()).count();
    let alias_count = helpers.iter().filter(|s| s.duplicate_of.is_some()).count();
    assert_eq!(canonical_count, 1);
    assert_eq!(alias_count, 1);

    let alias = helpers.iter().find(|s| s.duplicate_of.is_some()).unwrap();
    let canonical = helpers.iter().find(|s| s.duplicate_of.is_none()).unwrap();
    assert_eq!(alias.duplicate_of, canonical.id);
}
