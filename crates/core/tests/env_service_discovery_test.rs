//! Scenario 4: a Go `mustMapEnv` environment-variable read is recognized as
//! service discovery, normalized to the bare service name.

use module_sentinel::{orchestrator, Config};
use protocol::Language;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn env_var_read_is_recognized_as_service_discovery() {
    let db_dir = tempdir().unwrap();
    let db = store::GraphStore::open(&db_dir.path().join("graph.db")).unwrap();

    let project_dir = tempdir().unwrap();
    fs::write(
        project_dir.path().join("main.go"),
        "package main\n\nfunc initClients() {\n\tmustMapEnv(&svc.cartSvcAddr, \"CART_SERVICE_ADDR\")\n}\n",
    )
    .unwrap();

    let config = Config::default();
    let result = orchestrator::run(&db, &config, "demo", project_dir.path(), &[Language::Go], false, Arc::new(AtomicBool::new(false))).unwrap();
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);

    let project = db.find_project_by_name("demo").unwrap().unwrap();
    let project_id = project.id.unwrap();

    let cross_language = db.cross_language_relationships(project_id).unwrap();
    let edge = cross_language
        .iter()
        .find(|r| r.metadata.get("discoveryMethod").and_then(|v| v.as_str()) == Some("environment-variable"))
        .expect("expected an environment-variable discovery edge");

    assert_eq!(edge.to_name, "cartservice");
    assert_eq!(edge.metadata["envVar"], "CART_SERVICE_ADDR");
}
