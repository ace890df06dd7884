use tempfile::tempdir;

use crate::engine_wiring;

#[test]
fn wiring_a_fresh_data_dir_and_starting_a_demo_workflow_succeeds() {
    let dir = tempdir().unwrap();
    let (engine, provider) = engine_wiring::wire(dir.path()).unwrap();
    engine_wiring::ensure_demo_workflow(&provider, "demo");

    let response = wr_engine::start_workflow(&engine, "demo", serde_json::json!({})).unwrap();

    assert!(!response.is_complete);
    assert_eq!(response.pending.unwrap().step_id, "step-1");
}

#[test]
fn ensure_demo_workflow_does_not_overwrite_an_already_installed_workflow() {
    let dir = tempdir().unwrap();
    let (_engine, provider) = engine_wiring::wire(dir.path()).unwrap();

    engine_wiring::ensure_demo_workflow(&provider, "demo");
    let first = wr_engine::workflow::WorkflowProvider::fetch_by_id(provider.as_ref(), "demo").unwrap();

    engine_wiring::ensure_demo_workflow(&provider, "demo");
    let second = wr_engine::workflow::WorkflowProvider::fetch_by_id(provider.as_ref(), "demo").unwrap();

    assert_eq!(first.definition, second.definition);
}
