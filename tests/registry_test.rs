//! Integration tests for component selection and construction.

use std::sync::Arc;

use batchq::error::Error;
use batchq::model::{PayloadRecord, WorkRecord};
use batchq::queue::MemoryWorkQueue;
use batchq::registry::{ComponentRegistry, ComponentSelection};

#[test]
fn empty_selection_defaults_to_memory() {
    let selection = ComponentSelection::parse("").unwrap();
    assert_eq!(selection.components.work_queue, "memory");
    assert_eq!(selection.components.payload_store, "memory");
    assert_eq!(selection.components.result_store, "memory");

    ComponentRegistry::with_defaults().build(&selection).unwrap();
}

#[tokio::test]
async fn filesystem_stores_from_selection_file() {
    let dir = tempfile::tempdir().unwrap();
    let payload_dir = dir.path().join("payloads");
    let result_dir = dir.path().join("results");
    let file = dir.path().join("components.toml");
    std::fs::write(
        &file,
        format!(
            r#"
[components]
work_queue = "memory"
payload_store = "filesystem"
result_store = "filesystem"

[settings]
payload_dir = "{}"
result_dir = "{}"
"#,
            payload_dir.display(),
            result_dir.display()
        ),
    )
    .unwrap();

    let selection = ComponentSelection::load(&file).unwrap();
    assert_eq!(selection.settings.get("payload_dir"), payload_dir.to_str());

    let components = ComponentRegistry::with_defaults().build(&selection).unwrap();
    components
        .payloads
        .store(PayloadRecord::new("job-echo", b"data".to_vec()))
        .await
        .unwrap();
    assert!(payload_dir.join("job-echo").is_file());
    assert!(result_dir.is_dir());

    let sent = components
        .queue
        .send(WorkRecord::new("job", "echo"))
        .await
        .unwrap();
    assert!(sent.message_id().is_some());
}

#[test]
fn unknown_component_name_is_reported() {
    let selection = ComponentSelection::parse(
        r#"
[components]
work_queue = "sqs"
"#,
    )
    .unwrap();

    match ComponentRegistry::with_defaults().build(&selection) {
        Err(Error::UnknownComponent { kind, name }) => {
            assert_eq!(kind, "work queue");
            assert_eq!(name, "sqs");
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("build should fail"),
    }
}

#[test]
fn filesystem_store_without_directory_setting_fails() {
    let selection = ComponentSelection::parse(
        r#"
[components]
result_store = "filesystem"
"#,
    )
    .unwrap();

    assert!(matches!(
        ComponentRegistry::with_defaults().build(&selection),
        Err(Error::Config(_))
    ));
}

#[test]
fn malformed_selection_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("components.toml");
    std::fs::write(&file, "[components\nwork_queue = ").unwrap();

    assert!(matches!(
        ComponentSelection::load(&file),
        Err(Error::Config(_))
    ));
}

#[test]
fn custom_constructors_can_be_registered() {
    let mut registry = ComponentRegistry::with_defaults();
    registry.register_queue("short-lease", |settings| {
        let secs: u64 = settings
            .get("lease_secs")
            .unwrap_or("30")
            .parse()
            .map_err(|e| Error::Config(format!("lease_secs: {e}")))?;
        Ok(Arc::new(MemoryWorkQueue::with_lease_timeout(
            std::time::Duration::from_secs(secs),
        )))
    });

    let selection = ComponentSelection::parse(
        r#"
[components]
work_queue = "short-lease"

[settings]
lease_secs = "5"
"#,
    )
    .unwrap();
    registry.build(&selection).unwrap();
}
