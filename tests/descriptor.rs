//! Clients built from descriptors other than the bundled one.

mod common;

use std::path::PathBuf;

use anyhow::Result;
use cdp_mux::protocol::load_descriptor;
use cdp_mux::{ApiBuilder, BundledDescriptor, Error, FileDescriptor, ProtocolDescriptor};
use serde_json::json;

use common::{MockBrowser, builder, sync};

const CUSTOM: &str = r#"{
  "domains": [
    {
      "domain": "Echo",
      "commands": [
        { "name": "ping", "parameters": [ { "name": "payload", "optional": true } ] }
      ],
      "events": [ { "name": "ponged" } ]
    },
    {
      "domain": "Inspector",
      "events": [ { "name": "detached" } ]
    }
  ]
}"#;

const EXTRA: &str = r#"{
  "domains": [
    { "domain": "Extra", "commands": [ { "name": "poke" } ] }
  ]
}"#;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    std::fs::write(&path, body)?;
    Ok(path)
}

#[tokio::test]
async fn test_surface_follows_the_descriptor() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let custom = write(&dir, "custom.json", CUSTOM)?;
    let extra = write(&dir, "extra.json", EXTRA)?;

    let mut mock = MockBrowser::start().await;
    let client = builder()
        .descriptor_files([custom, extra])
        .connect(mock.ws_url())
        .await?;

    assert_eq!(client.api().len(), 3);
    assert!(matches!(client.domain("Page"), Err(Error::UnknownDomain { .. })));

    let echo = client.domain("Echo")?;
    assert_eq!(echo.commands(), vec!["ping"]);

    let pending = echo.start("ping", json!({"payload": "hi"}))?;
    let frame = mock.expect_method("Echo.ping").await;
    assert_eq!(frame["params"]["payload"], "hi");
    mock.reply(&frame, json!({"pong": "hi"}));
    assert_eq!(pending.await?["pong"], "hi");

    let pending = client.root().start("Extra", "poke", json!({}))?;
    let frame = mock.expect_method("Extra.poke").await;
    mock.reply(&frame, json!({}));
    pending.await?;

    Ok(())
}

#[tokio::test]
async fn test_session_management_without_target_domain() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let custom = write(&dir, "custom.json", CUSTOM)?;

    let mut mock = MockBrowser::start().await;
    let client = builder().descriptor_file(custom).connect(mock.ws_url()).await?;
    assert!(client.api().domain("Target").is_err());

    // Attach is built in and does not need Target in the descriptor.
    let session = common::attach(&client, &mut mock, "T1", "S1").await;

    let pending = session.start("Echo", "ping", json!({}))?;
    let frame = mock.expect_method("Echo.ping").await;
    assert_eq!(frame["sessionId"], "S1");
    mock.reply(&frame, json!({}));
    pending.await?;

    mock.emit(
        "Target.detachedFromTarget",
        json!({"sessionId": "S1"}),
        None,
    );
    sync(&client, &mock).await;
    assert!(!session.is_attached());

    Ok(())
}

#[test]
fn test_missing_file_is_descriptor_unavailable() {
    let source = FileDescriptor::new("/nonexistent/protocol.json");
    let err = tokio_test::block_on(load_descriptor(&source)).unwrap_err();
    assert!(matches!(err, Error::DescriptorUnavailable { .. }));
}

#[test]
fn test_duplicate_domains_across_files_are_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let a = write(&dir, "a.json", EXTRA)?;
    let b = write(&dir, "b.json", EXTRA)?;

    let err = tokio_test::block_on(load_descriptor(&FileDescriptor::merged([a, b]))).unwrap_err();
    assert!(err.to_string().contains("declared more than once"), "{err}");
    Ok(())
}

#[test]
fn test_bundled_descriptor_builds_the_session_surface() -> Result<()> {
    let descriptor = tokio_test::block_on(load_descriptor(&BundledDescriptor))?;
    let api = ApiBuilder::new(&descriptor).build();

    for method in [
        "Target.attachToTarget",
        "Target.detachFromTarget",
        "Target.setAutoAttach",
        "Target.getTargets",
    ] {
        assert!(api.command_by_method(method).is_ok(), "{method}");
    }
    for method in ["Target.attachedToTarget", "Target.detachedFromTarget"] {
        assert!(api.event_by_method(method).is_ok(), "{method}");
    }

    let stable = ApiBuilder::new(&descriptor).include_experimental(false).build();
    assert!(stable.command_count() < api.command_count());
    Ok(())
}

#[test]
fn test_descriptor_from_json_text() -> Result<()> {
    let descriptor = ProtocolDescriptor::from_json(CUSTOM)?;
    assert_eq!(descriptor.len(), 2);
    assert!(descriptor.domain("Echo").is_some());
    assert!(ProtocolDescriptor::from_json(r#"{"domains": []}"#).is_err());
    Ok(())
}
