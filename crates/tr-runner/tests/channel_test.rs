use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tr_core::RunnerConfig;
use tr_runner::{runner_router, RunnerState, SnippetExecutor};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_runner(root: PathBuf, executor: SnippetExecutor) -> String {
    let config = RunnerConfig {
        port: 0,
        root,
    };
    let state = Arc::new(RunnerState::with_executor(config, executor));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, runner_router(state))
            .await
            .expect("serve runner");
    });
    format!("ws://{addr}/ws")
}

async fn connect(url: &str) -> WsClient {
    let (ws, _) = connect_async(url).await.expect("ws connect");
    ws
}

async fn send_event(ws: &mut WsClient, event: serde_json::Value) {
    ws.send(Message::Text(event.to_string().into()))
        .await
        .expect("ws send");
}

async fn next_event(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("event is valid json");
        }
    }
}

/// A stand-in for the processing tool: echoes a line mentioning its branch
/// argument on stdout and a diagnostic on stderr.
fn write_fake_tool(dir: &Path) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-taylored");
    std::fs::write(&path, "#!/bin/sh\necho \"processed $3\"\necho \"diagnostic\" >&2\n")
        .expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("mark fake tool executable");
    path.display().to_string()
}

#[tokio::test]
async fn list_directory_streams_a_listing() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("projects")).unwrap();
    std::fs::write(root.path().join("readme.txt"), b"hello").unwrap();

    let url = spawn_runner(root.path().to_path_buf(), SnippetExecutor::new()).await;
    let mut ws = connect(&url).await;

    send_event(
        &mut ws,
        serde_json::json!({"event": "listDirectory", "payload": {"path": "/"}}),
    )
    .await;

    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "directoryListing");
    assert_eq!(event["payload"]["path"], root.path().display().to_string());

    let files = event["payload"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "projects");
    assert_eq!(files[0]["isDirectory"], true);
    assert_eq!(files[1]["name"], "readme.txt");
    assert_eq!(files[1]["isDirectory"], false);
}

#[tokio::test]
async fn path_traversal_is_denied() {
    let root = tempfile::tempdir().unwrap();
    let url = spawn_runner(root.path().to_path_buf(), SnippetExecutor::new()).await;
    let mut ws = connect(&url).await;

    send_event(
        &mut ws,
        serde_json::json!({"event": "listDirectory", "payload": {"path": "/../etc"}}),
    )
    .await;

    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "tayloredRunError");
    let error = event["payload"]["error"].as_str().unwrap();
    assert!(
        error.starts_with("Access denied: Path is outside"),
        "got: {error}"
    );
}

#[tokio::test]
async fn download_file_returns_base64_content() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("hello.txt"), b"hi").unwrap();

    let url = spawn_runner(root.path().to_path_buf(), SnippetExecutor::new()).await;
    let mut ws = connect(&url).await;

    send_event(
        &mut ws,
        serde_json::json!({"event": "downloadFile", "payload": {"path": "/hello.txt"}}),
    )
    .await;

    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "fileContent");
    // The payload echoes the requested path, not the resolved one.
    assert_eq!(event["payload"]["path"], "/hello.txt");
    assert_eq!(event["payload"]["content"], "aGk=");
}

#[tokio::test]
async fn snippet_run_tags_every_event_with_the_first_id() {
    let tools = tempfile::tempdir().unwrap();
    let tool = write_fake_tool(tools.path());
    let root = tempfile::tempdir().unwrap();

    let url = spawn_runner(root.path().to_path_buf(), SnippetExecutor::with_tool(tool)).await;
    let mut ws = connect(&url).await;

    let body = r#"<taylored number="42">first</taylored><taylored number="99">second</taylored>"#;
    send_event(
        &mut ws,
        serde_json::json!({"event": "tayloredRun", "payload": {"body": body}}),
    )
    .await;

    let mut saw_output = false;
    let mut saw_error = false;
    while !(saw_output && saw_error) {
        let event = next_event(&mut ws).await;
        match event["event"].as_str().unwrap() {
            "tayloredOutput" => {
                assert_eq!(event["payload"]["id"], 42);
                assert!(event["payload"]["output"]
                    .as_str()
                    .unwrap()
                    .contains("processed main"));
                saw_output = true;
            }
            "tayloredError" => {
                assert_eq!(event["payload"]["id"], 42);
                assert!(event["payload"]["error"].as_str().unwrap().contains("diagnostic"));
                saw_error = true;
            }
            other => panic!("unexpected event: {other}"),
        }
    }
}

#[tokio::test]
async fn snippet_body_without_blocks_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let url = spawn_runner(root.path().to_path_buf(), SnippetExecutor::new()).await;
    let mut ws = connect(&url).await;

    send_event(
        &mut ws,
        serde_json::json!({"event": "tayloredRun", "payload": {"body": "no blocks here"}}),
    )
    .await;

    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "tayloredRunError");
    assert_eq!(
        event["payload"]["error"],
        "Could not extract snippet ID (number) from XML data."
    );
}

#[tokio::test]
async fn a_running_snippet_does_not_block_filesystem_requests() {
    use std::os::unix::fs::PermissionsExt;

    let tools = tempfile::tempdir().unwrap();
    let slow_tool = tools.path().join("slow-taylored");
    std::fs::write(&slow_tool, "#!/bin/sh\nsleep 1\necho done\n").unwrap();
    std::fs::set_permissions(&slow_tool, std::fs::Permissions::from_mode(0o755)).unwrap();

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("marker"), b"x").unwrap();

    let url = spawn_runner(
        root.path().to_path_buf(),
        SnippetExecutor::with_tool(slow_tool.display().to_string()),
    )
    .await;
    let mut ws = connect(&url).await;

    send_event(
        &mut ws,
        serde_json::json!({
            "event": "tayloredRun",
            "payload": {"body": "<taylored number=\"1\">slow</taylored>"}
        }),
    )
    .await;
    send_event(
        &mut ws,
        serde_json::json!({"event": "listDirectory", "payload": {}}),
    )
    .await;

    // The listing answers while the snippet child is still sleeping.
    let first = next_event(&mut ws).await;
    assert_eq!(first["event"], "directoryListing");

    let second = next_event(&mut ws).await;
    assert_eq!(second["event"], "tayloredOutput");
    assert_eq!(second["payload"]["id"], 1);
}
