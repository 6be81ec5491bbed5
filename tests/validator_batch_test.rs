//! Integration tests for the validator bridge against an in-memory validator.
//!
//! The fake validator answers every `didOpen`/`didChange` with one
//! `publishDiagnostics` notification, the way yaml-language-server does once a
//! document has been validated.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::{json, Value};
use tokio::{
    io::{duplex, split, BufReader, DuplexStream, ReadHalf, WriteHalf},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tower_lsp::lsp_types::Url;

use helm_lens::yamlls::{read_message, write_message, Connector, DiagnosticsUpdate};

const BATCH_SIZE: usize = 2048;

fn template(index: usize) -> String {
    format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {{{{ .Release.Name }}}}-{index}\n  labels:\n    {{{{- include \"app.labels\" . | nindent 4 }}}}\ndata:\n  index: \"{{{{ .Values.index }}}}\"\n"
    )
}

fn uri(index: usize) -> Url {
    Url::parse(&format!("file:///charts/app/templates/cm-{index}.yaml")).unwrap()
}

fn diagnostics_for(message: &Value) -> Option<Value> {
    if !matches!(
        message["method"].as_str()?,
        "textDocument/didOpen" | "textDocument/didChange"
    ) {
        return None;
    }
    let document = &message["params"]["textDocument"];
    let version = &document["version"];
    Some(json!({
        "jsonrpc": "2.0",
        "method": "textDocument/publishDiagnostics",
        "params": {
            "uri": document["uri"],
            "version": version,
            "diagnostics": [{
                "range": {
                    "start": { "line": 3, "character": 2 },
                    "end": { "line": 3, "character": 400 }
                },
                "severity": 1,
                "message": format!("validated version {version}")
            }]
        }
    }))
}

async fn fake_validator(
    reader: ReadHalf<DuplexStream>,
    mut writer: WriteHalf<DuplexStream>,
) -> usize {
    let mut reader = BufReader::new(reader);
    let mut validated = 0;
    while let Ok(Some(message)) = read_message(&mut reader).await {
        if let Some(reply) = diagnostics_for(&message) {
            validated += 1;
            if write_message(&mut writer, &reply).await.is_err() {
                break;
            }
        }
    }
    validated
}

fn connect() -> (
    Arc<Connector>,
    mpsc::Receiver<DiagnosticsUpdate>,
    JoinHandle<usize>,
) {
    let (client, server) = duplex(1 << 16);
    let (client_read, client_write) = split(client);
    let (server_read, server_write) = split(server);
    let (connector, rx) = Connector::from_transport(client_read, client_write, json!({}), 50);
    let validator = tokio::spawn(fake_validator(server_read, server_write));
    (Arc::new(connector), rx, validator)
}

/// Test: Every template of a large batch gets exactly one diagnostics record.
/// Opening and draining run concurrently, so the bounded queue is exercised
/// under backpressure.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_of_templates_publishes_one_record_per_file() {
    let (connector, mut rx, _validator) = connect();

    let sender = {
        let connector = connector.clone();
        tokio::spawn(async move {
            for index in 0..BATCH_SIZE {
                connector
                    .did_open(&uri(index), &template(index))
                    .await
                    .expect("did_open should succeed");
            }
        })
    };

    let mut received: HashMap<Url, Vec<DiagnosticsUpdate>> = HashMap::new();
    let mut total = 0;
    timeout(Duration::from_secs(120), async {
        while received.len() < BATCH_SIZE {
            let update = rx.recv().await.expect("bridge stopped early");
            total += 1;
            received.entry(update.uri.clone()).or_default().push(update);
        }
    })
    .await
    .expect("timed out waiting for diagnostics");
    sender.await.unwrap();

    assert_eq!(total, BATCH_SIZE);
    assert!(received.values().all(|updates| updates.len() == 1));
    for index in 0..BATCH_SIZE {
        let update = &received[&uri(index)][0];
        assert_eq!(update.diagnostics.len(), 1);
        assert_eq!(update.diagnostics[0].message, "Yamlls: validated version 1");
        // Clamped to the original line length.
        let line = template(index).lines().nth(3).unwrap().chars().count() as u32;
        assert_eq!(update.diagnostics[0].range.end.character, line);
        assert_eq!(connector.diagnostics(&uri(index)), update.diagnostics);
    }
}

/// Test: Rapid edits are all delivered in order. Intermediate results for
/// superseded versions are published too; the last record matches the last edit.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rapid_edits_settle_on_latest_version() {
    const EDITS: usize = 500;
    let (connector, mut rx, _validator) = connect();
    let document = uri(0);

    connector.did_open(&document, &template(0)).await.unwrap();
    let editor = {
        let connector = connector.clone();
        let document = document.clone();
        tokio::spawn(async move {
            for edit in 1..=EDITS {
                connector
                    .did_change(&document, &template(edit))
                    .await
                    .expect("did_change should succeed");
            }
        })
    };

    let last_message = format!("Yamlls: validated version {}", EDITS + 1);
    let mut versions = Vec::new();
    timeout(Duration::from_secs(60), async {
        loop {
            let update = rx.recv().await.expect("bridge stopped early");
            let message = update.diagnostics[0].message.clone();
            versions.push(message.clone());
            if message == last_message {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for the final version");
    editor.await.unwrap();

    assert_eq!(versions.len(), EDITS + 1);
    assert_eq!(connector.synthetic_version(&document), Some(EDITS as i32 + 1));
    assert_eq!(connector.diagnostics(&document)[0].message, last_message);
}

/// Test: A closed document never gets diagnostics again.
#[tokio::test]
async fn test_close_stops_diagnostics() {
    let (connector, mut rx, _validator) = connect();
    let document = uri(1);

    connector.did_open(&document, &template(1)).await.unwrap();
    timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();

    connector.did_close(&document).await.unwrap();
    assert!(!connector.is_open(&document));
    assert!(connector.diagnostics(&document).is_empty());
}
