use std::{
    path::Path,
    process::Stdio,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader},
    process::{Child, Command},
    sync::{mpsc, oneshot, Mutex},
};
use tower_lsp::lsp_types::{Diagnostic, PublishDiagnosticsParams, Url};
use tracing::{debug, info, warn};

use super::{
    codec::{read_message, write_message},
    trim::{check_transform, trim_template},
};
use crate::{
    config::Settings,
    diagnostics::{remap, DiagnosticsRecord},
    error::{Error, Result},
};

/// Bound of the queue between the bridge and the editor-facing publisher.
/// A full queue makes the reader wait.
pub const DIAGNOSTICS_QUEUE_CAPACITY: usize = 1024;

/// Remapped diagnostics for one document, ready for the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsUpdate {
    pub uri: Url,
    pub diagnostics: Vec<Diagnostic>,
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// State shared by the connector and its reader task.
struct Shared {
    writer: Mutex<Writer>,
    next_id: AtomicI64,
    pending: DashMap<i64, oneshot::Sender<Result<Value>>>,
    records: DashMap<Url, DiagnosticsRecord>,
    /// The `yaml` settings section handed to the validator.
    settings: RwLock<Value>,
    diagnostics_limit: usize,
    diagnostics_tx: mpsc::Sender<DiagnosticsUpdate>,
}

impl Shared {
    async fn send(&self, message: Value) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, &message).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.send(json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        if let Err(err) = self
            .send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await
        {
            self.pending.remove(&id);
            return Err(err);
        }
        rx.await
            .map_err(|_| Error::Protocol(format!("validator exited before answering {method}")))?
    }

    async fn dispatch(&self, message: Value) -> Result<()> {
        let method = message.get("method").and_then(Value::as_str);
        let id = message.get("id").cloned();

        match (method, id) {
            (None, Some(id)) => {
                let Some((_, tx)) = id.as_i64().and_then(|id| self.pending.remove(&id)) else {
                    debug!("response to unknown request {id}");
                    return Ok(());
                };
                let result = match message.get("error") {
                    Some(error) => Err(Error::Protocol(error.to_string())),
                    None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
                };
                let _ = tx.send(result);
                Ok(())
            }
            (Some(method), Some(id)) => {
                let result = self.answer(method, message.get("params"));
                self.send(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
                    .await
            }
            (Some("textDocument/publishDiagnostics"), None) => {
                let params: PublishDiagnosticsParams =
                    serde_json::from_value(message.get("params").cloned().unwrap_or_default())?;
                self.publish(params).await;
                Ok(())
            }
            (Some(method), None) => {
                debug!("ignoring validator notification {method}");
                Ok(())
            }
            (None, None) => Err(Error::Protocol(format!("unexpected message {message}"))),
        }
    }

    /// Reply to a request the validator sends us. Only the configuration
    /// request carries data; everything else is acknowledged with `null`.
    fn answer(&self, method: &str, params: Option<&Value>) -> Value {
        match method {
            "workspace/configuration" => {
                let settings = self.settings.read();
                let items = params
                    .and_then(|params| params.get("items"))
                    .and_then(Value::as_array)
                    .map(|items| items.as_slice())
                    .unwrap_or_default();
                Value::Array(
                    items
                        .iter()
                        .map(|item| match item.get("section").and_then(Value::as_str) {
                            Some("yaml") => settings.clone(),
                            Some(section) => settings.get(section).cloned().unwrap_or(Value::Null),
                            None => json!({ "yaml": settings.clone() }),
                        })
                        .collect(),
                )
            }
            _ => {
                debug!("acknowledging validator request {method}");
                Value::Null
            }
        }
    }

    async fn publish(&self, params: PublishDiagnosticsParams) {
        let diagnostics = {
            let Some(mut record) = self.records.get_mut(&params.uri) else {
                debug!("dropping diagnostics for closed document {}", params.uri);
                return;
            };
            let diagnostics = remap(&record.map, params.diagnostics, self.diagnostics_limit);
            record.diagnostics = diagnostics.clone();
            diagnostics
        };

        let update = DiagnosticsUpdate {
            uri: params.uri,
            diagnostics,
        };
        if self.diagnostics_tx.send(update).await.is_err() {
            debug!("diagnostics receiver is gone");
        }
    }
}

/// JSON-RPC client of a yaml-language-server.
///
/// Template documents are forwarded as trimmed text under their own URI with
/// a version counter of their own. Diagnostics arrive asynchronously and are
/// pushed, remapped, onto the queue returned at construction.
///
/// Responses are not matched against the version they were computed for, so
/// diagnostics for an older text may briefly replace newer ones.
pub struct Connector {
    shared: Arc<Shared>,
    _child: Option<Child>,
}

impl Connector {
    /// Start the validator process and connect to its stdio.
    pub fn spawn(
        settings: &Settings,
        root: &Path,
    ) -> Result<(Connector, mpsc::Receiver<DiagnosticsUpdate>)> {
        let mut child = Command::new(&settings.validator_path)
            .arg("--stdio")
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Error::ValidatorUnavailable(format!("{}: {err}", settings.validator_path))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::ValidatorUnavailable(
                "validator stdio is not available".into(),
            ));
        };
        info!("started {} --stdio", settings.validator_path);

        let (mut connector, rx) = Connector::from_transport(
            stdout,
            stdin,
            settings.validator_settings.clone(),
            settings.validator_diagnostics_limit,
        );
        connector._child = Some(child);
        Ok((connector, rx))
    }

    /// Connect over an arbitrary byte stream pair and start the reader task.
    /// Must be called inside a tokio runtime.
    pub fn from_transport<R, W>(
        reader: R,
        writer: W,
        validator_settings: Value,
        diagnostics_limit: usize,
    ) -> (Connector, mpsc::Receiver<DiagnosticsUpdate>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (diagnostics_tx, diagnostics_rx) = mpsc::channel(DIAGNOSTICS_QUEUE_CAPACITY);
        let shared = Arc::new(Shared {
            writer: Mutex::new(Box::new(writer)),
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
            records: DashMap::new(),
            settings: RwLock::new(validator_settings),
            diagnostics_limit,
            diagnostics_tx,
        });

        let reader_shared = shared.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            loop {
                match read_message(&mut reader).await {
                    Ok(Some(message)) => {
                        if let Err(err) = reader_shared.dispatch(message).await {
                            warn!("validator message failed: {err}");
                        }
                    }
                    Ok(None) => {
                        info!("validator closed its output");
                        break;
                    }
                    Err(err) => {
                        warn!("validator stream failed: {err}");
                        break;
                    }
                }
            }
            // Wake every caller still waiting for an answer.
            reader_shared.pending.clear();
        });

        (
            Connector {
                shared,
                _child: None,
            },
            diagnostics_rx,
        )
    }

    /// Run the `initialize` handshake and push the current settings.
    pub async fn initialize(&self, root: &Path) -> Result<()> {
        let root_uri = Url::from_directory_path(root)
            .map_err(|_| Error::Protocol(format!("{} is not absolute", root.display())))?;
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.shared
            .request(
                "initialize",
                json!({
                    "processId": std::process::id(),
                    "rootUri": root_uri,
                    "workspaceFolders": [{ "uri": root_uri, "name": name }],
                    "capabilities": {
                        "workspace": { "configuration": true },
                        "textDocument": {
                            "publishDiagnostics": { "relatedInformation": false }
                        }
                    }
                }),
            )
            .await?;
        self.shared.notify("initialized", json!({})).await?;
        self.send_settings().await
    }

    async fn send_settings(&self) -> Result<()> {
        let settings = self.shared.settings.read().clone();
        self.shared
            .notify(
                "workspace/didChangeConfiguration",
                json!({ "settings": { "yaml": settings } }),
            )
            .await
    }

    /// Replace the validator settings and re-send them.
    pub async fn update_settings(&self, validator_settings: Value) -> Result<()> {
        *self.shared.settings.write() = validator_settings;
        self.send_settings().await
    }

    pub async fn did_open(&self, uri: &Url, text: &str) -> Result<()> {
        let trimmed = trim_template(text);
        check_transform(text, &trimmed)?;
        let record = DiagnosticsRecord::new(text);
        let version = record.synthetic_version;
        self.shared.records.insert(uri.clone(), record);

        self.shared
            .notify(
                "textDocument/didOpen",
                json!({
                    "textDocument": {
                        "uri": uri,
                        "languageId": "yaml",
                        "version": version,
                        "text": trimmed,
                    }
                }),
            )
            .await
    }

    /// Send the full new text. Documents the validator has not seen are opened.
    ///
    /// When trimming breaks the line structure nothing is sent and the
    /// previous diagnostics stay in place.
    pub async fn did_change(&self, uri: &Url, text: &str) -> Result<()> {
        if !self.shared.records.contains_key(uri) {
            return self.did_open(uri, text).await;
        }
        let trimmed = trim_template(text);
        check_transform(text, &trimmed)?;

        let Some(version) = self
            .shared
            .records
            .get_mut(uri)
            .map(|mut record| record.update(text))
        else {
            return self.did_open(uri, text).await;
        };

        self.shared
            .notify(
                "textDocument/didChange",
                json!({
                    "textDocument": { "uri": uri, "version": version },
                    "contentChanges": [{ "text": trimmed }],
                }),
            )
            .await
    }

    /// Forget the document and queue an empty update for it, behind anything
    /// already queued, so the editor's last word for it is "no diagnostics".
    pub async fn did_close(&self, uri: &Url) -> Result<()> {
        self.shared.records.remove(uri);
        let cleared = DiagnosticsUpdate {
            uri: uri.clone(),
            diagnostics: Vec::new(),
        };
        if self.shared.diagnostics_tx.send(cleared).await.is_err() {
            debug!("diagnostics receiver is gone");
        }
        self.shared
            .notify(
                "textDocument/didClose",
                json!({ "textDocument": { "uri": uri } }),
            )
            .await
    }

    /// Diagnostics last published for `uri`.
    pub fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic> {
        self.shared
            .records
            .get(uri)
            .map(|record| record.diagnostics.clone())
            .unwrap_or_default()
    }

    pub fn synthetic_version(&self, uri: &Url) -> Option<i32> {
        self.shared
            .records
            .get(uri)
            .map(|record| record.synthetic_version)
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.shared.records.contains_key(uri)
    }

    /// Whether a dequeued update should still reach the editor. Updates queued
    /// before their document closed are dropped; the clearing update is not.
    pub fn is_current(&self, update: &DiagnosticsUpdate) -> bool {
        update.diagnostics.is_empty() || self.is_open(&update.uri)
    }
}
