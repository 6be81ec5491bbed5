//! The `tower_lsp` backend: editor notifications update the stores and the
//! validator bridge, requests are answered from the stores.

use std::{path::PathBuf, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::Value;
use tower_lsp::{
    jsonrpc::{Error as RpcError, Result as RpcResult},
    lsp_types::*,
    Client, LanguageServer,
};
use tracing::{debug, error, info, warn};

use crate::{
    completion::get_completions,
    config::Settings,
    gotodef::goto_definition,
    hover::hover,
    logging::LogHandle,
    references::references,
    workspace::Workspace,
    yamlls::Connector,
};

/// The configuration section requested from the editor.
pub const CONFIGURATION_SECTION: &str = "helm-ls";

pub struct Backend {
    client: Client,
    log_handle: Option<LogHandle>,
    settings: RwLock<Settings>,
    workspace: OnceCell<Workspace>,
    connector: OnceCell<Arc<Connector>>,
}

impl Backend {
    pub fn new(client: Client, log_handle: Option<LogHandle>) -> Backend {
        Backend {
            client,
            log_handle,
            settings: RwLock::new(Settings::default()),
            workspace: OnceCell::new(),
            connector: OnceCell::new(),
        }
    }

    fn workspace(&self) -> Option<&Workspace> {
        self.workspace.get()
    }

    fn connector(&self) -> Option<&Arc<Connector>> {
        self.connector.get()
    }

    /// Ask the editor for its `helm-ls` section and apply it.
    async fn load_configuration(&self) {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(CONFIGURATION_SECTION.to_string()),
        }];
        let section = match self.client.configuration(items).await {
            Ok(mut values) if !values.is_empty() => values.swap_remove(0),
            Ok(_) => Value::Null,
            Err(err) => {
                warn!("workspace/configuration failed: {err}");
                Value::Null
            }
        };

        let settings = self.settings.read().merged_with_client(&section);
        *self.settings.write() = settings.clone();
        debug!("settings: {settings:?}");

        if let Some(log_handle) = &self.log_handle {
            log_handle.set_level(&settings.log_level);
        }
        if let Some(workspace) = self.workspace() {
            workspace
                .charts
                .set_values_files_config(settings.values_files_config());
        }
        match self.connector() {
            Some(connector) => {
                if let Err(err) = connector
                    .update_settings(settings.validator_settings.clone())
                    .await
                {
                    warn!("failed to update validator settings: {err}");
                }
            }
            None if settings.validator_enabled => self.start_validator(&settings).await,
            None => info!("yaml validation is disabled"),
        }
    }

    /// Start the validator, sync documents opened so far and forward its
    /// diagnostics to the editor.
    async fn start_validator(&self, settings: &Settings) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        let (connector, mut diagnostics) = match Connector::spawn(settings, workspace.root_dir()) {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!("{err}; continuing without yaml diagnostics");
                return;
            }
        };
        if let Err(err) = connector.initialize(workspace.root_dir()).await {
            warn!("validator initialization failed: {err}");
            return;
        }

        let connector = Arc::new(connector);
        if self.connector.set(connector.clone()).is_err() {
            return;
        }

        let client = self.client.clone();
        let publisher = connector.clone();
        tokio::spawn(async move {
            while let Some(update) = diagnostics.recv().await {
                if !publisher.is_current(&update) {
                    debug!("dropping diagnostics for closed document {}", update.uri);
                    continue;
                }
                client
                    .publish_diagnostics(update.uri, update.diagnostics, None)
                    .await;
            }
            debug!("diagnostics publisher stopped");
        });

        for document in workspace.documents.documents() {
            if let Err(err) = connector.did_open(&document.uri, document.text()).await {
                warn!("failed to sync {}: {err}", document.uri);
            }
        }
    }
}

fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())
        .and_then(|uri| uri.to_file_path().ok())
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> RpcResult<InitializeResult> {
        let root_dir = workspace_root(&params).ok_or_else(|| {
            error!("initialize without a workspace folder or root uri");
            RpcError::invalid_params("helm-lens needs a workspace folder")
        })?;

        let settings = Settings::new(&root_dir).unwrap_or_else(|err| {
            warn!("failed to read settings files: {err}");
            Settings::default()
        });
        if let Some(log_handle) = &self.log_handle {
            log_handle.set_level(&settings.log_level);
        }
        info!("workspace root {}", root_dir.display());

        let _ = self
            .workspace
            .set(Workspace::new(root_dir, settings.values_files_config()));
        *self.settings.write() = settings;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".to_string(), "$".to_string()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.load_configuration().await;
        info!("helm-lens initialized");
    }

    async fn shutdown(&self) -> RpcResult<()> {
        Ok(())
    }

    async fn did_change_configuration(&self, _: DidChangeConfigurationParams) {
        self.load_configuration().await;
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        let item = params.text_document;
        workspace
            .documents
            .open(item.uri.clone(), &item.text, item.version);

        if let Some(connector) = self.connector() {
            if let Err(err) = connector.did_open(&item.uri, &item.text).await {
                warn!("validator did_open {}: {err}", item.uri);
            }
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let uri = params.text_document.uri;
        workspace
            .documents
            .on_document_change(uri.clone(), &change.text, params.text_document.version);

        if let Some(connector) = self.connector() {
            if let Err(err) = connector.did_change(&uri, &change.text).await {
                warn!("validator did_change {uri}: {err}");
            }
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        if let Ok(path) = params.text_document.uri.to_file_path() {
            workspace.charts.invalidate(&path);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let Some(workspace) = self.workspace() else {
            return;
        };
        let uri = params.text_document.uri;
        workspace.documents.close(&uri);

        // The clearing update travels through the diagnostics queue.
        if let Some(connector) = self.connector() {
            if let Err(err) = connector.did_close(&uri).await {
                warn!("validator did_close {uri}: {err}");
            }
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> RpcResult<Option<GotoDefinitionResponse>> {
        let Some(workspace) = self.workspace() else {
            return Ok(None);
        };
        let position = params.text_document_position_params;
        Ok(
            goto_definition(workspace, &position.text_document.uri, position.position)
                .map(GotoDefinitionResponse::Array),
        )
    }

    async fn references(&self, params: ReferenceParams) -> RpcResult<Option<Vec<Location>>> {
        let Some(workspace) = self.workspace() else {
            return Ok(None);
        };
        let position = params.text_document_position;
        Ok(references(
            workspace,
            &position.text_document.uri,
            position.position,
        ))
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let Some(workspace) = self.workspace() else {
            return Ok(None);
        };
        let position = params.text_document_position_params;
        Ok(hover(workspace, &position.text_document.uri, position.position))
    }

    async fn completion(&self, params: CompletionParams) -> RpcResult<Option<CompletionResponse>> {
        let Some(workspace) = self.workspace() else {
            return Ok(None);
        };
        Ok(get_completions(workspace, &params))
    }
}
