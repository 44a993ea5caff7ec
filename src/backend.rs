//! LSP Backend implementation

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::config::EngineConfig;
use crate::diagnostics::replacement_of;
use crate::document::Document;
use crate::engine::{Completion, CompletionKind, SchemaRegistry, YamlEngine};
use crate::schema::property_index::{CancelToken, MetadataFileBuilder, PropertyIndexCache};
use crate::text::{LineIndex, Region};

/// The workspace's property index and its cache key.
#[derive(Clone)]
struct ProjectIndex {
    cache: Arc<PropertyIndexCache>,
    key: String,
}

/// The LSP backend that handles all language server requests
pub struct Backend {
    /// The LSP client for sending notifications
    client: Client,
    /// Map of document URIs to their state
    documents: Arc<RwLock<HashMap<Url, Document>>>,
    /// Replaced once the client's initialization options are known
    registry: RwLock<Arc<SchemaRegistry>>,
    /// Set when a property metadata file is configured
    index: RwLock<Option<ProjectIndex>>,
}

impl Backend {
    /// Create a new backend instance
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            registry: RwLock::new(Arc::new(SchemaRegistry::load(EngineConfig::default()))),
            index: RwLock::new(None),
        }
    }

    /// Builds the property index when none is installed, also after an
    /// idle eviction. A failed build leaves index-backed types degraded.
    async fn ensure_index(&self) {
        let Some(index) = self.index.read().await.clone() else {
            return;
        };
        if let Err(error) = index.cache.get_or_build(&index.key, &CancelToken::new()).await {
            tracing::warn!("Property index {} unavailable: {}", index.key, error);
        }
    }

    /// Rebuilds the property index and reconciles every open document
    /// against it.
    async fn reload_index(&self, index: ProjectIndex) {
        if let Err(error) = index.cache.rebuild(&index.key, &CancelToken::new()).await {
            tracing::warn!("Property index {} not rebuilt: {}", index.key, error);
            return;
        }
        let uris: Vec<Url> = {
            let mut docs = self.documents.write().await;
            docs.values_mut().for_each(Document::invalidate);
            docs.keys().cloned().collect()
        };
        for uri in uris {
            self.validate_document(&uri).await;
        }
    }

    async fn engine_for(&self, uri: &Url) -> Option<Arc<YamlEngine>> {
        self.registry.read().await.engine_for(uri.as_str())
    }

    async fn text_of(&self, uri: &Url) -> Option<String> {
        let docs = self.documents.read().await;
        docs.get(uri).map(|doc| doc.text().to_string())
    }

    /// Reconcile a document and publish its problems. Runs until a result
    /// for the latest text has been published or another run took over.
    async fn validate_document(&self, uri: &Url) {
        self.ensure_index().await;
        loop {
            let snapshot = {
                let mut docs = self.documents.write().await;
                match docs.get_mut(uri).and_then(Document::begin_reconcile) {
                    Some(snapshot) => snapshot,
                    None => return,
                }
            };

            let diagnostics = match self.engine_for(uri).await {
                Some(engine) => {
                    let text = snapshot.text.clone();
                    match tokio::task::spawn_blocking(move || compute_diagnostics(&engine, &text))
                        .await
                    {
                        Ok(diagnostics) => diagnostics,
                        Err(error) => {
                            tracing::warn!("Reconcile of {} failed: {}", uri, error);
                            Vec::new()
                        }
                    }
                }
                None => Vec::new(),
            };

            let fresh = {
                let mut docs = self.documents.write().await;
                docs.get_mut(uri)
                    .is_some_and(|doc| doc.finish_reconcile(snapshot.generation))
            };
            if fresh {
                self.client
                    .publish_diagnostics(uri.clone(), diagnostics, Some(snapshot.version))
                    .await;
                return;
            }
            tracing::debug!(
                "Discarding stale problems for {} (generation {})",
                uri,
                snapshot.generation
            );
        }
    }
}

/// Compute diagnostics for the given text
fn compute_diagnostics(engine: &YamlEngine, text: &str) -> Vec<Diagnostic> {
    let index = LineIndex::new(text);
    engine
        .reconcile(text)
        .iter()
        .filter_map(|problem| problem.to_diagnostic(text, &index))
        .collect()
}

/// Quick fixes for our diagnostics that carry a replacement.
fn quick_fixes(uri: &Url, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    diagnostics
        .iter()
        .filter_map(|diagnostic| {
            let replacement = replacement_of(diagnostic)?;
            let edit = TextEdit {
                range: diagnostic.range,
                new_text: replacement.to_string(),
            };
            Some(CodeActionOrCommand::CodeAction(CodeAction {
                title: format!("Replace with '{}'", replacement),
                kind: Some(CodeActionKind::QUICKFIX),
                diagnostics: Some(vec![diagnostic.clone()]),
                edit: Some(WorkspaceEdit {
                    changes: Some(HashMap::from([(uri.clone(), vec![edit])])),
                    ..Default::default()
                }),
                is_preferred: Some(true),
                ..Default::default()
            }))
        })
        .collect()
}

fn to_range(text: &str, index: &LineIndex, region: Region) -> Range {
    let (start_line, start_col) = index.position_of(text, region.start);
    let (end_line, end_col) = index.position_of(text, region.end);
    Range {
        start: Position::new(start_line, start_col),
        end: Position::new(end_line, end_col),
    }
}

fn to_completion_item(
    text: &str,
    index: &LineIndex,
    rank: usize,
    completion: Completion,
) -> CompletionItem {
    // Clients filter on the replaced text, which includes the indentation
    // a (de)indented proposal rewrites.
    let replaced = completion.replace.text(text);
    let indentation = &replaced[..replaced.len() - replaced.trim_start().len()];
    let bare_label = completion
        .label
        .trim_start_matches(|c| c == '→' || c == '←' || c == ' ');

    CompletionItem {
        label: completion.label.clone(),
        kind: Some(match completion.kind {
            CompletionKind::Property => CompletionItemKind::PROPERTY,
            CompletionKind::Value => CompletionItemKind::VALUE,
        }),
        detail: completion.detail,
        documentation: completion.documentation.map(|doc| {
            Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: doc.render_as_markdown(),
            })
        }),
        tags: completion
            .deprecated
            .then(|| vec![CompletionItemTag::DEPRECATED]),
        sort_text: Some(format!("{:05}", rank)),
        filter_text: Some(format!("{}{}", indentation, bare_label)),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit {
            range: to_range(text, index, completion.replace),
            new_text: completion.insert_text,
        })),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let config = EngineConfig::from_init_options(params.initialization_options);
        let mut registry = SchemaRegistry::new(config.clone());
        if let Some(path) = &config.property_metadata {
            let cache = Arc::new(PropertyIndexCache::new(
                MetadataFileBuilder,
                config.index_idle_ttl(),
            ));
            let key = path.to_string_lossy().into_owned();
            registry = registry.with_property_index(Arc::new(cache.lookup_for(&key)));
            tracing::info!("Property index from {}", key);
            *self.index.write().await = Some(ProjectIndex { cache, key });
        }
        let registry = registry.load_dialects();
        tracing::info!("Serving dialects: {}", registry.dialect_names().join(", "));
        *self.registry.write().await = Arc::new(registry);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![":".to_string(), "-".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "yaml-assist-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("Server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document opened: {}", uri);

        {
            let mut docs = self.documents.write().await;
            docs.insert(
                uri.clone(),
                Document::new(params.text_document.text, params.text_document.version),
            );
        }

        self.validate_document(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // FULL sync: the last change carries the whole text
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        tracing::debug!("Document changed: {}", uri);

        {
            let mut docs = self.documents.write().await;
            match docs.get_mut(&uri) {
                Some(doc) => doc.update(change.text, version),
                None => {
                    docs.insert(uri.clone(), Document::new(change.text, version));
                }
            }
        }

        self.validate_document(&uri).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document saved: {}", uri);

        let Some(index) = self.index.read().await.clone() else {
            return;
        };
        if uri.to_file_path().ok().as_deref() == Some(Path::new(&index.key)) {
            self.reload_index(index).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        {
            let mut docs = self.documents.write().await;
            docs.remove(&uri);
        }

        // Clear diagnostics for this document
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some(text) = self.text_of(&uri).await else {
            return Ok(None);
        };
        let Some(engine) = self.engine_for(&uri).await else {
            return Ok(None);
        };
        self.ensure_index().await;

        let index = LineIndex::new(&text);
        let offset = index.offset_of(&text, position.line, position.character);
        let items: Vec<CompletionItem> = engine
            .complete(&text, offset)
            .into_iter()
            .enumerate()
            .map(|(rank, completion)| to_completion_item(&text, &index, rank, completion))
            .collect();
        tracing::debug!("{} completions at {}:{}", items.len(), uri, offset);

        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(text) = self.text_of(&uri).await else {
            return Ok(None);
        };
        let Some(engine) = self.engine_for(&uri).await else {
            return Ok(None);
        };
        self.ensure_index().await;

        let index = LineIndex::new(&text);
        let offset = index.offset_of(&text, position.line, position.character);
        Ok(engine.hover(&text, offset).map(|hover| Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: hover.markdown,
            }),
            range: Some(to_range(&text, &index, hover.region)),
        }))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let actions = quick_fixes(&params.text_document.uri, &params.context.diagnostics);
        tracing::debug!("{} quick fixes for {}", actions.len(), params.text_document.uri);
        if actions.is_empty() {
            return Ok(None);
        }
        Ok(Some(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Problem, ProblemKind};
    use crate::renderable::Renderable;

    fn completion(label: &str, insert_text: &str, replace: Region) -> Completion {
        Completion {
            label: label.to_string(),
            insert_text: insert_text.to_string(),
            detail: Some("String".to_string()),
            documentation: Some(Renderable::text("The name.")),
            replace,
            score: 1.0,
            kind: CompletionKind::Property,
            deprecated: false,
        }
    }

    #[test]
    fn test_completion_item_edits_replace_region() {
        let text = "a: 1\nna";
        let index = LineIndex::new(text);
        let item = to_completion_item(text, &index, 3, completion("name", "name: $1", Region::new(5, 7)));

        assert_eq!(item.sort_text.as_deref(), Some("00003"));
        assert_eq!(item.insert_text_format, Some(InsertTextFormat::SNIPPET));
        assert_eq!(item.kind, Some(CompletionItemKind::PROPERTY));
        assert_eq!(item.tags, None);
        match item.text_edit {
            Some(CompletionTextEdit::Edit(edit)) => {
                assert_eq!(edit.range.start, Position::new(1, 0));
                assert_eq!(edit.range.end, Position::new(1, 2));
                assert_eq!(edit.new_text, "name: $1");
            }
            other => panic!("unexpected edit {:?}", other),
        }
        match item.documentation {
            Some(Documentation::MarkupContent(content)) => assert_eq!(content.value, "The name."),
            other => panic!("unexpected documentation {:?}", other),
        }
    }

    #[test]
    fn test_dedented_completion_filters_on_indentation() {
        let text = "a:\n  b: 1\n    na";
        let index = LineIndex::new(text);
        let start = text.rfind('\n').unwrap() + 1;
        let item = to_completion_item(
            text,
            &index,
            0,
            completion("← name", "name: $1", Region::new(start, text.len())),
        );
        assert_eq!(item.filter_text.as_deref(), Some("    name"));
        assert_eq!(item.label, "← name");
    }

    #[test]
    fn test_deprecated_completion_is_tagged() {
        let text = "";
        let index = LineIndex::new(text);
        let mut deprecated = completion("old", "old: $1", Region::empty(0));
        deprecated.deprecated = true;
        let item = to_completion_item(text, &index, 0, deprecated);
        assert_eq!(item.tags, Some(vec![CompletionItemTag::DEPRECATED]));
    }

    #[test]
    fn test_quick_fix_replaces_deprecated_value() {
        let text = "mode: old\nname: x\n";
        let index = LineIndex::new(text);
        let uri = Url::parse("file:///repo/app.yaml").unwrap();
        let diagnostics: Vec<Diagnostic> = [
            Problem::new(ProblemKind::Deprecated, Region::new(6, 9), "Use 'new'")
                .with_replacement("new"),
            Problem::new(ProblemKind::UnknownProperty, Region::new(10, 14), "Unknown property"),
        ]
        .iter()
        .filter_map(|p| p.to_diagnostic(text, &index))
        .collect();

        let actions = quick_fixes(&uri, &diagnostics);
        assert_eq!(actions.len(), 1);
        let CodeActionOrCommand::CodeAction(action) = &actions[0] else {
            panic!("unexpected command {:?}", actions[0]);
        };
        assert_eq!(action.kind, Some(CodeActionKind::QUICKFIX));
        assert_eq!(action.title, "Replace with 'new'");
        assert_eq!(action.diagnostics.as_deref(), Some(&diagnostics[..1]));
        let edits = action
            .edit
            .as_ref()
            .and_then(|edit| edit.changes.as_ref())
            .and_then(|changes| changes.get(&uri))
            .expect("Expected edits for the document");
        assert_eq!(
            edits,
            &vec![TextEdit {
                range: Range::new(Position::new(0, 6), Position::new(0, 9)),
                new_text: "new".to_string(),
            }]
        );
    }
}
