use std::sync::Arc;

use shared::{
    domain::{FieldSchema, HandlerOption, MetadataEntry, PreviewResult, RenderScale},
    error::{DisplayError, ErrorCategory, ErrorContext},
    protocol::{is_reserved_key, URL_VALUE_LIMIT},
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

pub mod config_file;
pub mod config_store;
pub mod handler_resolver;
pub mod metadata_store;
pub mod preview_sync;
pub mod registry;
pub mod transport;
pub mod url_sync;

pub use config_file::{export_config, parse_config_file, ImportError};
pub use config_store::{ConfigSnapshot, ConfigStore};
pub use handler_resolver::{HandlerDependencyResolver, HandlerError, HandlerOutcome, HandlerTicket};
pub use metadata_store::{EnvironmentProbe, MetadataStore, StaticEnvironment, SystemEnvironment};
pub use preview_sync::{
    PreviewError, PreviewInputs, PreviewOutcome, PreviewSubmission, PreviewSync, PreviewTicket,
};
pub use registry::{FnHandler, HandlerCall, HandlerRegistry, SchemaHandler};
pub use transport::{HttpBackend, MissingPreviewBackend, PreviewBackend};
pub use url_sync::{MemoryHistory, QueryHistory, UrlSync};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Longest value, in characters, that is still written to the URL.
    pub url_value_limit: usize,
    /// Re-render once more after a burst of edits that arrived mid-request.
    pub trailing_refresh: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            url_value_limit: URL_VALUE_LIMIT,
            trailing_refresh: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("field id {0:?} is reserved for editor metadata")]
    ReservedKey(String),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("failed to serialize config: {0}")]
    Export(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub enum EditorEvent {
    QueryReplaced(String),
    PreviewUpdated(PreviewResult),
    PreviewFailed(DisplayError),
    HandlerOptionsUpdated {
        field_id: String,
        options: Vec<HandlerOption>,
    },
    ImportRejected(DisplayError),
}

#[derive(Debug)]
pub enum EditorCommand {
    SetField { id: String, value: String },
    RemoveField(String),
    SetRenderScale(Option<RenderScale>),
    SetTimezone(String),
    SetLocale(String),
    ResetToDefaults,
    ImportConfig(Vec<u8>),
    ExportConfig(oneshot::Sender<Result<String, EditorError>>),
}

#[derive(Debug)]
enum Completion {
    Preview {
        seq: u64,
        result: Result<PreviewResult, PreviewError>,
    },
    Handler {
        field_id: String,
        seq: u64,
        result: Result<Vec<HandlerOption>, HandlerError>,
    },
}

/// Owns every editor component and serializes all state changes.
///
/// Network requests run on spawned tasks; their results come back through an
/// internal channel and are applied by [`EditorSession::step`], so stores are
/// only ever mutated from whoever drives the session. Spawning requires a
/// Tokio runtime.
pub struct EditorSession {
    schema: Vec<FieldSchema>,
    store: ConfigStore,
    metadata: MetadataStore,
    url: UrlSync,
    preview: PreviewSync,
    resolver: HandlerDependencyResolver,
    registry: HandlerRegistry,
    backend: Arc<dyn PreviewBackend>,
    environment: Box<dyn EnvironmentProbe>,
    hydrating: bool,
    observed_revision: Option<u64>,
    pending: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<EditorEvent>,
}

impl EditorSession {
    pub fn new(
        schema: Vec<FieldSchema>,
        backend: Arc<dyn PreviewBackend>,
        history: Box<dyn QueryHistory>,
    ) -> Self {
        Self::new_with_dependencies(
            SessionOptions::default(),
            schema,
            backend,
            HandlerRegistry::new(),
            history,
            Box::new(SystemEnvironment),
        )
    }

    pub fn new_with_dependencies(
        options: SessionOptions,
        schema: Vec<FieldSchema>,
        backend: Arc<dyn PreviewBackend>,
        registry: HandlerRegistry,
        history: Box<dyn QueryHistory>,
        environment: Box<dyn EnvironmentProbe>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let resolver = HandlerDependencyResolver::from_schema(&schema);
        for name in resolver.handler_names() {
            if registry.get(name).is_none() {
                warn!(handler = name, "session: schema references an unregistered handler");
            }
        }
        Self {
            resolver,
            schema,
            store: ConfigStore::new(),
            metadata: MetadataStore::new(),
            url: UrlSync::new(history, options.url_value_limit),
            preview: PreviewSync::new(options.trailing_refresh),
            registry,
            backend,
            environment,
            hydrating: true,
            observed_revision: None,
            pending: 0,
            completions_tx,
            completions_rx,
            events,
        }
    }

    /// Restores state from the URL, fills environment and schema defaults and
    /// then publishes the first query, preview request and handler lookups.
    pub fn mount(&mut self) {
        if !self.hydrating {
            debug!("session: already mounted");
            return;
        }
        let restored = self.url.hydrate(&mut self.store, &mut self.metadata);
        self.metadata.inject_defaults(self.environment.as_ref());
        let filled = self.store.fill_missing_defaults(&self.schema);
        self.hydrating = false;
        info!(restored, filled, "session: mounted");
        self.flush();
    }

    pub fn set_field(
        &mut self,
        id: impl Into<String>,
        value: impl ToString,
    ) -> Result<(), EditorError> {
        let id = id.into();
        if is_reserved_key(&id) {
            return Err(EditorError::ReservedKey(id));
        }
        if self.store.set(id, value) {
            self.flush();
        }
        Ok(())
    }

    pub fn remove_field(&mut self, id: &str) -> bool {
        let removed = self.store.remove(id).is_some();
        if removed {
            self.flush();
        }
        removed
    }

    pub fn set_render_scale(&mut self, scale: Option<RenderScale>) {
        if self.metadata.set_render_scale(scale) {
            self.flush();
        }
    }

    pub fn set_timezone(&mut self, timezone: impl Into<String>) {
        if self.metadata.set_timezone(timezone) {
            self.flush();
        }
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        if self.metadata.set_locale(locale) {
            self.flush();
        }
    }

    /// Restores schema defaults; fields without a default keep their value.
    pub fn reset(&mut self) -> usize {
        let changed = self.store.reset_to_defaults(&self.schema);
        info!(changed, "session: reset to defaults");
        if changed > 0 {
            self.flush();
        }
        changed
    }

    /// Replaces the whole config with the file's contents. A file that fails
    /// validation leaves the store untouched.
    pub fn import_config(&mut self, bytes: &[u8]) -> Result<usize, EditorError> {
        let entries = match parse_config_file(bytes) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("session: import rejected: {err}");
                let _ = self.events.send(EditorEvent::ImportRejected(DisplayError::new(
                    ErrorCategory::Validation,
                    ErrorContext::Import,
                    err.to_string(),
                )));
                return Err(err.into());
            }
        };
        let count = entries.len();
        self.store.replace_all(entries);
        info!(fields = count, "session: config imported");
        self.flush();
        Ok(count)
    }

    pub fn export_config(&self) -> Result<String, EditorError> {
        Ok(export_config(&self.store.get_all())?)
    }

    pub fn apply(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::SetField { id, value } => {
                if let Err(err) = self.set_field(id, value) {
                    warn!("session: edit rejected: {err}");
                }
            }
            EditorCommand::RemoveField(id) => {
                self.remove_field(&id);
            }
            EditorCommand::SetRenderScale(scale) => self.set_render_scale(scale),
            EditorCommand::SetTimezone(timezone) => self.set_timezone(timezone),
            EditorCommand::SetLocale(locale) => self.set_locale(locale),
            EditorCommand::ResetToDefaults => {
                self.reset();
            }
            EditorCommand::ImportConfig(bytes) => {
                let _ = self.import_config(&bytes);
            }
            EditorCommand::ExportConfig(reply) => {
                let _ = reply.send(self.export_config());
            }
        }
    }

    /// Waits for the next outstanding request and applies its result.
    /// Returns `false` when nothing is in flight.
    pub async fn step(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.handle_completion(completion);
                true
            }
            None => false,
        }
    }

    pub async fn run_until_idle(&mut self) {
        while self.step().await {}
    }

    /// Serves commands until the sender side closes, applying request results
    /// as they arrive, then drains whatever is still in flight.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<EditorCommand>) {
        loop {
            tokio::select! {
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_completion(completion);
                }
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
            }
        }
        self.run_until_idle().await;
    }

    pub fn config(&self) -> ConfigSnapshot {
        self.store.get_all()
    }

    pub fn metadata(&self) -> &MetadataEntry {
        self.metadata.entry()
    }

    pub fn schema(&self) -> &[FieldSchema] {
        &self.schema
    }

    pub fn preview(&self) -> Option<&PreviewResult> {
        self.preview.current()
    }

    pub fn is_preview_loading(&self) -> bool {
        self.preview.is_loading()
    }

    pub fn handler_options(&self, field_id: &str) -> &[HandlerOption] {
        self.resolver.options(field_id)
    }

    pub fn query(&self) -> String {
        self.url.current_query()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    /// Compares the current state with what was last published and issues
    /// whatever follows from the difference. Suppressed while hydrating.
    fn flush(&mut self) {
        if self.hydrating {
            return;
        }
        let config = self.store.get_all();
        let metadata = self.metadata.entry().clone();

        if let Some(query) = self.url.sync(&config, &metadata) {
            debug!(len = query.len(), "url: query replaced");
            let _ = self.events.send(EditorEvent::QueryReplaced(query));
        }

        let inputs = PreviewInputs {
            config: config.clone(),
            metadata,
        };
        if let Some(ticket) = self.preview.observe(&inputs) {
            self.spawn_preview(ticket);
        }

        // Handlers only depend on config; metadata-only changes skip them.
        let revision = self.store.revision();
        if self.observed_revision != Some(revision) {
            self.observed_revision = Some(revision);
            for ticket in self.resolver.observe(&config) {
                self.spawn_handler(ticket, &config);
            }
        }
    }

    fn spawn_preview(&mut self, ticket: PreviewTicket) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions_tx.clone();
        self.pending += 1;
        tokio::spawn(async move {
            let result = backend.render(ticket.submission).await;
            let _ = completions.send(Completion::Preview {
                seq: ticket.seq,
                result,
            });
        });
    }

    fn spawn_handler(&mut self, ticket: HandlerTicket, config: &ConfigSnapshot) {
        let completions = self.completions_tx.clone();
        self.pending += 1;
        let Some(handler) = self.registry.get(&ticket.handler) else {
            let _ = completions.send(Completion::Handler {
                field_id: ticket.field_id,
                seq: ticket.seq,
                result: Err(HandlerError::Unregistered(ticket.handler)),
            });
            return;
        };
        let call = HandlerCall {
            field_id: ticket.field_id.clone(),
            handler: ticket.handler,
            param: ticket.param,
            config: config.entries().to_vec(),
        };
        tokio::spawn(async move {
            let result = handler
                .call(call)
                .await
                .map_err(|err| HandlerError::Invocation(format!("{err:#}")));
            let _ = completions.send(Completion::Handler {
                field_id: ticket.field_id,
                seq: ticket.seq,
                result,
            });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        self.pending = self.pending.saturating_sub(1);
        match completion {
            Completion::Preview { seq, result } => {
                match self.preview.complete(seq, result) {
                    PreviewOutcome::Applied => {
                        if let Some(preview) = self.preview.current() {
                            let _ = self.events.send(EditorEvent::PreviewUpdated(preview.clone()));
                        }
                    }
                    PreviewOutcome::Failed(err) => {
                        let _ = self
                            .events
                            .send(EditorEvent::PreviewFailed(preview_display_error(&err)));
                    }
                    PreviewOutcome::Superseded => {}
                }
                if let Some(ticket) = self.preview.take_trailing() {
                    self.spawn_preview(ticket);
                }
            }
            Completion::Handler {
                field_id,
                seq,
                result,
            } => {
                if self.resolver.complete(&field_id, seq, result) == HandlerOutcome::Applied {
                    let options = self.resolver.options(&field_id).to_vec();
                    let _ = self
                        .events
                        .send(EditorEvent::HandlerOptionsUpdated { field_id, options });
                }
            }
        }
    }
}

fn preview_display_error(err: &PreviewError) -> DisplayError {
    let category = match err {
        PreviewError::Transport(_) => ErrorCategory::Transport,
        PreviewError::Render(_) => ErrorCategory::Render,
    };
    DisplayError::new(category, ErrorContext::Preview, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
