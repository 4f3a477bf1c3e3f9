use std::{collections::HashMap, fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use shared::domain::{ConfigEntry, FieldSchema, HandlerOption};

/// One resolver invocation as seen by a handler implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerCall {
    pub field_id: String,
    pub handler: String,
    pub param: String,
    pub config: Vec<ConfigEntry>,
}

#[async_trait]
pub trait SchemaHandler: Send + Sync {
    async fn call(&self, call: HandlerCall) -> Result<Vec<HandlerOption>>;
}

/// Adapts an async closure into a [`SchemaHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(HandlerCall) -> BoxFuture<'static, Result<Vec<HandlerOption>>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> SchemaHandler for FnHandler<F>
where
    F: Fn(HandlerCall) -> BoxFuture<'static, Result<Vec<HandlerOption>>> + Send + Sync,
{
    async fn call(&self, call: HandlerCall) -> Result<Vec<HandlerOption>> {
        (self.0)(call).await
    }
}

/// Handler name → implementation, filled in by whoever loaded the schema.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn SchemaHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn SchemaHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(HandlerCall) -> BoxFuture<'static, Result<Vec<HandlerOption>>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Arc::new(FnHandler::new(f)));
    }

    /// Binds every handler the schema declares to the same implementation,
    /// typically the backend that evaluates them remotely.
    pub fn bind_schema(&mut self, schema: &[FieldSchema], handler: Arc<dyn SchemaHandler>) {
        for name in schema.iter().filter_map(|field| field.handler.as_deref()) {
            self.register(name, Arc::clone(&handler));
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SchemaHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
