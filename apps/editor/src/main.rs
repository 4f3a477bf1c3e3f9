use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use editor_core::{
    EditorEvent, EditorSession, HandlerRegistry, HttpBackend, MemoryHistory, SystemEnvironment,
};
use shared::domain::{RenderScale, SchemaDocument};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(
    name = "preview-editor",
    about = "Edit an applet config, keep its share query in sync and render a preview"
)]
struct Args {
    /// Settings file; missing files are ignored.
    #[arg(long, default_value = "editor.toml")]
    settings: PathBuf,
    #[arg(long)]
    backend_url: Option<String>,
    /// Schema document (JSON). Fetched from the backend when omitted.
    #[arg(long)]
    schema: Option<PathBuf>,
    /// Share query to start from, with or without the leading `?`.
    #[arg(long, default_value = "")]
    query: String,
    /// Config file to import after the query is restored.
    #[arg(long)]
    import: Option<PathBuf>,
    #[arg(long)]
    reset: bool,
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_assignment)]
    assignments: Vec<(String, String)>,
    #[arg(long, value_parser = parse_render_scale)]
    render_scale: Option<RenderScale>,
    #[arg(long)]
    timezone: Option<String>,
    #[arg(long)]
    locale: Option<String>,
    #[arg(long)]
    export: Option<PathBuf>,
    /// Where to write the rendered image.
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    no_trailing_refresh: bool,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got {raw:?}"))?;
    if id.is_empty() {
        return Err("field id must not be empty".into());
    }
    Ok((id.to_string(), value.to_string()))
}

fn parse_render_scale(raw: &str) -> Result<RenderScale, String> {
    match raw.trim().trim_end_matches(['x', 'X']) {
        "1" => Ok(RenderScale::Single),
        "2" => Ok(RenderScale::Double),
        _ => Err(format!("render scale must be 1 or 2, got {raw:?}")),
    }
}

async fn load_schema(path: &Path) -> Result<SchemaDocument> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("malformed schema {}", path.display()))
}

fn report_events(events: &mut broadcast::Receiver<EditorEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            EditorEvent::PreviewFailed(err) => warn!(category = ?err.category(), "{}", err.message()),
            EditorEvent::ImportRejected(err) => warn!("{}", err.message()),
            EditorEvent::HandlerOptionsUpdated { field_id, options } => {
                info!(field_id = %field_id, options = options.len(), "handler options resolved");
            }
            EditorEvent::QueryReplaced(_) | EditorEvent::PreviewUpdated(_) => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.settings);
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if args.no_trailing_refresh {
        settings.trailing_refresh = false;
    }

    let backend = Arc::new(HttpBackend::new(&settings.backend_url)?);
    let schema = match &args.schema {
        Some(path) => load_schema(path).await?,
        None => backend.fetch_schema().await?,
    };
    info!(
        version = %schema.version,
        fields = schema.schema.len(),
        backend = %backend.base_url(),
        "schema loaded"
    );

    let mut registry = HandlerRegistry::new();
    registry.bind_schema(&schema.schema, backend.clone());

    let mut session = EditorSession::new_with_dependencies(
        settings.session_options(),
        schema.schema,
        backend,
        registry,
        Box::new(MemoryHistory::new(&args.query)),
        Box::new(SystemEnvironment),
    );
    let mut events = session.subscribe_events();
    session.mount();

    if let Some(path) = &args.import {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        session.import_config(&bytes)?;
    }
    if args.reset {
        session.reset();
    }
    for (id, value) in args.assignments {
        session.set_field(id, value)?;
    }
    if let Some(scale) = args.render_scale {
        session.set_render_scale(Some(scale));
    }
    if let Some(timezone) = args.timezone {
        session.set_timezone(timezone);
    }
    if let Some(locale) = args.locale {
        session.set_locale(locale);
    }

    session.run_until_idle().await;
    report_events(&mut events);

    if let Some(path) = &args.export {
        tokio::fs::write(path, session.export_config()?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "config exported");
    }

    let preview = session
        .preview()
        .ok_or_else(|| anyhow!("backend did not produce a preview"))?;
    if let Some(path) = &args.output {
        if preview.image_bytes.is_empty() {
            bail!("preview has no image data");
        }
        tokio::fs::write(path, &preview.image_bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            path = %path.display(),
            format = preview.image_format.extension(),
            "preview written"
        );
    }

    println!("?{}", session.query());
    println!(
        "{} ({}x{}, {})",
        preview.title,
        preview.width,
        preview.height,
        preview.image_format.extension()
    );

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
