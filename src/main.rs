// ██████╗ ██╗██╗   ██╗ █████╗ ██╗
// ██╔══██╗██║██║   ██║██╔══██╗██║
// ██████╔╝██║██║   ██║███████║██║
// ██╔══██╗██║╚██╗ ██╔╝██╔══██║██║
// ██║  ██║██║ ╚████╔╝ ██║  ██║███████╗
// ╚═╝  ╚═╝╚═╝  ╚═══╝  ╚═╝  ╚═╝╚══════╝
//
// W E A K N E S S   E N G I N E
//
// Scrape a competitor's page, ask Gemini what's wrong with them, write it
// down in Supabase. Rust + Tokio + actix-web, all so a language model can
// tell you your rival's pricing page is confusing.

mod config;
mod extraction;
mod http;
mod llm;
mod metrics;
mod models;
mod pipeline;
mod scraper;
mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{key_prefix, Config};
use crate::http::AppState;
use crate::llm::{GeminiProvider, ModelProvider};
use crate::metrics::MetricsCollector;
use crate::pipeline::AnalysisPipeline;
use crate::scraper::FirecrawlScraper;
use crate::store::{InsightStore, SupabaseStore};

fn print_banner() {
    let banner = r#"

    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║          🔍  RIVAL WEAKNESS ENGINE  🔍                        ║
    ║                                                              ║
    ║   Scraper:  Firecrawl (main content, Markdown)               ║
    ║   Oracle:   Google Gemini                                    ║
    ║   Ledger:   Supabase (PostgREST)                             ║
    ║                                                              ║
    ║   "Know thy enemy. Preferably as JSON."                      ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝

    "#;
    println!("{}", banner);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    print_banner();

    info!("🔧 Loading configuration...");
    let config = Config::from_env().context("invalid configuration")?;
    info!(
        bind = %config.bind_addr,
        firecrawl_key = %key_prefix(&config.firecrawl_api_key),
        default_model = %config.default_model,
        "✅ Configuration loaded"
    );

    let scraper = FirecrawlScraper::from_config(&config).context("building Firecrawl client")?;
    info!("✅ Firecrawl client ready");

    let models = GeminiProvider::from_config(&config).context("building Gemini client")?;
    if models.default_model().is_some() {
        info!(model = %config.default_model, "✅ Gemini client ready");
    } else {
        warn!("⚠️ GOOGLE_AI_API_KEY not set, every analysis will return placeholder weaknesses");
    }

    let store = SupabaseStore::from_config(&config).context("building Supabase client")?;
    store
        .probe()
        .await
        .context("Supabase is not reachable with the configured credentials")?;
    info!("✅ Supabase tables accessible");

    let metrics = Arc::new(MetricsCollector::new());
    let state = web::Data::new(AppState {
        pipeline: AnalysisPipeline::new(
            Arc::new(scraper),
            Arc::new(models),
            Arc::new(store),
            metrics.clone(),
            config.max_prompt_chars,
        ),
    });

    // actix's own signal handling is off so shutdown follows the same watch
    // channel path as everything else.
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(http::configure))
        .workers(config.http_workers)
        .disable_signals()
        .bind(config.bind_addr)
        .with_context(|| format!("binding {}", config.bind_addr))?
        .run();
    let server_handle = server.handle();

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let stopper = tokio::spawn(async move {
        if shutdown_rx.changed().await.is_ok() {
            server_handle.stop(true).await;
        }
    });

    info!("═══════════════════════════════════════════════════════");
    info!("  🟢 RIVAL WEAKNESS ENGINE ACTIVE");
    info!("  🌐 Listening on http://{}", config.bind_addr);
    info!("  📊 Metrics at http://{}/metrics", config.bind_addr);
    info!("  ⚡ Press Ctrl+C for graceful shutdown");
    info!("═══════════════════════════════════════════════════════");

    let server_task = tokio::spawn(server);

    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("🛑 Shutdown signal received!");
            let _ = shutdown_tx.send(true);
        }
        Err(err) => {
            error!("❌ Signal listener error: {}", err);
            let _ = shutdown_tx.send(true);
        }
    }

    info!("⏳ Waiting for in-flight analyses to finish (timeout: 10s)...");
    let _ = tokio::time::timeout(Duration::from_secs(10), async {
        let _ = tokio::join!(stopper, server_task);
    })
    .await;

    let snapshot = metrics.snapshot();
    info!(
        analyses = snapshot.analyses_completed,
        insights = snapshot.insights_persisted,
        "💀 RIVAL WEAKNESS ENGINE: OFFLINE"
    );
    Ok(())
}
