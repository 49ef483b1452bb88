use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use docchat_cli::Cli;
use docchat_telemetry::SharedTraceStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let storage = Arc::new(SharedTraceStorage::new());
    let init = match &cli.global.trace_file {
        Some(_) => docchat_telemetry::init_with_storage("docchat", storage.clone()),
        None => docchat_telemetry::init_telemetry("docchat"),
    };
    if let Err(e) = init {
        eprintln!("Warning: {e}");
    }

    let trace_file = cli.global.trace_file.clone();
    let result = docchat_cli::run(cli).await;

    if let Some(path) = trace_file {
        let spans = serde_json::to_string_pretty(&storage.snapshot())?;
        std::fs::write(&path, spans)
            .with_context(|| format!("cannot write trace file {}", path.display()))?;
    }
    result
}
