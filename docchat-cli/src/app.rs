//! Wiring from settings to pipelines, and the subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use docchat_eval::{AbConfig, EvalReport, EvalRunner, EvalSet};
use docchat_model::Llm;
use docchat_model::openai::{OpenAIClient, OpenAIConfig};
use docchat_rag::{
    AnsweringPipeline, EmbeddingProvider, HashEmbeddingProvider, InMemoryVectorStore,
    IngestOutcome, IngestionPipeline, OpenAIEmbeddingProvider, QdrantVectorStore, RagConfig,
    VectorStore,
};
use docchat_telemetry::{ExperimentTracker, LangSmithTracer, MlflowTracker, TelemetryToggles, Tracer};
use tracing::info;

use crate::chat::run_chat;
use crate::cli::{Cli, Command, EmbedderKind, GlobalArgs, StoreKind};
use crate::settings::Settings;

/// An answering pipeline plus the tracker it reports to, when tracking is on.
pub struct Answering {
    pub pipeline: Arc<AnsweringPipeline>,
    pub tracker: Option<Arc<dyn ExperimentTracker>>,
}

/// Shared collaborators for one invocation.
pub struct App {
    settings: Settings,
    args: GlobalArgs,
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl App {
    /// Build the embedder and vector store selected by `args`.
    pub fn new(settings: Settings, args: GlobalArgs) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = match args.embedder {
            EmbedderKind::Openai => {
                let provider = OpenAIEmbeddingProvider::new(settings.require_openai_key()?)?;
                match &settings.openai_base_url {
                    Some(url) => Arc::new(provider.with_base_url(url.clone())),
                    None => Arc::new(provider),
                }
            }
            EmbedderKind::Hash => Arc::new(HashEmbeddingProvider::new()),
        };
        let store: Arc<dyn VectorStore> = match args.store {
            StoreKind::Memory => Arc::new(InMemoryVectorStore::new()),
            StoreKind::Qdrant => Arc::new(
                QdrantVectorStore::new(&settings.qdrant_url)
                    .with_context(|| format!("cannot connect to Qdrant at {}", settings.qdrant_url))?,
            ),
        };
        Ok(Self::with_components(settings, args, embedder, store))
    }

    /// Use the given embedder and store instead of building them.
    pub fn with_components(
        settings: Settings,
        args: GlobalArgs,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { settings, args, config: RagConfig::default(), embedder, store }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the configured collection with the chunks of `path`.
    pub async fn ingest(&self, path: &Path) -> Result<IngestOutcome> {
        let pipeline = IngestionPipeline::builder()
            .config(self.config.clone())
            .embedding_provider(self.embedder.clone())
            .vector_store(self.store.clone())
            .build()?;
        println!("Loading document from: {}...", path.display());
        Ok(pipeline.ingest(path, &self.settings.collection).await)
    }

    /// The OpenAI chat client for the configured model.
    pub fn openai_llm(&self) -> Result<Arc<dyn Llm>> {
        let key = self.settings.require_openai_key()?;
        let config = match &self.settings.openai_base_url {
            Some(url) => OpenAIConfig::compatible(key, url.clone()),
            None => OpenAIConfig::new(key),
        };
        Ok(Arc::new(OpenAIClient::new(config)?))
    }

    /// Resolve telemetry once and build the answering pipeline around `llm`.
    pub async fn answering(&self, llm: Arc<dyn Llm>) -> Result<Answering> {
        let tracker = (!self.args.no_tracking).then(|| {
            Arc::new(MlflowTracker::new(
                self.settings.mlflow_tracking_uri.clone(),
                self.settings.mlflow_experiment.clone(),
            ))
        });
        let toggles = TelemetryToggles::resolve(
            self.settings.tracing_requested(),
            tracker.as_deref().map(|t| t as &dyn ExperimentTracker),
        )
        .await;

        let mut builder = AnsweringPipeline::builder()
            .config(self.config.clone())
            .embedding_provider(self.embedder.clone())
            .vector_store(self.store.clone())
            .collection(self.settings.collection.clone())
            .llm(llm)
            .model_config(self.settings.model.clone())
            .toggles(toggles);

        if let (true, Some(key)) = (toggles.tracing_enabled, &self.settings.langsmith_api_key) {
            let tracer: Arc<dyn Tracer> = Arc::new(
                LangSmithTracer::new(key.clone())?
                    .with_endpoint(self.settings.langsmith_endpoint.clone())
                    .with_project(self.settings.langsmith_project.clone()),
            );
            builder = builder.tracer(tracer);
        }

        let tracker: Option<Arc<dyn ExperimentTracker>> = match tracker {
            Some(tracker) if toggles.tracking_enabled => Some(tracker as Arc<dyn ExperimentTracker>),
            _ => None,
        };
        if let Some(tracker) = &tracker {
            builder = builder.tracker(tracker.clone());
        }

        Ok(Answering { pipeline: Arc::new(builder.build()?), tracker })
    }
}

fn eval_set(cases: Option<&Path>, fallback: EvalSet) -> Result<EvalSet> {
    match cases {
        Some(path) => EvalSet::from_json_file(path)
            .with_context(|| format!("cannot load evaluation cases from {}", path.display())),
        None => Ok(fallback),
    }
}

fn write_report(report: &EvalReport, dir: &Path, stem: &str) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    let csv = dir.join(format!("{stem}.csv"));
    let json = dir.join(format!("{stem}.json"));
    report.write_csv(&csv)?;
    report.write_json(&json)?;
    Ok((csv, json))
}

fn print_records(report: &EvalReport) {
    for record in report.records() {
        println!("Testing [{}]: {}", record.config_name, record.question);
        match (&record.answer, &record.error) {
            (Some(answer), _) => println!("Answer received (length: {})", answer.chars().count()),
            (None, error) => println!("Error: {}", error.as_deref().unwrap_or("unknown")),
        }
    }
}

/// Run one parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?.with_overrides(&cli.global)?;
    let app = App::new(settings, cli.global.clone())?;
    run_with(&app, cli.command, || app.openai_llm()).await
}

/// Run `command` against `app`, building the generator with `make_llm` only
/// for commands that answer questions.
pub async fn run_with(
    app: &App,
    command: Command,
    make_llm: impl FnOnce() -> Result<Arc<dyn Llm>>,
) -> Result<()> {
    if let Some(path) = &app.args.ingest {
        if !matches!(command, Command::Ingest { .. }) {
            let outcome = app.ingest(path).await?;
            println!("{}", serde_json::to_string(&outcome)?);
            if let Some(error) = outcome.error() {
                anyhow::bail!("ingestion failed: {error}");
            }
        }
    }

    match command {
        Command::Ingest { path } => {
            let outcome = app.ingest(&path).await?;
            println!("{}", serde_json::to_string(&outcome)?);
            if let Some(error) = outcome.error() {
                anyhow::bail!("ingestion failed: {error}");
            }
        }
        Command::Ask { question } => {
            let answering = app.answering(make_llm()?).await?;
            let outcome = answering.pipeline.answer(&question).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Chat => {
            let answering = app.answering(make_llm()?).await?;
            run_chat(&answering.pipeline).await?;
        }
        Command::Eval { cases, run_name, output_dir } => {
            let set = eval_set(cases.as_deref(), EvalSet::default_evaluation())?;
            let answering = app.answering(make_llm()?).await?;
            let runner = runner(answering);
            println!("Starting evaluation...");
            let report = runner.run_evaluation(&run_name, &set).await;
            print_records(&report);
            let (csv, json) = write_report(&report, &output_dir, "evaluation_results")?;
            println!("\nResults saved to {} and {}", csv.display(), json.display());
        }
        Command::AbTest { cases, output_dir } => {
            let set = eval_set(cases.as_deref(), EvalSet::ab_questions())?;
            let answering = app.answering(make_llm()?).await?;
            let runner = runner(answering);
            println!("Starting A/B Test...");
            let report = runner.run_ab_test(&AbConfig::defaults(), &set).await;
            print_records(&report);
            let (csv, json) = write_report(&report, &output_dir, "ab_test_results")?;
            info!(records = report.records().len(), "a/b test finished");
            println!("A/B test completed. Results saved to {} and {}", csv.display(), json.display());
        }
    }
    Ok(())
}

fn runner(answering: Answering) -> EvalRunner {
    let runner = EvalRunner::new(answering.pipeline);
    match answering.tracker {
        Some(tracker) => runner.with_tracker(tracker),
        None => runner,
    }
}
