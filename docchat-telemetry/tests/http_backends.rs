//! LangSmith and MLflow backends against throw-away local servers.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
};
use docchat_telemetry::{
    ExperimentTracker, LangSmithTracer, MlflowTracker, RunStatus, TelemetryError, Tracer,
};
use serde_json::{Value, json};

type Log = Arc<Mutex<Vec<(String, Value)>>>;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn langsmith_forbidden_maps_to_unauthorized() {
    let app = Router::new().route("/runs", post(|| async { StatusCode::FORBIDDEN }));
    let endpoint = serve(app).await;

    let tracer = LangSmithTracer::new("bad-key").unwrap().with_endpoint(endpoint);
    let err = tracer.start_trace("get_answer", json!({"question": "q"})).await.unwrap_err();
    assert!(matches!(err, TelemetryError::Unauthorized { .. }), "got {err:?}");
}

#[tokio::test]
async fn langsmith_posts_then_patches_the_run() {
    let log: Log = Arc::default();
    let app = Router::new()
        .route(
            "/runs",
            post(|State(log): State<Log>, Json(body): Json<Value>| async move {
                log.lock().unwrap().push(("create".into(), body));
                StatusCode::OK
            }),
        )
        .route(
            "/runs/{id}",
            patch(|State(log): State<Log>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                log.lock().unwrap().push((format!("update {id}"), body));
                StatusCode::OK
            }),
        )
        .with_state(log.clone());
    let endpoint = serve(app).await;

    let tracer = LangSmithTracer::new("key").unwrap().with_endpoint(endpoint).with_project("docchat");
    let handle = tracer.start_trace("get_answer", json!({"question": "q"})).await.unwrap();
    tracer.end_trace(&handle, json!({"answer": "a"}), None).await.unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].1["name"], "get_answer");
    assert_eq!(log[0].1["session_name"], "docchat");
    assert_eq!(log[0].1["id"], json!(handle.id));
    assert_eq!(log[1].0, format!("update {}", handle.id));
    assert_eq!(log[1].1["outputs"]["answer"], "a");
}

fn mlflow_app(log: Log) -> Router {
    Router::new()
        .route(
            "/api/2.0/mlflow/experiments/get-by-name",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error_code": "RESOURCE_DOES_NOT_EXIST"})),
                )
            }),
        )
        .route(
            "/api/2.0/mlflow/experiments/create",
            post(|State(log): State<Log>, Json(body): Json<Value>| async move {
                log.lock().unwrap().push(("experiments/create".into(), body));
                Json(json!({"experiment_id": "7"}))
            }),
        )
        .route(
            "/api/2.0/mlflow/runs/create",
            post(|State(log): State<Log>, Json(body): Json<Value>| async move {
                let n = {
                    let mut log = log.lock().unwrap();
                    log.push(("runs/create".into(), body));
                    log.iter().filter(|(k, _)| k == "runs/create").count()
                };
                Json(json!({"run": {"info": {"run_id": format!("run-{n}")}}}))
            }),
        )
        .route(
            "/api/2.0/mlflow/runs/{action}",
            post(|State(log): State<Log>, Path(action): Path<String>, Json(body): Json<Value>| async move {
                log.lock().unwrap().push((format!("runs/{action}"), body));
                Json(json!({}))
            }),
        )
        .route(
            "/api/2.0/mlflow-artifacts/artifacts/{*path}",
            put(|State(log): State<Log>, Path(path): Path<String>, body: String| async move {
                log.lock().unwrap().push((format!("artifact {path}"), Value::String(body)));
                StatusCode::OK
            }),
        )
        .with_state(log)
}

#[tokio::test]
async fn mlflow_creates_missing_experiment_and_logs_nested_runs() {
    let log: Log = Arc::default();
    let uri = serve(mlflow_app(log.clone())).await;

    let tracker = MlflowTracker::new(uri, "LLMops_Multi_Doc_Chat");
    tracker.probe().await.unwrap();
    assert_eq!(tracker.experiment_id().as_deref(), Some("7"));

    tracker.start_run(Some("Initial RAG Evaluation"), false).await.unwrap();
    tracker.start_run(None, true).await.unwrap();
    tracker.log_param("question", "What is PrimMod?").await.unwrap();
    tracker.log_metric("source_count", 2.0).await.unwrap();
    tracker.log_text("it failed", "error.txt").await.unwrap();
    tracker.end_run(RunStatus::Finished).await.unwrap();
    tracker.end_run(RunStatus::Failed).await.unwrap();

    let log = log.lock().unwrap();
    let keys: Vec<&str> = log.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "experiments/create",
            "runs/create",
            "runs/create",
            "runs/log-parameter",
            "runs/log-metric",
            "artifact 7/run-2/artifacts/error.txt",
            "runs/update",
            "runs/update",
        ]
    );
    assert_eq!(log[0].1["name"], "LLMops_Multi_Doc_Chat");
    assert_eq!(log[1].1["run_name"], "Initial RAG Evaluation");
    assert_eq!(log[2].1["tags"][0]["key"], "mlflow.parentRunId");
    assert_eq!(log[2].1["tags"][0]["value"], "run-1");
    assert_eq!(log[3].1["run_id"], "run-2");
    assert_eq!(log[4].1["value"], 2.0);
    assert_eq!(log[5].1, "it failed");
    assert_eq!(log[6].1["run_id"], "run-2");
    assert_eq!(log[6].1["status"], "FINISHED");
    assert_eq!(log[7].1["run_id"], "run-1");
    assert_eq!(log[7].1["status"], "FAILED");
}

#[tokio::test]
async fn mlflow_probe_fails_when_server_is_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let tracker = MlflowTracker::new(format!("http://{addr}"), "exp");
    assert!(tracker.probe().await.is_err());
    assert!(tracker.start_run(None, false).await.is_err());
}
