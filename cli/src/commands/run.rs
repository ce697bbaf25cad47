use std::collections::BTreeMap;
use std::path::Path;

use gendispatch_core::config::AppConfig;
use gendispatch_core::error::{CliError, ConfigError};
use gendispatch_core::executor::{TaskOutput, TaskSpec, TaskStore};
use gendispatch_plugins::factory;
use serde::Deserialize;
use serde_json::Value;

use crate::commands::cli::RunArgs;

#[derive(Deserialize)]
struct BatchFile {
    tasks: Vec<TaskSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBatch {
    List(Vec<TaskSpec>),
    File(BatchFile),
}

/// Handle run command. Returns 1 when any task failed.
pub async fn handle_run(args: RunArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    apply_overrides(&mut cfg, &args);

    let batch_path = shellexpand::tilde(&args.batch).to_string();
    let specs = load_batch(Path::new(&batch_path))?;
    tracing::info!("Loaded {} tasks from {}", specs.len(), batch_path);

    let store = TaskStore::with_max_retries(cfg.dispatcher.max_retries);
    store
        .add_batch(specs)
        .map_err(|e| CliError::Batch(format!("{}: {}", batch_path, e)))?;

    let dispatcher = factory::build_dispatcher(&cfg)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let reporter = factory::build_reporter(&cfg.progress.format)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    let results = dispatcher.process_tasks(&store, reporter.as_ref()).await;

    let rendered = serde_json::to_string_pretty(&results_to_json(results))
        .map_err(|e| CliError::Command(format!("serialize results: {}", e)))?;
    match args.output.as_deref() {
        Some(out) => {
            let out = shellexpand::tilde(out).to_string();
            std::fs::write(&out, rendered + "\n")?;
            tracing::info!("Results written to {}", out);
        }
        None => println!("{}", rendered),
    }

    let failed = store.get_failed_tasks();
    for task in &failed {
        let reason = task
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        eprintln!("FAILED {} ({}): {}", task.id, task.name, reason);
    }

    Ok(if failed.is_empty() { 0 } else { 1 })
}

fn apply_overrides(cfg: &mut AppConfig, args: &RunArgs) {
    if let Some(workers) = args.workers {
        cfg.dispatcher.max_workers = workers.max(1);
    }
    if let Some(program) = args.program.as_ref() {
        cfg.adapter.program = program.clone();
    }
    if let Some(format) = args.format.as_ref() {
        cfg.progress.format = format.clone();
    }
    if let Some(max_retries) = args.max_retries {
        cfg.dispatcher.max_retries = max_retries;
    }
    if let Some(pacing_ms) = args.pacing_ms {
        cfg.dispatcher.pacing_ms = pacing_ms;
    }
}

/// Reads tasks from a `.json` file (a list, or `{"tasks": [...]}`) or a
/// `.toml` file with `[[tasks]]` tables.
pub fn load_batch(path: &Path) -> Result<Vec<TaskSpec>, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Batch(format!("{}: {}", path.display(), e)))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("toml") => toml::from_str::<BatchFile>(&content)
            .map(|b| b.tasks)
            .map_err(|e| CliError::Batch(format!("{}: {}", path.display(), e))),
        Some("json") | None => match serde_json::from_str::<JsonBatch>(&content) {
            Ok(JsonBatch::List(tasks)) => Ok(tasks),
            Ok(JsonBatch::File(file)) => Ok(file.tasks),
            Err(e) => Err(CliError::Batch(format!("{}: {}", path.display(), e))),
        },
        Some(other) => Err(CliError::Batch(format!(
            "{}: unsupported batch format '{}'",
            path.display(),
            other
        ))),
    }
}

/// Completed tasks map to their structured value when one was parsed,
/// otherwise to the text. Others map to `null`.
fn results_to_json(
    results: impl IntoIterator<Item = (String, Option<TaskOutput>)>,
) -> BTreeMap<String, Value> {
    results
        .into_iter()
        .map(|(id, out)| {
            let value = match out {
                Some(TaskOutput {
                    structured: Some(v),
                    ..
                }) => v,
                Some(TaskOutput { text, .. }) => Value::String(text),
                None => Value::Null,
            };
            (id, value)
        })
        .collect()
}
