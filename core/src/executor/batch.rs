//! Ready-made batches used by the documentation layer.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::engine::Dispatcher;
use super::store::TaskStore;
use super::traits::ProgressReporter;
use super::types::TaskSpec;

/// Worker ceiling for the helper batches.
pub const HELPER_MAX_WORKERS: usize = 3;
pub const MODULE_DESCRIPTION_TIMEOUT: Duration = Duration::from_secs(90);
pub const TASK_DETAILS_TIMEOUT: Duration = Duration::from_secs(120);

/// Project facts interpolated into helper requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectContext {
    pub name: String,
    pub project_type: String,
    pub description: String,
    pub language: String,
}

/// A planned task whose details should be generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBrief {
    pub title: String,
    pub module: String,
}

/// Generates a short description per module.
///
/// Modules whose task fails get `"<Name> module functionality"`.
pub async fn describe_modules_batch(
    dispatcher: &Dispatcher,
    modules: &[String],
    project: &ProjectContext,
    progress: &dyn ProgressReporter,
) -> HashMap<String, String> {
    tracing::info!("Generating descriptions for {} modules concurrently", modules.len());

    let store = TaskStore::new();
    for module in modules {
        let spec = TaskSpec::new(module.clone(), format!("Module: {module}"), module_request(module, project))
            .timeout(MODULE_DESCRIPTION_TIMEOUT);
        if let Err(e) = store.add_spec(spec) {
            tracing::warn!("skipping module: {}", e);
        }
    }

    let results = helper_dispatcher(dispatcher, modules.len())
        .process_tasks(&store, progress)
        .await;

    results
        .into_iter()
        .map(|(module, output)| {
            let description = match output {
                Some(out) if !out.text.trim().is_empty() => out.text.trim().to_string(),
                _ => format!("{} module functionality", title_case(&module)),
            };
            (module, description)
        })
        .collect()
}

/// Generates structured details per task, keyed by task title.
///
/// Failed or unparseable entries become `{"error": ...}` objects.
pub async fn task_details_batch(
    dispatcher: &Dispatcher,
    tasks: &[TaskBrief],
    project: &ProjectContext,
    progress: &dyn ProgressReporter,
) -> HashMap<String, Value> {
    tracing::info!("Generating details for {} tasks concurrently", tasks.len());

    let store = TaskStore::new();
    for task in tasks {
        let spec = TaskSpec::new(
            task.title.clone(),
            format!("Task: {}", task.title),
            task_details_request(task, project),
        )
        .structured(true)
        .timeout(TASK_DETAILS_TIMEOUT);
        if let Err(e) = store.add_spec(spec) {
            tracing::warn!("skipping task: {}", e);
        }
    }

    let results = helper_dispatcher(dispatcher, tasks.len())
        .process_tasks(&store, progress)
        .await;

    results
        .into_iter()
        .map(|(title, output)| {
            let details = match output {
                Some(out) => match out.structured {
                    Some(value) => value,
                    None => serde_json::from_str(&out.text)
                        .unwrap_or_else(|_| json!({"error": "Failed to parse details"})),
                },
                None => json!({"error": "No details generated"}),
            };
            (title, details)
        })
        .collect()
}

fn helper_dispatcher(dispatcher: &Dispatcher, tasks: usize) -> Dispatcher {
    Dispatcher::builder(dispatcher.adapter().clone())
        .max_workers(tasks.clamp(1, HELPER_MAX_WORKERS))
        .pacing(dispatcher.pacing())
        .build()
}

fn module_request(module: &str, project: &ProjectContext) -> String {
    format!(
        "Generate a concise description for the '{module}' module in a {} project.\n\n\
         Project: {}\n\
         Description: {}\n\
         Language: {}\n\n\
         Provide a 1-2 sentence description that clearly explains the module's purpose\n\
         and key responsibilities.",
        project.project_type, project.name, project.description, project.language
    )
}

fn task_details_request(task: &TaskBrief, project: &ProjectContext) -> String {
    format!(
        "Generate comprehensive task details for the following task:\n\n\
         Task: {}\n\
         Module: {}\n\
         Project Type: {}\n\
         Project Description: {}\n\n\
         Please provide:\n\
         1. Clear goal statement\n\
         2. Key requirements (3-5 items)\n\
         3. Recommended implementation approach\n\
         4. Specific subtasks following TDD methodology (5-8 items)\n\
         5. Acceptance criteria\n\
         6. Potential challenges\n\
         7. Research topics\n\n\
         Return as JSON with keys: goal, requirements, approach, subtasks, acceptance_criteria,\n\
         challenges, research_topics",
        task.title, task.module, project.project_type, project.description
    )
}

/// Upper-cases the first letter of every alphabetic run: `user_auth` -> `User_Auth`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
