use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use gendispatch_core::config::AppConfig;
use gendispatch_core::executor::traits::{
    ExternalProgram, NoRetry, NoopProgress, ProgressReporter, RetryStrategyPlugin,
};
use gendispatch_core::executor::types::{AdapterConfig, RetryConfig};
use gendispatch_core::executor::{CallAdapter, Dispatcher, ProgressMonitor};

use crate::executor::{
    ExponentialBackoffPlugin, JsonlProgressReporter, LinearRetryPlugin, TextProgressReporter,
};
use crate::runner::CliProgram;

pub fn build_program(cfg: &AdapterConfig) -> Arc<dyn ExternalProgram> {
    Arc::new(CliProgram::new(cfg.program.clone(), cfg.args.clone()))
}

pub fn build_retry_strategy(cfg: &RetryConfig) -> Result<Arc<dyn RetryStrategyPlugin>> {
    match cfg.strategy.as_str() {
        "exponential-backoff" | "exponential" => {
            Ok(Arc::new(ExponentialBackoffPlugin::new(cfg.clone())))
        }
        "linear" => Ok(Arc::new(LinearRetryPlugin::new(cfg.clone()))),
        "none" => Ok(Arc::new(NoRetry)),
        other => anyhow::bail!("unknown retry strategy: {}", other),
    }
}

/// Progress reporter for a `[progress] format` value.
///
/// `bar` draws indicatif bars on the terminal.
pub fn build_reporter(format: &str) -> Result<Box<dyn ProgressReporter>> {
    match format {
        "text" => Ok(Box::new(TextProgressReporter::new(false))),
        "ascii" => Ok(Box::new(TextProgressReporter::new(true))),
        "jsonl" => Ok(Box::new(JsonlProgressReporter::new(false))),
        "bar" => Ok(Box::new(ProgressMonitor::new(true))),
        "none" => Ok(Box::new(NoopProgress)),
        other => anyhow::bail!("unknown progress format: {}", other),
    }
}

pub fn build_adapter(cfg: &AppConfig) -> Result<Arc<CallAdapter>> {
    let program = build_program(&cfg.adapter);
    let retry = build_retry_strategy(&cfg.retry)?;
    Ok(Arc::new(CallAdapter::new(
        program,
        retry,
        Duration::from_secs(cfg.adapter.default_timeout_secs),
    )))
}

pub fn build_dispatcher(cfg: &AppConfig) -> Result<Dispatcher> {
    let adapter = build_adapter(cfg)?;
    Ok(Dispatcher::from_config(adapter, &cfg.dispatcher))
}
