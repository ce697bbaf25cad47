use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gendispatch", version, about = "Dispatch batches of prompts to a text generation CLI")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Batch file (.json or .toml) with a list of tasks.
    #[arg(long)]
    pub batch: String,

    /// Maximum number of tasks running at once.
    #[arg(long)]
    pub workers: Option<usize>,

    /// External program to invoke, e.g. `claude`.
    #[arg(long)]
    pub program: Option<String>,

    /// Progress output on stderr.
    #[arg(long, value_parser = ["text", "ascii", "jsonl", "bar", "none"])]
    pub format: Option<String>,

    /// Write the results map here instead of stdout.
    #[arg(long)]
    pub output: Option<String>,

    /// Retry budget for tasks that do not set `max_retries`.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay before each task's call, in milliseconds.
    #[arg(long)]
    pub pacing_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch every task in a batch file and print the results.
    Run(RunArgs),
    /// Print the effective configuration as TOML.
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_overrides() {
        let args = Args::try_parse_from([
            "gendispatch",
            "run",
            "--batch",
            "tasks.json",
            "--workers",
            "5",
            "--format",
            "jsonl",
        ])
        .unwrap();

        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.batch, "tasks.json");
        assert_eq!(run.workers, Some(5));
        assert_eq!(run.format.as_deref(), Some("jsonl"));
        assert!(run.program.is_none());
    }

    #[test]
    fn rejects_unknown_format() {
        let res = Args::try_parse_from([
            "gendispatch",
            "run",
            "--batch",
            "tasks.json",
            "--format",
            "xml",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let args = Args::try_parse_from(["gendispatch", "config", "--config", "x.toml"]).unwrap();
        assert!(matches!(args.command, Commands::Config));
        assert_eq!(args.config.as_deref(), Some("x.toml"));
    }
}
