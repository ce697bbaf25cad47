use std::path::{Path, PathBuf};

use super::types::AppConfig;
use crate::error::ConfigError;

pub const ENV_PROGRAM: &str = "GENDISPATCH_PROGRAM";
pub const ENV_MAX_WORKERS: &str = "GENDISPATCH_MAX_WORKERS";

/// Get the default data directory: ~/.gendispatch
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".gendispatch"))
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    // Priority 1: ~/.gendispatch/config.toml (highest)
    let data_dir = get_data_dir()?;
    let user_config = data_dir.join("config.toml");

    // Priority 2: ./gendispatch.toml (current directory)
    let local_config = Path::new("gendispatch.toml");

    let mut cfg = if user_config.exists() {
        load_from(&user_config)?
    } else if local_config.exists() {
        load_from(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;

    Ok(cfg)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Applies `GENDISPATCH_*` overrides read through `lookup`. Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_PROGRAM) {
        cfg.adapter.program = v.trim().to_string();
    }
    if let Some(v) = get(ENV_MAX_WORKERS) {
        cfg.dispatcher.max_workers = match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_MAX_WORKERS,
                    value: v,
                })
            }
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn load_from_reads_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[adapter]
program = "/usr/local/bin/claude"
default_timeout_secs = 60

[progress]
format = "jsonl"
"#
        )
        .unwrap();

        let cfg = load_from(file.path()).unwrap();
        assert_eq!(cfg.adapter.program, "/usr/local/bin/claude");
        assert_eq!(cfg.adapter.default_timeout_secs, 60);
        assert_eq!(cfg.adapter.args, vec!["-p".to_string()]);
        assert_eq!(cfg.progress.format, "jsonl");
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[dispatcher\nmax_workers = 2").unwrap();

        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn load_from_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_program_and_workers() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[(ENV_PROGRAM, " fake-cli "), (ENV_MAX_WORKERS, "7")]),
        )
        .unwrap();
        assert_eq!(cfg.adapter.program, "fake-cli");
        assert_eq!(cfg.dispatcher.max_workers, 7);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, env(&[(ENV_PROGRAM, "  ")])).unwrap();
        assert_eq!(cfg.adapter.program, "claude");
    }

    #[test]
    fn bad_worker_count_is_rejected() {
        for bad in ["zero", "0", "-2"] {
            let mut cfg = AppConfig::default();
            let err = apply_env_overrides(&mut cfg, env(&[(ENV_MAX_WORKERS, bad)])).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue {
                    key: ENV_MAX_WORKERS,
                    ..
                }
            ));
        }
    }
}
