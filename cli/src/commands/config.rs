use gendispatch_core::config::AppConfig;
use gendispatch_core::error::CliError;

/// Handle config command: print the effective configuration.
pub fn handle_config(cfg: &AppConfig) -> Result<i32, CliError> {
    let rendered = render_config(cfg)?;
    print!("{}", rendered);
    Ok(0)
}

fn render_config(cfg: &AppConfig) -> Result<String, CliError> {
    toml::to_string_pretty(cfg).map_err(|e| CliError::Command(format!("render config: {}", e)))
}
