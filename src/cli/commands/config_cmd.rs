//! Configuration management commands.

use console::style;

use examcrop::config::Config;

/// Print the effective configuration.
pub async fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults (no config file found)".to_string());
    eprintln!("{} Source: {}", style("→").dim(), source);
    let toml = config.to_toml().map_err(|e| anyhow::anyhow!(e))?;
    println!("{}", toml);
    Ok(())
}
