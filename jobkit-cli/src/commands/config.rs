//! Config command handler

use anyhow::Result;
use colored::*;
use jobkit_runner::RunnerConfig;
use jobkit_runner::config::{ENV_DEFAULT_POLICY, ENV_DEFAULT_TIMEOUT_MS};

/// Print the effective runner configuration
pub fn show_config(config: &RunnerConfig, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "default_policy": config.default_policy.name(),
            "default_timeout_ms": config.default_timeout.as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "Runner Configuration:".bold());
    println!(
        "  Default policy:  {} {}",
        config.default_policy.name().cyan(),
        format!("({})", ENV_DEFAULT_POLICY).dimmed()
    );
    println!(
        "  Default timeout: {}ms {}",
        config.default_timeout.as_millis().to_string().cyan(),
        format!("({})", ENV_DEFAULT_TIMEOUT_MS).dimmed()
    );

    Ok(())
}
