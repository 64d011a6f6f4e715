use anyhow::Context;
use silver_config::load_config;
use silver_config::shared::RunnerConfig;

/// Loads the runner configuration from `./configuration` and validates it.
pub fn load_runner_config() -> anyhow::Result<RunnerConfig> {
    let config = load_config::<RunnerConfig>().context("failed to load the configuration")?;
    config
        .validate()
        .context("the configuration is invalid")?;

    Ok(config)
}
