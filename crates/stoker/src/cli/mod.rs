//! CLI command definitions and handlers.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use stoker_common::StokerError;

use crate::engine::{
    EngineController, EngineInitOptions, EngineTiming, COMMUNITY_ENGINE_IMAGE,
    DEFAULT_REGISTRY_PREFIX,
};
use crate::runtime::{Container as _, DockerRuntime, RegistryAuth, Task as _};

/// Stoker - containerized engine lifecycle manager
#[derive(Parser)]
#[command(name = "stoker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Engine lifecycle commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize and start the engine
    Init {
        /// Engine version to run (the image tag)
        #[arg(long, env = "STOKER_ENGINE_VERSION")]
        engine_version: String,

        /// Registry prefix for the engine image
        #[arg(long, default_value = DEFAULT_REGISTRY_PREFIX)]
        registry_prefix: String,

        /// Engine image name
        #[arg(long, default_value = COMMUNITY_ENGINE_IMAGE)]
        engine_image: String,

        /// Config file path handed to the engine daemon
        #[arg(long, value_parser = quoted_string, default_value = "/etc/docker/daemon.json")]
        config_file: String,

        /// Registry username for authenticated pulls
        #[arg(long)]
        username: Option<String>,

        /// Registry password or token
        #[arg(long, env = "STOKER_REGISTRY_PASSWORD")]
        password: Option<String>,

        /// URL polled until the engine answers
        #[arg(long, default_value = "http://localhost:2375/_ping")]
        ping_url: String,

        /// Seconds to wait for the engine to come up healthy
        #[arg(long, default_value = "60")]
        wait_timeout: u64,
    },

    /// Show the engine's status
    Status,

    /// Remove the engine
    Rm {
        /// Seconds to wait for a killed engine to exit
        #[arg(long, default_value = "60")]
        shutdown_timeout: u64,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let runtime = DockerRuntime::connect()?;
        let controller = EngineController::new(Arc::new(runtime));

        match self.command {
            Commands::Init {
                engine_version,
                registry_prefix,
                engine_image,
                config_file,
                username,
                password,
                ping_url,
                wait_timeout,
            } => {
                let controller = controller.with_timing(
                    EngineTiming::default().with_wait_timeout(Duration::from_secs(wait_timeout)),
                );
                let opts = EngineInitOptions::new(engine_version, config_file)
                    .with_registry_prefix(registry_prefix)
                    .with_engine_image(engine_image);

                let auth = match (username, password) {
                    (Some(username), Some(password)) => {
                        Some(RegistryAuth::basic(username, password))
                    }
                    _ => None,
                };

                let client = reqwest::Client::new();
                let health = move || {
                    let client = client.clone();
                    let url = ping_url.clone();
                    async move {
                        let response = client.get(&url).send().await.map_err(ping_error)?;
                        response.error_for_status().map_err(ping_error)?;
                        Ok(())
                    }
                };

                let mut out = std::io::stdout();
                controller
                    .init_engine(&opts, &mut out, auth.as_ref(), health)
                    .await?;
                println!("engine initialized");
                Ok(())
            }

            Commands::Status => {
                match controller.get_engine().await {
                    Ok(engine) => {
                        let image = controller
                            .engine_image(engine.as_ref())
                            .await
                            .unwrap_or_else(|_| "<unknown>".to_string());
                        let status = match engine.task().await {
                            Ok(task) => task.status().await?.to_string(),
                            Err(StokerError::TaskNotFound { .. }) => "no task".to_string(),
                            Err(err) => return Err(err.into()),
                        };
                        println!("engine:      {}", engine.id());
                        println!("image:       {image}");
                        println!("status:      {status}");
                        if let Ok(config_file) =
                            controller.engine_config_file_path(engine.as_ref()).await
                        {
                            println!("config file: {config_file}");
                        }
                        Ok(())
                    }
                    Err(StokerError::EngineNotPresent) => {
                        println!("engine not present");
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            }

            Commands::Rm { shutdown_timeout } => {
                let controller = controller.with_timing(
                    EngineTiming::default()
                        .with_shutdown_timeout(Duration::from_secs(shutdown_timeout)),
                );
                match controller.get_engine().await {
                    Ok(engine) => {
                        controller.remove_engine(engine.as_ref()).await?;
                        println!("engine removed");
                        Ok(())
                    }
                    Err(StokerError::EngineNotPresent) => {
                        println!("engine not present; nothing to remove");
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            }
        }
    }
}

fn ping_error(err: reqwest::Error) -> StokerError {
    StokerError::Runtime {
        reason: err.to_string(),
    }
}

/// Clap value parser that strips one pair of matching quotes.
fn quoted_string(value: &str) -> Result<String, std::convert::Infallible> {
    Ok(trim_quotes(value).to_string())
}

/// Strip one pair of matching leading/trailing quotes from a flag value.
///
/// Mismatched or absent quotes leave the value untouched, so shell-quoted
/// paths survive a second layer of quoting.
pub(crate) fn trim_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() > 1 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_quotes_with_quotes() {
        assert_eq!(trim_quotes("\"something\""), "something");
        assert_eq!(trim_quotes("'something'"), "something");
    }

    #[test]
    fn trim_quotes_with_mismatched_quotes() {
        assert_eq!(trim_quotes("\"something'"), "\"something'");
    }

    #[test]
    fn trim_quotes_with_no_quotes() {
        assert_eq!(trim_quotes("something"), "something");
    }

    #[test]
    fn trim_quotes_single_char() {
        assert_eq!(trim_quotes("\""), "\"");
    }

    #[test]
    fn cli_parses_init() {
        let cli = Cli::try_parse_from([
            "stoker",
            "init",
            "--engine-version",
            "19.03.0",
            "--config-file",
            "\"/etc/docker/daemon.json\"",
        ])
        .unwrap();
        match cli.command {
            Commands::Init {
                engine_version,
                config_file,
                ..
            } => {
                assert_eq!(engine_version, "19.03.0");
                assert_eq!(config_file, "/etc/docker/daemon.json");
            }
            _ => panic!("expected init command"),
        }
    }
}
