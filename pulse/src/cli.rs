use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use pulse_config::{Config, OverridableConfig};

use crate::cliapp::make_app;
use crate::setup;

/// The config folder used if `--config` is not passed.
const DEFAULT_CONFIG_PATH: &str = ".pulse";

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();
    let config_path = matches
        .get_one::<PathBuf>("config")
        .map_or(Path::new(DEFAULT_CONFIG_PATH), PathBuf::as_path);

    // Commands that do not need a loaded config.
    if let Some(matches) = matches.subcommand_matches("config")
        && matches.subcommand_matches("init").is_some()
    {
        return init_config(config_path);
    }

    let mut config = load_config(config_path)?;
    config.apply_override(extract_config_args(leaf_matches(&matches)))?;

    pulse_log::init(config.logging());

    if matches.subcommand_matches("run").is_some() {
        run(config)
    } else if let Some(matches) = matches.subcommand_matches("config") {
        manage_config(&config, matches)
    } else if let Some(matches) = matches.subcommand_matches("token") {
        manage_token(&config, matches)
    } else {
        unreachable!();
    }
}

/// Loads the config from `path`, falling back to defaults if the folder has no config.
fn load_config(path: &Path) -> Result<Config> {
    if Config::config_exists(path) {
        return Config::from_path(path)
            .with_context(|| format!("could not load config from {}", path.display()));
    }

    Ok(Config::default())
}

/// Returns the matches of the innermost subcommand.
fn leaf_matches(matches: &ArgMatches) -> &ArgMatches {
    match matches.subcommand() {
        Some((_, matches)) => leaf_matches(matches),
        None => matches,
    }
}

/// Collects overrides from command line arguments and their environment variables.
///
/// Arguments that the matched subcommand does not define are skipped.
pub fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    let get = |id: &str| {
        matches
            .try_get_one::<String>(id)
            .ok()
            .flatten()
            .cloned()
    };

    OverridableConfig {
        name: get("name"),
        host: get("host"),
        port: get("port"),
        inbound_secret: get("inbound_secret"),
        discovery_secret: get("discovery_secret"),
        registry: get("registry"),
        shutdown_timeout: get("shutdown_timeout"),
    }
}

#[allow(clippy::print_stdout)]
pub fn init_config(config_path: &Path) -> Result<()> {
    if Config::config_exists(config_path) {
        bail!("a config already exists in {}", config_path.display());
    }

    Config::default()
        .save_in_folder(config_path)
        .context("could not write config")?;

    println!("wrote config to {}", config_path.display());
    println!("set auth.secret and discovery.secret before running the service");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    if let Some(matches) = matches.subcommand_matches("show") {
        match matches.get_one::<String>("format").map(String::as_str) {
            Some("debug") => println!("{config:#?}"),
            _ => print!("{}", config.to_yaml_string()?),
        }
        Ok(())
    } else {
        unreachable!();
    }
}

#[allow(clippy::print_stdout)]
pub fn manage_token(config: &Config, matches: &ArgMatches) -> Result<()> {
    let Some(matches) = matches.subcommand_matches("sign") else {
        unreachable!();
    };

    let document: serde_json::Value = serde_json::from_reader(io::stdin().lock())
        .context("could not read JSON document from stdin")?;

    let token = match matches.get_one::<String>("domain").map(String::as_str) {
        Some("discovery") => {
            let secret = config
                .discovery_secret()
                .context("no discovery secret configured")?;
            pulse_auth::sign(secret, &document)
        }
        _ => {
            let secret = config
                .inbound_secret()
                .context("no inbound secret configured")?;
            pulse_auth::sign(secret, &document)
        }
    };

    println!("{token}");
    Ok(())
}

pub fn run(config: Config) -> Result<()> {
    setup::check_config(&config)?;
    setup::dump_spawn_infos(&config);
    pulse_server::run(config)?;
    Ok(())
}
