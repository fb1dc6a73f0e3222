//! This module implements the definition of the command line app.

use std::path::PathBuf;

use clap::{Arg, Command, value_parser};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Pulse authenticates service metrics and registers with service discovery.";

fn secret_args() -> [Arg; 2] {
    [
        Arg::new("inbound_secret")
            .long("inbound-secret")
            .value_name("SECRET")
            .env("PULSE_INBOUND_SECRET")
            .hide_env_values(true)
            .help("The secret shared with clients to sign inbound requests."),
        Arg::new("discovery_secret")
            .long("discovery-secret")
            .value_name("SECRET")
            .env("PULSE_DISCOVERY_SECRET")
            .hide_env_values(true)
            .help("The secret shared with the discovery registry."),
    ]
}

pub fn make_app() -> Command {
    Command::new("pulse")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .max_term_width(79)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("The path to the config folder."),
        )
        .subcommand(
            Command::new("run")
                .about("Run the service")
                .after_help(
                    "This registers with the discovery registry and then runs the service in \
                     the foreground until it's shut down. It will bind to the port and network \
                     interface configured in the config file.",
                )
                .arg(
                    Arg::new("name")
                        .long("name")
                        .value_name("NAME")
                        .env("PULSE_NAME")
                        .help("The name under which the service registers."),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .short('H')
                        .value_name("HOST")
                        .env("PULSE_HOST")
                        .help("The network interface to bind to."),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .short('P')
                        .value_name("PORT")
                        .env("PULSE_PORT")
                        .help("The port to bind to."),
                )
                .arg(
                    Arg::new("registry")
                        .long("registry")
                        .value_name("URL")
                        .env("PULSE_REGISTRY")
                        .help("The URL of the discovery registry."),
                )
                .arg(
                    Arg::new("shutdown_timeout")
                        .long("shutdown-timeout")
                        .value_name("SECONDS")
                        .env("PULSE_SHUTDOWN_TIMEOUT")
                        .help("Seconds to wait for pending requests on SIGTERM."),
                )
                .args(secret_args()),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the config")
                .after_help(
                    "This command provides basic config management. It can be used to \
                     initialize a new config and to print out the current config.",
                )
                .subcommand_required(true)
                .subcommand(
                    Command::new("init")
                        .about("Initialize a new config")
                        .after_help(
                            "This writes a config.yml with default values into the config \
                             folder. It fails if the folder already contains a config.",
                        ),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show the entire config out for debugging purposes")
                        .after_help(
                            "This dumps out the entire config including the values which are \
                             not in the config file but filled in from defaults. The default \
                             output format is YAML but a debug format can also be specified.",
                        )
                        .arg(
                            Arg::new("format")
                                .short('f')
                                .long("format")
                                .value_parser(["debug", "yaml"])
                                .default_value("yaml")
                                .help("The output format"),
                        ),
                ),
        )
        .subcommand(
            Command::new("token")
                .about("Compute request tokens")
                .subcommand_required(true)
                .subcommand(
                    Command::new("sign")
                        .about("Sign a JSON document read from stdin")
                        .after_help(
                            "This prints the token for the canonical form of the document. \
                             Use the inbound domain for requests to Pulse, and the discovery \
                             domain for requests to the discovery registry.",
                        )
                        .arg(
                            Arg::new("domain")
                                .short('d')
                                .long("domain")
                                .value_parser(["inbound", "discovery"])
                                .default_value("inbound")
                                .help("The trust domain of the secret"),
                        )
                        .args(secret_args()),
                ),
        )
}
