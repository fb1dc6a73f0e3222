use anyhow::{Context, Result};
use pulse_config::Config;

/// Checks that the configuration can be used to run the service.
pub fn check_config(config: &Config) -> Result<()> {
    config.validate().with_context(|| match config.path() {
        path if path.as_os_str().is_empty() => "invalid configuration".to_owned(),
        path => format!("invalid configuration in {}", path.display()),
    })?;

    let ip = config.listen_addr().ip();
    if ip.is_unspecified() && config.advertise_host() == ip.to_string() {
        pulse_log::warn!(
            "binding to {ip} without service.advertise_host, the registry will receive an \
             unroutable host"
        );
    }

    Ok(())
}

/// Print spawn infos to the log.
///
/// Secrets are never printed.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        pulse_log::info!("launching pulse without config folder");
    } else {
        pulse_log::info!(
            "launching pulse from config folder {}",
            config.path().display()
        );
    }
    pulse_log::info!("  service name: {}", config.service_name());
    pulse_log::info!(
        "  advertised as: {}:{}",
        config.advertise_host(),
        config.advertise_port()
    );
    pulse_log::info!("  discovery registry: {}", config.registry());
    pulse_log::info!("  log level: {}", config.logging().level);
}
