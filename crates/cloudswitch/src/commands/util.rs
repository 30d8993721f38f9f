//! Shared plumbing for command handlers: config overrides, session
//! construction, and the login/logout bracket around cloud commands.

use cloudswitch_config::{Config, TomlStateStore, load_config_or_default, resolve_credentials};
use cloudswitch_core::{Session, SessionConfig};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Apply CLI flag overrides on top of the loaded config.
pub fn apply_overrides(config: &mut Config, global: &GlobalOpts) {
    if let Some(ref url) = global.api_url {
        config.api_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        config.defaults.timeout = timeout;
    }
}

/// The effective output format: flag, then config file, then table.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    if let Some(format) = global.output {
        return format;
    }
    match config.defaults.output.as_str() {
        "json" => OutputFormat::Json,
        "json-compact" => OutputFormat::JsonCompact,
        "plain" => OutputFormat::Plain,
        _ => OutputFormat::Table,
    }
}

/// Build a session against the on-disk state store.
pub fn build_session(global: &GlobalOpts) -> Result<(Session, Config), CliError> {
    let mut config = load_config_or_default();
    apply_overrides(&mut config, global);

    let session_config: SessionConfig = cloudswitch_config::session_config(&config)?;
    let session = Session::new(session_config, Box::new(TomlStateStore::new()));
    Ok((session, config))
}

/// Build a session and log it in from the credential chain.
pub async fn authenticated_session(global: &GlobalOpts) -> Result<(Session, Config), CliError> {
    let (session, config) = build_session(global)?;
    let (username, password) = resolve_credentials(&config)?;
    session.login(&username, &password).await?;
    Ok((session, config))
}
