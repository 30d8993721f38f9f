//! Login / logout handlers.

use std::io::{self, IsTerminal, Write};

use secrecy::{ExposeSecret, SecretString};

use cloudswitch_config::{clear_password, load_config_or_default, save_config, store_password};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::error::CliError;

use super::util;

/// Verify credentials against the cloud, then remember them.
///
/// The username is written to the config file; the password goes to
/// the system keyring unless `--no-store` is given.
pub async fn login(args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = load_config_or_default();
    util::apply_overrides(&mut config, global);

    let username = match args.username.or_else(|| config.username.clone()) {
        Some(u) => u,
        None => prompt_username()?,
    };
    let password = prompt_password()?;

    let session_config = cloudswitch_config::session_config(&config)?;
    let session = cloudswitch_core::Session::new(
        session_config,
        Box::new(cloudswitch_config::TomlStateStore::new()),
    );

    session.login(&username, &password).await?;
    session.logout().await;

    config.username = Some(username.clone());
    save_config(&config)?;

    if !args.no_store {
        store_password(&username, password.expose_secret())?;
    }

    if !global.quiet {
        eprintln!("Logged in as {username}");
    }
    Ok(())
}

/// Forget the stored password.
pub fn logout(global: &GlobalOpts) -> Result<(), CliError> {
    let config = load_config_or_default();
    let Some(username) = config
        .username
        .or_else(|| std::env::var("CLOUDSWITCH_USERNAME").ok())
    else {
        return Err(CliError::NoCredentials);
    };

    clear_password(&username)?;

    if !global.quiet {
        eprintln!("Removed stored credentials for {username}");
    }
    Ok(())
}

// ── Prompts ──────────────────────────────────────────────────────────

fn prompt_username() -> Result<String, CliError> {
    if !io::stdin().is_terminal() {
        return Err(CliError::NoCredentials);
    }
    eprint!("Username: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let username = line.trim().to_owned();
    if username.is_empty() {
        return Err(CliError::NoCredentials);
    }
    Ok(username)
}

fn prompt_password() -> Result<SecretString, CliError> {
    if let Ok(pw) = std::env::var("CLOUDSWITCH_PASSWORD") {
        return Ok(SecretString::from(pw));
    }
    if !io::stdin().is_terminal() {
        return Err(CliError::NoCredentials);
    }
    let pw = rpassword::prompt_password("Password: ")?;
    Ok(SecretString::from(pw))
}
