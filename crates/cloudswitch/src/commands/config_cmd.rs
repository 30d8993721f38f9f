//! Config inspection handlers.

use cloudswitch_config::{config_path, load_config_or_default, state_path};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let mut config = load_config_or_default();
            util::apply_overrides(&mut config, global);

            // Never print a plaintext password.
            if config.password.is_some() {
                config.password = Some("<redacted>".into());
            }

            let toml_str = toml::to_string_pretty(&config).map_err(|e| CliError::Config {
                message: format!("cannot serialize config: {e}"),
            })?;
            output::print_output(toml_str.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let out = format!(
                "config: {}\nstate:  {}",
                config_path().display(),
                state_path().display()
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
