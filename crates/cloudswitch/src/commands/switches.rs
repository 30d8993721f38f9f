//! Switch bank handlers: list, set, toggle.

use serde::Serialize;
use tabled::Tabled;

use cloudswitch_core::TristateCode;

use crate::cli::{GlobalOpts, SwitchesArgs, SwitchesCommand, ToggleArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Serialize, Tabled)]
struct SwitchSlot {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Code")]
    code: String,
}

// ── Handlers ────────────────────────────────────────────────────────

/// List and set work on the locally persisted bank; no login needed.
pub fn handle(args: SwitchesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, config) = util::build_session(global)?;

    match args.command {
        SwitchesCommand::List => {
            let slots: Vec<SwitchSlot> = session
                .switch_names()
                .into_iter()
                .zip(session.switch_codes())
                .enumerate()
                .map(|(index, (name, code))| SwitchSlot {
                    index,
                    name,
                    code: code.to_string(),
                })
                .collect();

            let out = output::render_list(
                util::output_format(global, &config),
                &slots,
                |s| SwitchSlot {
                    index: s.index,
                    name: s.name.clone(),
                    code: s.code.clone(),
                },
                |s| format!("{}\t{}\t{}", s.index, s.name, s.code),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SwitchesCommand::Set { index, name, code } => {
            // Unspecified fields keep their current value.
            let current_name = session
                .switch_names()
                .get(index)
                .cloned()
                .unwrap_or_default();
            let current_code = session
                .switch_codes()
                .get(index)
                .cloned()
                .unwrap_or_default();

            let name = name.unwrap_or(current_name);
            let code = match code {
                Some(raw) => TristateCode::parse(raw)?,
                None => current_code,
            };

            session.update_switch(index, name.clone(), code)?;

            if !global.quiet {
                eprintln!("Updated switch {index} ({name})");
            }
            Ok(())
        }
    }
}

/// Replay the code stored in a slot through the selected device.
pub async fn toggle(args: ToggleArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _) = util::authenticated_session(global).await?;

    let result = async {
        session.restore_device().await?;
        session.toggle_switch(args.index).await
    }
    .await;
    session.logout().await;
    result?;

    if !global.quiet {
        let name = session
            .switch_names()
            .get(args.index)
            .cloned()
            .unwrap_or_default();
        eprintln!("Toggled switch {} ({name})", args.index);
    }
    Ok(())
}
