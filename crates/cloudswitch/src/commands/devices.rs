//! Device command handlers.

use owo_colors::OwoColorize;
use tabled::Tabled;

use cloudswitch_core::{CloudDevice, DeviceId};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
}

impl DeviceRow {
    fn new(d: &CloudDevice, color: bool) -> Self {
        let state = if d.reachable { "online" } else { "offline" };
        Self {
            id: d.id.to_string(),
            name: d.name.clone().unwrap_or_default(),
            state: if color {
                if d.reachable {
                    state.green().to_string()
                } else {
                    state.red().to_string()
                }
            } else {
                state.to_owned()
            },
        }
    }
}

fn detail(d: &CloudDevice) -> String {
    [
        format!("ID:       {}", d.id),
        format!("Name:     {}", d.name.as_deref().unwrap_or("-")),
        format!(
            "State:    {}",
            if d.reachable { "online" } else { "offline" }
        ),
        format!(
            "Firmware: {}",
            if d.has_switch_function {
                "cloudswitch"
            } else {
                "unknown"
            }
        ),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List => {
            let (session, config) = util::authenticated_session(global).await?;
            let devices = session.available_devices();
            session.logout().await;

            let color = output::should_color(global.color);
            let out = output::render_list(
                util::output_format(global, &config),
                &devices,
                |d| DeviceRow::new(d, color),
                |d| d.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Select { device } => {
            let (session, _) = util::authenticated_session(global).await?;
            let result = session.select_device(&DeviceId::new(&device));
            session.logout().await;
            result?;

            if !global.quiet {
                eprintln!("Selected device {device}");
            }
            Ok(())
        }

        DevicesCommand::Show => {
            let (session, config) = util::authenticated_session(global).await?;
            session.restore_device().await?;
            let selected = session.selected_device();
            session.logout().await;

            let device = selected.ok_or(CliError::NoDeviceSelected)?;
            let out = output::render_single(
                util::output_format(global, &config),
                &device,
                detail,
                |d| d.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
