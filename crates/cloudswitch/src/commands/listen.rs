//! Listen handler: stream RF codes published by the selected device.

use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;

use cloudswitch_core::SessionEvent;

use crate::cli::{GlobalOpts, ListenArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(args: ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _) = util::authenticated_session(global).await?;

    let result = listen_loop(&session, &args, global).await;

    session.stop_listen();
    session.logout().await;
    result
}

async fn listen_loop(
    session: &cloudswitch_core::Session,
    args: &ListenArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    session.restore_device().await?;

    let mut rx = session.subscribe();
    session.start_listen()?;

    if !global.quiet {
        match args.learn {
            Some(index) => eprintln!("Waiting for an RF code for switch {index}... (Ctrl-C to stop)"),
            None => eprintln!("Listening for RF codes... (Ctrl-C to stop)"),
        }
    }

    let color = output::should_color(global.color);
    let deadline = async {
        match args.timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted, stopping listener");
                return Ok(());
            }
            () = &mut deadline => {
                // In learn mode an expired wait is a failure; plain
                // listening just ends.
                return if args.learn.is_some() {
                    Err(CliError::ListenTimeout)
                } else {
                    Ok(())
                };
            }
            event = rx.recv() => match event {
                Ok(SessionEvent::CodeReceived(code)) => {
                    if color {
                        println!("{}", code.as_str().cyan().bold());
                    } else {
                        println!("{code}");
                    }

                    if let Some(index) = args.learn {
                        let name = session
                            .switch_names()
                            .get(index)
                            .cloned()
                            .unwrap_or_default();
                        session.update_switch(index, name, code)?;
                        if !global.quiet {
                            eprintln!("Stored code in switch {index}");
                        }
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dropped events while printing");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}
