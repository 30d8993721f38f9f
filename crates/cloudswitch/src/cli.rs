//! Clap derive structures for the `cloudswitch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-level CLI ────────────────────────────────────────────────────

/// cloudswitch -- control RF power switches through the device cloud
#[derive(Debug, Parser)]
#[command(
    name = "cloudswitch",
    version,
    about = "Toggle 433 MHz RF switches through a cloud-connected device",
    long_about = "Controls RF power switches through a Particle device running the \
        cloudswitch firmware.\n\n\
        The device replays stored tristate codes over 433 MHz and publishes \
        codes it hears from physical remotes back to the cloud.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Cloud API root URL
    #[arg(long, env = "CLOUDSWITCH_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "CLOUDSWITCH_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "CLOUDSWITCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & color enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-level command enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the password in the system keyring
    Login(LoginArgs),

    /// Remove the stored password from the keyring
    Logout,

    /// Manage cloud switch devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage the switch bank (names and RF codes)
    #[command(alias = "sw", alias = "s")]
    Switches(SwitchesArgs),

    /// Replay the RF code stored in a switch slot
    #[command(alias = "t")]
    Toggle(ToggleArgs),

    /// Listen for RF codes published by the selected device
    Listen(ListenArgs),

    /// Inspect the configuration
    Config(ConfigArgs),
}

// ── Login ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account username (email); prompted if omitted
    #[arg(long, short = 'u', env = "CLOUDSWITCH_USERNAME")]
    pub username: Option<String>,

    /// Do not store the password in the keyring after verifying it
    #[arg(long)]
    pub no_store: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices claimed by the account
    #[command(alias = "ls")]
    List,

    /// Select the device that drives the switches
    Select {
        /// Device id
        device: String,
    },

    /// Show the remembered device, refreshing it from the cloud
    Show,
}

// ── Switches ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SwitchesArgs {
    #[command(subcommand)]
    pub command: SwitchesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwitchesCommand {
    /// List switch slots with their names and codes
    #[command(alias = "ls")]
    List,

    /// Set a slot's name and/or tristate code
    Set {
        /// Slot index (0-based)
        index: usize,

        /// New display name
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// New tristate code (symbols 0, 1, F; empty clears the slot)
        #[arg(long, short = 'c')]
        code: Option<String>,
    },
}

// ── Toggle ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Slot index (0-based)
    pub index: usize,
}

// ── Listen ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Stop after this many seconds (runs until Ctrl-C if omitted)
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Store the first received code into this slot and exit
    #[arg(long, short = 'l', value_name = "INDEX")]
    pub learn: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration as TOML
    Show,

    /// Print the config and state file paths
    Path,
}
