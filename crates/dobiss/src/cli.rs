//! Clap derive structures for the `dobiss` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

use dobiss_core::EntityKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// dobiss -- control a Dobiss home-automation gateway
#[derive(Debug, Parser)]
#[command(
    name = "dobiss",
    version,
    about = "Control Dobiss home-automation gateways from the command line",
    long_about = "Discover lights, outputs and temperature zones on a Dobiss gateway,\n\
        read their status, send actions and follow live status pushes.\n\n\
        Entities are addressed by object id (dobissid_<address>_<channel>)\n\
        or by <address>:<channel>.",
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

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "DOBISS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway host or host:port (overrides profile)
    #[arg(long, short = 'H', env = "DOBISS_HOST", global = true)]
    pub host: Option<String>,

    /// Token signing secret (overrides profile and keyring)
    #[arg(long, env = "DOBISS_SECRET", global = true, hide_env_values = true)]
    pub secret: Option<String>,

    /// Use https/wss
    #[arg(long, global = true)]
    pub secure: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "DOBISS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

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
    #[arg(long, env = "DOBISS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the entities the gateway exposes
    #[command(alias = "ls")]
    Discover(DiscoverArgs),

    /// Read current status for all or selected entities
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Switch an output on
    On(OnArgs),

    /// Switch an output off
    Off(OffArgs),

    /// Flip an output's state
    Toggle(IdArg),

    /// Control temperature zones
    #[command(alias = "t")]
    Temp(TempArgs),

    /// Follow live status changes until Ctrl-C
    Watch(WatchArgs),

    /// Check that the gateway accepts the configured secret
    AuthCheck,

    /// Manage profiles and the config file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Only show entities of this kind (light, switch, temperature_zone, ...)
    #[arg(long)]
    pub kind: Option<EntityKind>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Entities to poll individually (default: everything)
    pub ids: Vec<String>,

    /// Only show entities of this kind
    #[arg(long)]
    pub kind: Option<EntityKind>,
}

#[derive(Debug, Args)]
pub struct IdArg {
    /// Object id (dobissid_65_0) or address:channel (65:0)
    pub id: String,
}

#[derive(Debug, Args)]
pub struct OnArgs {
    /// Object id (dobissid_65_0) or address:channel (65:0)
    pub id: String,

    /// Brightness percentage for dimmable outputs
    #[arg(long, short = 'b', value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: Option<u8>,

    /// Seconds to wait before switching on
    #[arg(long)]
    pub delay_on: Option<u64>,

    /// Seconds after which to switch off again
    #[arg(long)]
    pub delay_off: Option<u64>,
}

#[derive(Debug, Args)]
pub struct OffArgs {
    pub id: String,

    #[arg(long)]
    pub delay_on: Option<u64>,

    #[arg(long)]
    pub delay_off: Option<u64>,
}

#[derive(Debug, Args)]
pub struct TempArgs {
    #[command(subcommand)]
    pub command: TempCommand,
}

#[derive(Debug, Subcommand)]
pub enum TempCommand {
    /// Set a zone's target for its default manual duration
    Set {
        id: String,
        /// Target temperature in °C
        #[arg(allow_negative_numbers = true)]
        temperature: f64,
    },

    /// Hold a target for a number of minutes (-15 = indefinitely, -30 = back to calendar)
    Timer {
        id: String,
        #[arg(allow_negative_numbers = true)]
        temperature: f64,
        #[arg(allow_negative_numbers = true)]
        minutes: i32,
    },

    /// Switch a zone to a named calendar
    Preset { id: String, calendar: String },

    /// Turn manual mode on or off
    Manual { id: String, state: Switch },

    /// List the gateway's temperature calendars
    Calendars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only report entities of this kind
    #[arg(long)]
    pub kind: Option<EntityKind>,

    /// Seconds between status-socket reconnect attempts
    #[arg(long)]
    pub reconnect_delay: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration (secrets redacted)
    Show,

    /// Print the config file location
    Path,

    /// Create or replace a profile from --host / --secret
    Init(InitArgs),

    /// List profile names (* marks the default)
    Profiles,

    /// Make a profile the default
    Use { name: String },
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Environment variable holding the secret instead of storing it
    #[arg(long, conflicts_with = "keyring")]
    pub secret_env: Option<String>,

    /// Store the secret (from --secret) in the system keyring
    #[arg(long)]
    pub keyring: bool,

    /// Seconds between discovery refetches
    #[arg(long)]
    pub discovery_interval: Option<u64>,

    /// Make this the default profile
    #[arg(long)]
    pub set_default: bool,
}
