//! Clap derive structures for the `wibutler` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wibutler -- talk to a wibutler home-automation hub
#[derive(Debug, Parser)]
#[command(
    name = "wibutler",
    version,
    about = "Control and watch wibutler home-automation hubs",
    long_about = "List the devices a wibutler hub knows about, switch and dim lights,\n\
        drive blinds, set room temperatures, and watch live state changes\n\
        pushed by the hub.",
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
    /// Config file (default: platform config dir)
    #[arg(long, env = "WIBUTLER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Hub hostname or IP (overrides config)
    #[arg(long, short = 'H', env = "WIBUTLER_HOST", global = true)]
    pub host: Option<String>,

    /// Hub port (overrides config)
    #[arg(long, env = "WIBUTLER_PORT", global = true)]
    pub port: Option<u16>,

    /// Hub username (overrides config)
    #[arg(long, short = 'u', env = "WIBUTLER_USERNAME", global = true)]
    pub username: Option<String>,

    /// Use https/wss instead of http/ws
    #[arg(long, global = true)]
    pub tls: bool,

    /// Accept the hub's self-signed TLS certificate
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (default: none)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WIBUTLER_OUTPUT",
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

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect the hub's device directory
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// List the entities built from the directory
    #[command(alias = "e")]
    Entities(EntitiesArgs),

    /// Print live state changes until interrupted
    Watch(WatchArgs),

    /// Switch a relay on or off
    #[command(alias = "sw")]
    Switch(SwitchArgs),

    /// Switch or dim a light
    Light(LightArgs),

    /// Drive a blind or shutter
    Cover(CoverArgs),

    /// Set a room temperature
    Climate(ClimateArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES / ENTITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List,

    /// Show one device with its components
    Get {
        /// Device ID
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    #[command(subcommand)]
    pub command: EntitiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntitiesCommand {
    /// List entities with their current state
    #[command(alias = "ls")]
    List {
        /// Only entities of this kind
        #[arg(long, short = 'K')]
        kind: Option<EntityKindArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EntityKindArg {
    Switch,
    Light,
    Climate,
    Cover,
    Button,
    Sensor,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only these entities (repeatable)
    #[arg(long, short = 'e')]
    pub entity: Vec<String>,

    /// Reconnect with backoff when the push channel drops
    #[arg(long)]
    pub reconnect: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONTROL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SwitchArgs {
    #[command(subcommand)]
    pub command: SwitchCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwitchCommand {
    /// Turn a switch on
    On {
        /// Entity ID (`{device}_{name}`)
        entity: String,
    },
    /// Turn a switch off
    Off {
        /// Entity ID (`{device}_{name}`)
        entity: String,
    },
}

#[derive(Debug, Args)]
pub struct LightArgs {
    #[command(subcommand)]
    pub command: LightCommand,
}

#[derive(Debug, Subcommand)]
pub enum LightCommand {
    /// Turn a light on, optionally at a brightness
    On {
        /// Entity ID (`{device}_{name}`)
        entity: String,

        /// Brightness on the 0-255 scale; defaults to the last level
        #[arg(long, short = 'b')]
        brightness: Option<u8>,
    },
    /// Turn a light off
    Off {
        /// Entity ID (`{device}_{name}`)
        entity: String,
    },
}

#[derive(Debug, Args)]
pub struct CoverArgs {
    #[command(subcommand)]
    pub command: CoverCommand,
}

#[derive(Debug, Subcommand)]
pub enum CoverCommand {
    /// Open fully
    Open {
        /// Entity ID (device ID)
        entity: String,
    },
    /// Close fully
    Close {
        /// Entity ID (device ID)
        entity: String,
    },
    /// Stop a moving cover
    Stop {
        /// Entity ID (device ID)
        entity: String,

        /// Direction the cover is moving in (resent to stop it)
        #[arg(long)]
        last: Option<CoverDirection>,
    },
    /// Move to a position
    Position {
        /// Entity ID (device ID)
        entity: String,

        /// Percent open (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CoverDirection {
    Open,
    Close,
}

#[derive(Debug, Args)]
pub struct ClimateArgs {
    #[command(subcommand)]
    pub command: ClimateCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClimateCommand {
    /// Set the target temperature
    Set {
        /// Entity ID (device ID)
        entity: String,

        /// Target in °C
        celsius: f64,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Show the current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
