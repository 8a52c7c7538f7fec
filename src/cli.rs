use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use rev_tun::register::RegisterType;

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "rev-tun", about = "Register SSH tunnels described in TOML files", version)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log loader and renderer details to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Directory holding the tunnel files (default /etc/rev-tun)
    #[arg(long, global = true, value_name = "DIR")]
    pub conf_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

fn complete_tunnel_names(current: &std::ffi::OsStr) -> Vec<CompletionCandidate> {
    let prefix = current.to_str().unwrap_or("");
    let dir = Settings::load().conf_dir(None);
    rev_tun::config::discover(&dir)
        .unwrap_or_default()
        .iter()
        .map(|path| rev_tun::config::tunnel_name(path))
        .filter(|name| name.starts_with(prefix))
        .map(CompletionCandidate::new)
        .collect()
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a tunnel (all tunnels if NAME is omitted)
    Register {
        /// Tunnel name, the file stem of NAME.toml
        #[arg(add = ArgValueCompleter::new(complete_tunnel_names))]
        name: Option<String>,
        /// Backend to register with (default supervisor)
        #[arg(long, short = 'r', value_enum)]
        register: Option<RegisterType>,
        /// Directory for tunnel logs (default /var/log/rev-tun)
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },
    /// Print the ssh command for a tunnel
    Render {
        /// Tunnel name (interactive picker if omitted)
        #[arg(add = ArgValueCompleter::new(complete_tunnel_names))]
        name: Option<String>,
    },
    /// List all tunnels and their forwards
    #[command(alias = "ls")]
    List,
    /// Load and render every tunnel, reporting failures
    Check,
    /// Create default.toml and an example tunnel in the config directory
    Init,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (reads from settings if omitted)
        shell: Option<clap_complete::Shell>,
    },
    /// List tunnel names (for shell completion scripts)
    #[command(hide = true)]
    ListTunnelNames,
}
