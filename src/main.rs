mod cli;
mod display;
mod logging;
mod picker;
mod settings;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;

use cli::{Cli, Command};
use rev_tun::config;
use rev_tun::register::{self, Registration};
use settings::Settings;

fn main() -> Result<()> {
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();
    logging::init(cli.verbose);
    let settings = Settings::load();

    if cli.no_color {
        colored::control::set_override(false);
        console::set_colors_enabled(false);
    }

    let conf_dir = settings.conf_dir(cli.conf_dir);

    match cli.command {
        Command::Register {
            name,
            register,
            log_dir,
        } => {
            let kind = settings.register(register);
            let log_dir = settings.log_dir(log_dir);
            cmd_register(&conf_dir, name, kind, &log_dir)
        }
        Command::Render { name } => cmd_render(&conf_dir, name),
        Command::List => cmd_list(&conf_dir),
        Command::Check => cmd_check(&conf_dir),
        Command::Init => cmd_init(&conf_dir),
        Command::Completions { shell } => cmd_completions(shell, &settings),
        Command::ListTunnelNames => cmd_list_tunnel_names(&conf_dir),
    }
}

fn register_one(
    cfg: &rev_tun::TunnelConfig,
    kind: register::RegisterType,
    log_dir: &Path,
) -> Result<Registration> {
    let reg = Registration::from_config(cfg)?;
    register::register(kind, &reg, log_dir)?;
    Ok(reg)
}

fn print_registered(reg: &Registration, kind: register::RegisterType) {
    println!(
        "{} {} {} {}",
        "✓".green(),
        reg.name.green().bold(),
        format!("registered with {}", kind).green(),
        format!("({})", reg.program()).dimmed()
    );
}

fn print_failed(name: &str, err: &anyhow::Error) {
    println!("{} {}  {:#}", "✗".red(), name.red().bold(), err);
}

fn cmd_register(
    conf_dir: &Path,
    name: Option<String>,
    kind: register::RegisterType,
    log_dir: &Path,
) -> Result<()> {
    if let Some(name) = name {
        let cfg = config::load_named(conf_dir, &name)?;
        let reg = register_one(&cfg, kind, log_dir)
            .with_context(|| format!("failed to register tunnel '{}'", name))?;
        print_registered(&reg, kind);
        return Ok(());
    }

    let tunnels = config::load_all(conf_dir)?;
    if tunnels.is_empty() {
        println!("{}", format!("No tunnels found in {}", conf_dir.display()).yellow());
        return Ok(());
    }

    let mut failed = 0;
    for (path, loaded) in &tunnels {
        let name = config::tunnel_name(path);
        let result = loaded
            .as_ref()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .and_then(|cfg| register_one(cfg, kind, log_dir));
        match result {
            Ok(reg) => print_registered(&reg, kind),
            Err(e) => {
                failed += 1;
                print_failed(&name, &e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} tunnels failed to register", failed, tunnels.len());
    }
    Ok(())
}

fn cmd_render(conf_dir: &Path, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => {
            let names: Vec<String> = config::discover(conf_dir)?
                .iter()
                .map(|p| config::tunnel_name(p))
                .collect();
            picker::pick_tunnel("Render tunnel", &names)?
        }
    };
    let cfg = config::load_named(conf_dir, &name)?;
    let command = rev_tun::render(&cfg)
        .with_context(|| format!("failed to render tunnel '{}'", name))?;
    println!("{}", command);
    Ok(())
}

fn cmd_list(conf_dir: &Path) -> Result<()> {
    let tunnels = config::load_all(conf_dir)?;
    display::print_tunnel_list(conf_dir, &tunnels);
    Ok(())
}

fn cmd_check(conf_dir: &Path) -> Result<()> {
    let tunnels = config::load_all(conf_dir)?;
    if tunnels.is_empty() {
        println!("{}", format!("No tunnels found in {}", conf_dir.display()).yellow());
        return Ok(());
    }

    let mut failed = 0;
    for (path, loaded) in &tunnels {
        let name = config::tunnel_name(path);
        let rendered = loaded
            .as_ref()
            .map_err(|e| e.to_string())
            .and_then(|cfg| rev_tun::render(cfg).map_err(|e| e.to_string()));
        match rendered {
            Ok(command) => {
                println!("  {} {}", "✓".green(), name.green().bold());
                println!("    {}", command.dimmed());
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}  {}", "✗".red(), name.red().bold(), e);
            }
        }
    }

    println!();
    let ok = tunnels.len() - failed;
    let summary = format!("{}/{} tunnels valid", ok, tunnels.len());
    if failed == 0 {
        println!("{}", summary.green());
        Ok(())
    } else {
        println!("{}", summary.yellow());
        anyhow::bail!("{} tunnel(s) failed to load or render", failed)
    }
}

fn cmd_init(conf_dir: &Path) -> Result<()> {
    let created = config::init(conf_dir)
        .with_context(|| format!("failed to initialize {}", conf_dir.display()))?;
    if created.is_empty() {
        println!("{} already initialized", conf_dir.display().to_string().yellow());
        return Ok(());
    }
    for path in &created {
        println!("{} created {}", "✓".green(), path.display());
    }
    println!(
        "{}",
        "Copy example.toml.sample to <name>.toml and edit it to add a tunnel.".dimmed()
    );
    Ok(())
}

/// Print the dynamic completion script for the shell by re-entering clap's
/// completion hook with `COMPLETE` set.
fn cmd_completions(shell: Option<clap_complete::Shell>, settings: &Settings) -> Result<()> {
    let shell = settings.shell(shell)?;
    unsafe { std::env::set_var("COMPLETE", shell.to_string()) };
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    Ok(())
}

fn cmd_list_tunnel_names(conf_dir: &Path) -> Result<()> {
    for path in config::discover(conf_dir)? {
        println!("{}", config::tunnel_name(&path));
    }
    Ok(())
}
