use std::path::Path;

use colored::Colorize;
use console::Alignment;

use rev_tun::config::{self, Loaded};
use rev_tun::TunnelConfig;

/// Print a formatted list of all tunnels with their forwards or load errors.
pub fn print_tunnel_list(dir: &Path, tunnels: &[Loaded]) {
    if tunnels.is_empty() {
        println!("{}", format!("No tunnels found in {}", dir.display()).yellow());
        println!("Run `rev-tun init` to create default.toml and an example tunnel.");
        return;
    }

    let rows: Vec<Row> = tunnels
        .iter()
        .map(|(path, loaded)| Row {
            name: config::tunnel_name(path),
            detail: match loaded {
                Ok(cfg) => Detail::Loaded {
                    target: format!("{}@{}", cfg.server().user, cfg.server().addr),
                    forwards: forwards(cfg),
                    enabled: cfg.enabled_services().count(),
                },
                Err(e) => Detail::Broken(e.to_string()),
            },
        })
        .collect();

    let w_name = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let w_target = rows
        .iter()
        .map(|r| match &r.detail {
            Detail::Loaded { target, .. } => target.len(),
            Detail::Broken(_) => 0,
        })
        .max()
        .unwrap_or(0);

    for row in &rows {
        match &row.detail {
            Detail::Loaded {
                target,
                forwards,
                enabled,
            } => {
                let (bullet, name) = if *enabled > 0 {
                    ("●".green().to_string(), row.name.green().bold().to_string())
                } else {
                    ("○".dimmed().to_string(), row.name.to_string())
                };
                println!(
                    "  {} {}  {}  {}",
                    bullet,
                    pad(&name, w_name),
                    pad(target, w_target),
                    forwards.dimmed()
                );
            }
            Detail::Broken(err) => {
                println!(
                    "  {} {}  {}",
                    "✗".red(),
                    pad(&row.name.red().bold().to_string(), w_name),
                    err.red()
                );
            }
        }
    }
}

fn forwards(cfg: &TunnelConfig) -> String {
    let parts: Vec<String> = cfg.enabled_services().map(|s| s.to_string()).collect();
    if parts.is_empty() {
        "no enabled services".to_string()
    } else {
        parts.join(", ")
    }
}

/// Column cell: colored text left-aligned to `width` visible characters.
fn pad(cell: &str, width: usize) -> String {
    console::pad_str(cell, width, Alignment::Left, None).into_owned()
}

struct Row {
    name: String,
    detail: Detail,
}

enum Detail {
    Loaded {
        target: String,
        forwards: String,
        enabled: usize,
    },
    Broken(String),
}
