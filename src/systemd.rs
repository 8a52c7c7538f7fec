use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::register::{self, Registration};

pub const UNIT_DIR: &str = "/etc/systemd/system";

/// Path to the unit file for a tunnel.
pub fn unit_path(reg: &Registration) -> PathBuf {
    Path::new(UNIT_DIR).join(format!("{}.service", reg.program()))
}

/// Generate a systemd service unit that keeps the tunnel up.
pub fn unit_file(reg: &Registration, log_dir: &Path) -> String {
    let name = reg.program();
    format!(
        "[Unit]
Description=Reverse tunnel service for {tunnel}
After=network-online.target
Wants=network-online.target
StartLimitIntervalSec=0
StartLimitBurst={retry}

[Service]
Type=simple
ExecStart={exec}
Restart=always
RestartSec=60
StandardError=append:{err}
StandardOutput=append:{out}

[Install]
WantedBy=multi-user.target
",
        tunnel = reg.name,
        retry = reg.retry,
        exec = exec_start(reg),
        err = log_dir.join(format!("{}.err.log", name)).display(),
        out = log_dir.join(format!("{}.out.log", name)).display(),
    )
}

/// Older systemd versions only accept an absolute path in `ExecStart`.
/// `$` is doubled so systemd does not expand environment variables.
fn exec_start(reg: &Registration) -> String {
    let line = reg.service_command_line().replace('$', "$$");
    match reg.command.first() {
        Some(first) if !first.starts_with('/') => format!("/usr/bin/env {}", line),
        _ => line,
    }
}

fn systemctl(args: &[&str]) -> Result<()> {
    let status = Command::new("systemctl")
        .args(args)
        .status()
        .context("failed to run systemctl")?;
    if !status.success() {
        anyhow::bail!("systemctl {} exited with {}", args.join(" "), status);
    }
    Ok(())
}

/// Install the unit, then enable and (re)start it.
pub fn register(reg: &Registration, log_dir: &Path) -> Result<()> {
    register::require_root()?;

    if !Path::new(UNIT_DIR).is_dir() {
        anyhow::bail!("systemd directory {} not found", UNIT_DIR);
    }
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let path = unit_path(reg);
    fs::write(&path, unit_file(reg, log_dir))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(tunnel = %reg.name, path = %path.display(), "wrote systemd unit");

    let program = reg.program();
    systemctl(&["daemon-reload"])?;
    systemctl(&["enable", &program])?;
    systemctl(&["restart", &program])?;
    Ok(())
}
