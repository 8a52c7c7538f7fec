use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::register::{self, Registration};

pub const CONF_DIR: &str = "/etc/supervisor/conf.d";

/// Path of the program stanza for a tunnel.
pub fn conf_path(reg: &Registration) -> PathBuf {
    Path::new(CONF_DIR).join(format!("{}.conf", reg.program()))
}

/// Program stanza for supervisord.
pub fn program_conf(reg: &Registration, log_dir: &Path) -> String {
    let name = reg.program();
    format!(
        "[program:{name}]
command={command}
autostart=true
autorestart=true
startretries={retry}
stderr_logfile={err}
stdout_logfile={out}
",
        name = name,
        command = reg.service_command_line(),
        retry = reg.retry,
        err = log_dir.join(format!("{}.err.log", name)).display(),
        out = log_dir.join(format!("{}.out.log", name)).display(),
    )
}

fn supervisorctl(args: &[&str]) -> Result<()> {
    let status = Command::new("supervisorctl")
        .args(args)
        .status()
        .context("failed to run supervisorctl, is supervisor installed?")?;
    if !status.success() {
        anyhow::bail!("supervisorctl {} exited with {}", args.join(" "), status);
    }
    Ok(())
}

/// Write the program stanza and have supervisord pick it up.
pub fn register(reg: &Registration, log_dir: &Path) -> Result<()> {
    register::require_root()?;

    if !Path::new(CONF_DIR).is_dir() {
        anyhow::bail!("supervisor config directory {} not found", CONF_DIR);
    }
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let path = conf_path(reg);
    fs::write(&path, program_conf(reg, log_dir))
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(tunnel = %reg.name, path = %path.display(), "wrote supervisor program");

    let program = reg.program();
    supervisorctl(&["update"])?;
    supervisorctl(&["restart", &program])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> Registration {
        Registration {
            name: "office".to_string(),
            retry: 5,
            command: vec![
                "ssh".to_string(),
                "root@10.0.0.1".to_string(),
                "-N".to_string(),
                "-R".to_string(),
                "127.0.0.1:2222:127.0.0.1:22".to_string(),
            ],
        }
    }

    #[test]
    fn program_stanza() {
        let conf = program_conf(&reg(), Path::new("/var/log/rev-tun"));
        assert_eq!(
            conf,
            "[program:rev-tun-office]
command=ssh root@10.0.0.1 -N -R 127.0.0.1:2222:127.0.0.1:22
autostart=true
autorestart=true
startretries=5
stderr_logfile=/var/log/rev-tun/rev-tun-office.err.log
stdout_logfile=/var/log/rev-tun/rev-tun-office.out.log
"
        );
    }

    #[test]
    fn command_keeps_spaces_and_percent() {
        let reg = Registration {
            name: "office".to_string(),
            retry: 3,
            command: vec![
                "ssh".to_string(),
                "root@10.0.0.1".to_string(),
                "-i".to_string(),
                "/root/my keys/id".to_string(),
                "-o".to_string(),
                "proxyCommand=ssh -W %h:%p jump".to_string(),
            ],
        };
        let conf = program_conf(&reg, Path::new("/var/log/rev-tun"));
        assert!(
            conf.contains(
                "command=ssh root@10.0.0.1 -i \"/root/my keys/id\" -o \"proxyCommand=ssh -W %%h:%%p jump\"\n"
            ),
            "{conf}"
        );
    }

    #[test]
    fn conf_file_location() {
        assert_eq!(
            conf_path(&reg()),
            PathBuf::from("/etc/supervisor/conf.d/rev-tun-office.conf")
        );
    }
}
