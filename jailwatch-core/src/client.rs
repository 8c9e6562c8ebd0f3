use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::jails;
use crate::types::JailSet;
use std::io::ErrorKind;
use std::process::Command;

pub trait DaemonClient {
  fn list_jails(&self) -> Result<JailSet>;
  fn banned_with_time(&self, jail: &str) -> Result<String>;
  fn jail_status(&self, jail: &str) -> Result<String>;
  fn ban(&self, jail: &str, ip: &str) -> Result<()>;
  fn unban(&self, jail: &str, ip: &str) -> Result<()>;
  fn unban_everywhere(&self, ip: &str) -> Result<()>;
  fn ping(&self) -> Result<()>;
}

pub struct Fail2banClient {
  binary: String,
  socket: Option<String>,
}

impl Fail2banClient {
  pub fn new(cfg: &ClientConfig) -> Self {
    let socket = Some(cfg.socket.trim())
      .filter(|s| !s.is_empty())
      .map(str::to_string);
    Self {
      binary: cfg.binary.clone(),
      socket,
    }
  }

  fn run(&self, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(&self.binary);
    if let Some(sock) = &self.socket {
      cmd.args(["-s", sock]);
    }
    cmd.args(args);

    let rendered = format!("{} {}", self.binary, args.join(" "));
    tracing::debug!(command = %rendered, "running daemon client");

    let output = cmd.output().map_err(|e| {
      if e.kind() == ErrorKind::NotFound {
        Error::ToolMissing {
          binary: self.binary.clone(),
        }
      } else {
        Error::Upstream {
          command: rendered.clone(),
          status: "spawn failed".to_string(),
          stderr: e.to_string(),
        }
      }
    })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let stdout = String::from_utf8_lossy(&output.stdout);
      let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
      } else {
        stderr.trim().to_string()
      };
      return Err(Error::Upstream {
        command: rendered,
        status: output.status.to_string(),
        stderr: detail,
      });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

impl DaemonClient for Fail2banClient {
  fn list_jails(&self) -> Result<JailSet> {
    let out = self.run(&["status"])?;
    Ok(jails::parse_jail_list(&out))
  }

  fn banned_with_time(&self, jail: &str) -> Result<String> {
    self.run(&["get", jail, "banip", "--with-time"])
  }

  fn jail_status(&self, jail: &str) -> Result<String> {
    self.run(&["status", jail])
  }

  fn ban(&self, jail: &str, ip: &str) -> Result<()> {
    self.run(&["set", jail, "banip", ip])?;
    Ok(())
  }

  fn unban(&self, jail: &str, ip: &str) -> Result<()> {
    self.run(&["set", jail, "unbanip", ip])?;
    Ok(())
  }

  fn unban_everywhere(&self, ip: &str) -> Result<()> {
    self.run(&["unban", ip])?;
    Ok(())
  }

  fn ping(&self) -> Result<()> {
    self.run(&["ping"])?;
    Ok(())
  }
}
