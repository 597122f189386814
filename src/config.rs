//! Server configuration
//!
//! Environment variables set the defaults, command-line flags override them:
//!
//! | Variable      | Flag             | Default          |
//! |---------------|------------------|------------------|
//! | `PARLOR_HOST` | `--host`         | `0.0.0.0`        |
//! | `PORT`        | `--port`, `-p`   | `3000`           |
//! | `PARLOR_DB`   | `--db-path`, `-d`| none (in-memory) |
//! | `PARLOR_SESSION_TTL` | `--session-ttl` | none (sessions last until logout) |
//! | `RUST_LOG`    |                  | `info`           |
//!
//! `--memory` forces the in-memory store even when `PARLOR_DB` is set.

use crate::error::{ChatError, Result};

pub const DEFAULT_PORT: u16 = 3000;

pub const USAGE: &str = "\
parlor-server - Chat message backend

USAGE:
    parlor-server [OPTIONS]

OPTIONS:
    -d, --db-path <PATH>      Persist messages and sessions in an LMDB store at PATH
        --memory              Keep everything in memory only
        --host <HOST>         Bind address (default: 0.0.0.0)
        --session-ttl <SECS>  Expire sessions SECS seconds after login
    -p, --port <PORT>         Listen on PORT (default: 3000)
    -h, --help                Show this help message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` selects the in-memory store
    pub db_path: Option<String>,
    /// Session lifetime in seconds; `None` keeps sessions until logout
    pub session_ttl_secs: Option<u64>,
    pub log_filter: String,
}

/// What the command line asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve(Config),
    Help,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            db_path: None,
            session_ttl_secs: None,
            log_filter: "info".into(),
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Defaults overlaid with variables from `get`
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut c = Config::default();
        if let Some(host) = get("PARLOR_HOST") {
            c.host = host;
        }
        if let Some(port) = get("PORT") {
            c.port = parse_port(&port)?;
        }
        c.db_path = get("PARLOR_DB").filter(|p| !p.is_empty());
        if let Some(ttl) = get("PARLOR_SESSION_TTL").filter(|t| !t.is_empty()) {
            c.session_ttl_secs = Some(parse_ttl(&ttl)?);
        }
        if let Some(filter) = get("RUST_LOG") {
            c.log_filter = filter;
        }
        Ok(c)
    }

    /// Apply command-line flags (without the program name)
    pub fn apply_args<I, S>(mut self, args: I) -> Result<Command>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--db-path" | "-d" => {
                    self.db_path = Some(value(&args, i)?.to_string());
                    i += 1;
                }
                "--port" | "-p" => {
                    self.port = parse_port(value(&args, i)?)?;
                    i += 1;
                }
                "--host" => {
                    self.host = value(&args, i)?.to_string();
                    i += 1;
                }
                "--session-ttl" => {
                    self.session_ttl_secs = Some(parse_ttl(value(&args, i)?)?);
                    i += 1;
                }
                "--memory" => self.db_path = None,
                "--help" | "-h" => return Ok(Command::Help),
                other => return Err(ChatError::Config(format!("unknown argument: {}", other))),
            }
            i += 1;
        }
        Ok(Command::Serve(self))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn value(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| ChatError::Config(format!("{} needs a value", args[i])))
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse().map_err(|_| ChatError::Config(format!("invalid port: {}", s)))
}

fn parse_ttl(s: &str) -> Result<u64> {
    match s.parse() {
        Ok(0) | Err(_) => Err(ChatError::Config(format!("invalid session ttl: {}", s))),
        Ok(secs) => Ok(secs),
    }
}
