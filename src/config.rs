// src/config.rs

//! Parses the server's command-line configuration (§6). There is no config
//! file: the entire CLI surface is `--flag value` pairs scanned directly out
//! of `std::env::args()`, in the same unadorned style as the teacher's own
//! `main.rs` hand-parsing `--warden`/`--config`/`--port`.

use anyhow::{Result, anyhow};

/// One server invocation's configuration: how many replicas to launch, and
/// the base ports/hosts each one derives its own addresses and candidate
/// peer set from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of replicas this process launches, each as its own
    /// independently-stateful async task (§2: "a deployment is a fixed-size
    /// set of replicas").
    pub num_servers: usize,
    /// Client-facing port for replica 0; replica `i`'s client port is
    /// `start_server_port + i`.
    pub start_server_port: u16,
    /// Peer-facing port for replica 0; replica `i`'s peer port is
    /// `start_internal_port + i`.
    pub start_internal_port: u16,
    /// Host every replica launched by this process binds to, and advertises
    /// itself as.
    pub host: String,
    /// Hosts to search for peers on (§4.F's "configured hosts"), comma-split
    /// from `--internal_other_servers`.
    pub internal_other_servers: Vec<String>,
    /// Start of the per-host candidate port range.
    pub internal_other_ports: u16,
    /// Width of the per-host candidate port range ("10 candidate peers per
    /// host" by default).
    pub internal_max_ports: u16,
    /// Directory the Durable Store reads/writes its per-replica shards
    /// under. Relative paths are resolved against the working directory the
    /// process is launched from.
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_servers: 2,
            start_server_port: 50000,
            start_internal_port: 60000,
            host: "localhost".to_string(),
            internal_other_servers: vec!["localhost".to_string()],
            internal_other_ports: 60000,
            internal_max_ports: 10,
            data_dir: "database".to_string(),
        }
    }
}

impl Config {
    /// This crate's usage text, printed by `-h`/`--help`.
    pub const USAGE: &'static str = "\
Usage: relaylink [OPTIONS]

Options:
  --num_servers <N>             Number of replicas to launch [default: 2]
  --start_server_port <PORT>    Client-facing port for replica 0 [default: 50000]
  --start_internal_port <PORT>  Peer-facing port for replica 0 [default: 60000]
  --host <HOST>                 Host every launched replica binds to [default: localhost]
  --internal_other_servers <CSV>  Comma-separated hosts to search for peers [default: localhost]
  --internal_other_ports <PORT>    Start of the per-host candidate port range [default: 60000]
  --internal_max_ports <N>         Width of the per-host candidate port range [default: 10]
  --data_dir <PATH>             Directory for durable per-replica shards [default: database]
  --version                     Print the crate version and exit
  -h, --help                    Print this message and exit
";

    /// Parses `args` (excluding the program name) into a `Config`, applying
    /// `Default::default()` for any flag not present. Unknown flags and
    /// malformed values are rejected with a descriptive error; this never
    /// panics on untrusted input.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut take_value = || -> Result<&str> {
                i += 1;
                args.get(i)
                    .map(String::as_str)
                    .ok_or_else(|| anyhow!("{flag} requires a value"))
            };

            match flag {
                "--num_servers" => config.num_servers = parse_value(take_value()?, flag)?,
                "--start_server_port" => config.start_server_port = parse_value(take_value()?, flag)?,
                "--start_internal_port" => {
                    config.start_internal_port = parse_value(take_value()?, flag)?
                }
                "--host" => config.host = take_value()?.to_string(),
                "--data_dir" => config.data_dir = take_value()?.to_string(),
                "--internal_other_servers" => {
                    config.internal_other_servers = split_csv(take_value()?)
                }
                "--internal_other_ports" => {
                    config.internal_other_ports = parse_value(take_value()?, flag)?
                }
                "--internal_max_ports" => {
                    config.internal_max_ports = parse_value(take_value()?, flag)?
                }
                other => return Err(anyhow!("unrecognized flag '{other}'\n\n{}", Self::USAGE)),
            }
            i += 1;
        }

        if config.num_servers == 0 {
            return Err(anyhow!("--num_servers must be at least 1"));
        }
        if config.internal_other_servers.is_empty() {
            return Err(anyhow!("--internal_other_servers must name at least one host"));
        }
        Ok(config)
    }

    /// This replica's own client-facing `"host:port"`.
    pub fn client_addr(&self, replica_id: usize) -> String {
        format!("{}:{}", self.host, self.start_server_port + replica_id as u16)
    }

    /// This replica's own peer-facing `"host:port"`.
    pub fn peer_addr(&self, replica_id: usize) -> String {
        format!("{}:{}", self.host, self.start_internal_port + replica_id as u16)
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_value<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| anyhow!("invalid value '{raw}' for {flag}"))
}
