mod doctor;
mod serve;

use anyhow::{Result, bail};
use console::style;
use std::path::PathBuf;

use crate::core::config::AppConfig;
use crate::core::terminal::{self, GuideSection};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Commands")
        .command("serve", "Start the API server (default)")
        .command("doctor", "Check the interpreter and worker scripts")
        .command("help", "Show this help")
        .print();

    GuideSection::new("Options")
        .text("--config <path>   Config file (default: ./postdeck.toml)")
        .text("--host <host>     Bind address, overrides [server].host")
        .text("--port <port>     Bind port, overrides [server].port")
        .print();

    GuideSection::new("Environment")
        .text("POSTDECK_HOST, POSTDECK_PORT, POSTDECK_WORKER_DIR, POSTDECK_ACCESS_TOKEN")
        .text("POSTDECK_HOME     Data directory (default: ~/.postdeck)")
        .print();

    println!(
        " {} {} [command] [options]\n",
        style("Usage:").bold(),
        style("postdeck").green()
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServeFlags {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServeFlags {
    /// Command-line values win over both the file and the environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

pub(crate) fn parse_serve_flags(args: &[String], start: usize) -> Result<ServeFlags> {
    let mut flags = ServeFlags::default();
    let mut i = start;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => flags.config = Some(PathBuf::from(v)),
            ("--host", Some(v)) => flags.host = Some(v.clone()),
            ("--port" | "-p", Some(v)) => match v.parse() {
                Ok(port) => flags.port = Some(port),
                Err(_) => bail!("invalid port: {v}"),
            },
            ("--config" | "-c" | "--host" | "--port" | "-p", None) => {
                bail!("{} needs a value", args[i])
            }
            (other, _) => bail!("unknown option: {other}"),
        }
        i += 2;
    }
    Ok(flags)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Bare flags mean `serve`.
    let (cmd, rest) = match args.get(1).map(String::as_str) {
        None => ("serve", 1),
        Some(flag)
            if flag.starts_with('-')
                && !matches!(flag, "-h" | "--help" | "-V" | "--version") =>
        {
            ("serve", 1)
        }
        Some(cmd) => (cmd, 2),
    };

    match cmd {
        "serve" => serve::run(parse_serve_flags(&args, rest)?).await,
        "doctor" => {
            let flags = parse_serve_flags(&args, rest)?;
            if doctor::run(flags.config.as_deref()).await? {
                Ok(())
            } else {
                bail!("doctor found problems")
            }
        }
        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "version" | "-V" | "--version" => {
            println!("postdeck {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_help();
            bail!("unknown command: {other}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_all_serve_flags() {
        let flags = parse_serve_flags(
            &args(&["postdeck", "serve", "--config", "/etc/p.toml", "--host", "0.0.0.0", "-p", "8080"]),
            2,
        )
        .unwrap();
        assert_eq!(
            flags,
            ServeFlags {
                config: Some(PathBuf::from("/etc/p.toml")),
                host: Some("0.0.0.0".to_string()),
                port: Some(8080),
            }
        );
    }

    #[test]
    fn rejects_bad_port_and_dangling_flag() {
        assert!(parse_serve_flags(&args(&["postdeck", "--port", "http"]), 1).is_err());
        assert!(parse_serve_flags(&args(&["postdeck", "serve", "--host"]), 2).is_err());
        assert!(parse_serve_flags(&args(&["postdeck", "serve", "--verbose"]), 2).is_err());
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        ServeFlags {
            config: None,
            host: Some("0.0.0.0".to_string()),
            port: Some(9999),
        }
        .apply(&mut config);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9999);

        ServeFlags::default().apply(&mut config);
        assert_eq!(config.server.port, 9999);
    }
}
