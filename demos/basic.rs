//! Load and validate a server config, reporting every failing field.
//!
//! ```text
//! cargo run --example basic -- --config demos/server.toml
//! ```

use std::path::PathBuf;

use clap::Parser;
use ruleconf::{ConfigError, FieldDescriptor, Record, Rule, Violation};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "basic")]
#[command(about = "Validate a config file and print the result", long_about = None)]
struct Cli {
    /// Config file (.toml, .json, .yaml)
    #[arg(short, long, default_value = "demos/server.toml")]
    config: PathBuf,
}

#[derive(Debug, Deserialize, Record)]
struct ServerConfig {
    #[validate("required,hostname")]
    host: String,
    #[validate("required,min=1,max=65535")]
    port: u32,
    #[validate("oneof=dev|staging|prod")]
    env: String,
    #[serde(default)]
    tls: Option<TlsConfig>,
    #[serde(default)]
    upstreams: Vec<Upstream>,
}

#[derive(Debug, Deserialize, Record)]
struct TlsConfig {
    #[validate("required,pattern=.*\\.pem")]
    cert_path: String,
    #[validate("required,pattern=.*\\.pem")]
    key_path: String,
}

#[derive(Debug, Deserialize, Record)]
struct Upstream {
    #[validate("required")]
    name: String,
    #[validate("min=1,max=100")]
    weight: u32,
}

/// Lowercase DNS label characters and dots only.
#[derive(Debug)]
struct Hostname;

impl Rule for Hostname {
    fn name(&self) -> &str {
        "hostname"
    }

    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        let host = field
            .value
            .as_str()
            .ok_or_else(|| Violation::unsupported("hostname", field.value.kind()))?;
        let valid = host
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
        if valid {
            Ok(())
        } else {
            Err(Violation::Custom(format!("{host:?} is not a valid hostname")))
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ruleconf=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    ruleconf::register_rule("hostname", |_| Ok(Box::new(Hostname)));

    match ruleconf::load::<ServerConfig>(&cli.config) {
        Ok(config) => {
            println!("{} is valid:", cli.config.display());
            println!("  listen   {}:{} ({})", config.host, config.port, config.env);
            if let Some(tls) = &config.tls {
                println!("  tls      {} / {}", tls.cert_path, tls.key_path);
            }
            for upstream in &config.upstreams {
                println!("  upstream {} (weight {})", upstream.name, upstream.weight);
            }
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            eprintln!("{} has {} invalid field(s):", cli.config.display(), errors.len());
            for error in &errors {
                eprintln!("  {:<20} {}", error.field, error.message());
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
