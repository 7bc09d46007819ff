//! Single device: open a session and run one catalog operation.
//!
//! # Usage
//!
//! Cisco IOS with an enable secret:
//! ```bash
//! cargo run --example show_version -- --host 10.0.0.1 --user admin --password secret --enable s3cret
//! ```
//!
//! F5 BIG-IP hardware inventory:
//! ```bash
//! cargo run --example show_version -- --host lb1 --platform f5_bigip --user admin --key ~/.ssh/id_ed25519 --op hardware_inventory
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use netprobe::{Completion, Confidence, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for state transitions)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .platform(&args.platform)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key(key_path);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }
    if let Some(secret) = &args.enable {
        builder = builder.enable_secret(secret);
    }

    println!("Connecting to {}:{} ({})...", args.host, args.port, args.platform);
    let executor = builder.connect().await?;

    let result = executor.run(&args.operation).await?;

    println!("{}", "-".repeat(60));
    println!("{}", result.body);
    println!("{}", "-".repeat(60));
    println!(
        "{} via {:?}: {:?} in {:?}",
        args.operation, result.command, result.completion, result.elapsed
    );
    if result.confidence() == Confidence::Low {
        eprintln!("Warning: no prompt seen, output may be truncated");
    }
    if result.completion == Completion::Error {
        eprintln!("Device rejected the command: {:?}", result.failure_message);
    }

    executor.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    enable: Option<String>,
    platform: String,
    operation: String,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: env::var("USER").unwrap_or_else(|_| "admin".to_string()),
            password: None,
            key: None,
            enable: None,
            platform: "cisco_ios".to_string(),
            operation: "software_version".to_string(),
            timeout: 10,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => {
                    parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(22)
                }
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--key" | "-k" => parsed.key = value.map(PathBuf::from),
                "--enable" | "-e" => parsed.enable = value,
                "--platform" => parsed.platform = value.unwrap_or(parsed.platform),
                "--op" | "-o" => parsed.operation = value.unwrap_or(parsed.operation),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(10)
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"netprobe show_version example

USAGE:
    cargo run --example show_version -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -e, --enable <SECRET>    Privilege elevation secret
        --platform <NAME>    cisco_ios or f5_bigip [default: cisco_ios]
    -o, --op <NAME>          Catalog operation [default: software_version]
    -t, --timeout <SECS>     Connection timeout [default: 10]
    --help                   Print this help message
"#
        );
    }
}
