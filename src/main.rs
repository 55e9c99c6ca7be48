//! Stagehand CLI
//!
//! Run a test server by hand, check what address a device would call back
//! on, and produce backdoor commands for manual invocation.

use std::sync::mpsc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use colored::*;
use stagehand::backdoor::{BackdoorKey, Command, Platform};
use stagehand::config::ServerSettings;
use stagehand::discovery;
use stagehand::fixtures::{BACKDOOR_EXPORT, DEFAULT_HOST, REST_PORT};
use stagehand::server::{TestResponse, TestServer};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version)]
#[command(about = "Stagehand - test HTTP servers and backdoor commands for UI acceptance tests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test server until Ctrl+C
    ///
    /// Serves the liveness route plus any static text routes:
    ///   stagehand serve --port 3434 --text "/api/sanity=Server Sane"
    Serve {
        /// Interface to bind
        #[arg(long, env = "STAGEHAND_HOST", default_value = DEFAULT_HOST)]
        host: String,

        /// Port to bind
        #[arg(long, env = "STAGEHAND_PORT", default_value_t = REST_PORT)]
        port: u16,

        /// Static GET route as PATH=BODY (repeatable)
        #[arg(long = "text", value_name = "PATH=BODY")]
        texts: Vec<String>,

        /// Do not echo requests
        #[arg(long, short = 'q')]
        quiet: bool,
    },
    /// Print the local address a remote device can reach this host on
    Discover,
    /// Print the export name and serialized form of a backdoor command
    Command {
        /// Backdoor key, e.g. GetUseHttps
        key: String,

        /// Optional payload
        payload: Option<String>,

        /// Target platform (android or ios)
        #[arg(long, default_value = "android")]
        platform: Platform,
    },
    /// GET a URL and print status and body
    Ping {
        /// Full URL, e.g. http://10.0.0.5:3434/
        url: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            host,
            port,
            texts,
            quiet,
        } => serve(ServerSettings::new(host, port), texts, quiet),
        Commands::Discover => discover(),
        Commands::Command {
            key,
            payload,
            platform,
        } => print_command(&key, payload, platform),
        Commands::Ping { url } => ping(&url),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn serve(settings: ServerSettings, texts: Vec<String>, quiet: bool) -> anyhow::Result<()> {
    let server = TestServer::new(settings);

    for route in texts {
        let (path, body) = route
            .split_once('=')
            .ok_or_else(|| anyhow!("--text expects PATH=BODY, got '{}'", route))?;
        let body = body.to_string();
        server.get(path, move |_| TestResponse::text(body.clone()));
    }
    if !quiet {
        server.log_to_console();
    }

    server.start()?;

    println!("{}", "=== Stagehand Test Server ===".green().bold());
    match server.url("/") {
        Ok(url) => println!("Listening on {}", url.cyan()),
        Err(e) => println!(
            "Listening on port {} ({}: {})",
            server.port(),
            "no reachable address".yellow(),
            e
        ),
    }
    println!("Press Ctrl+C to stop");
    println!();

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install Ctrl+C handler")?;
    let _ = rx.recv();

    println!();
    println!("Stopping after {} request(s)...", server.requests_served());
    server.stop()?;
    Ok(())
}

fn discover() -> anyhow::Result<()> {
    let ip = discovery::local_reachable_address()?;
    println!("{}", ip);
    Ok(())
}

fn print_command(key: &str, payload: Option<String>, platform: Platform) -> anyhow::Result<()> {
    let command = match payload {
        Some(payload) => Command::with_payload(key, payload),
        None => Command::new(key),
    };

    match command.backdoor_key() {
        Some(known) if known.takes_payload() && command.payload.is_none() => {
            eprintln!("{}: {} expects a payload", "Warning".yellow().bold(), known);
        }
        Some(_) => {}
        None => {
            let known: Vec<&str> = BackdoorKey::ALL.iter().map(|k| k.as_str()).collect();
            eprintln!(
                "{}: '{}' is not a known key ({})",
                "Warning".yellow().bold(),
                key,
                known.join(", ")
            );
        }
    }

    println!("export: {}", platform.export_name(BACKDOOR_EXPORT));
    println!("{}", command.to_wire()?);
    Ok(())
}

fn ping(url: &str) -> anyhow::Result<()> {
    let response = reqwest::blocking::get(url).with_context(|| format!("GET {} failed", url))?;
    let status = response.status();
    let body = response.text()?;

    let status_text = if status.is_success() {
        status.to_string().green()
    } else {
        status.to_string().red()
    };
    println!("{}", status_text);
    println!("{}", body);
    Ok(())
}
