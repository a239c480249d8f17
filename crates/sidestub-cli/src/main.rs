//! side-stub CLI
//!
//! Interactive front-end for a target running the side-stub protocol.
//!
//! # Usage
//!
//! ```bash
//! # Start the REPL and connect from there
//! side-stub
//!
//! # Connect to a serial device straight away
//! side-stub --address /dev/ttyUSB0 --baud 115200
//!
//! # Run a single command against a QEMU gdbstub socket
//! side-stub -a tcp:localhost:1234 -c "tracepoint-then-get-registers sys_write"
//! ```

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sidestub_core::{Session, SessionConfig, StatsSnapshot};
use sidestub_protocol::Reply;
use sidestub_transport::SerialOptions;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::commands::ReplCommand;
use crate::config::Config;

/// side-stub - tracepoint client for remote targets
#[derive(Parser, Debug)]
#[command(name = "side-stub")]
#[command(author, version, about = "side-stub - remote tracepoint client")]
struct Args {
    /// Target address: serial device path or tcp:<host>:<port>
    #[arg(short, long, env = "SIDESTUB_ADDRESS")]
    address: Option<String>,

    /// Configuration file (TOML)
    #[arg(short = 'C', long, env = "SIDESTUB_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SIDESTUB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Reply timeout in milliseconds
    #[arg(long, env = "SIDESTUB_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if args.address.is_some() {
        config.address = args.address.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.session.reply_timeout_ms = timeout_ms;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }

    let level = args
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    init_logging(&level);

    let runtime = Runtime::new().context("Failed to start async runtime")?;
    let mut repl = Repl::new(runtime, config.session.clone(), config.serial.clone());

    if !args.quiet {
        print_banner();
    }

    if let Some(address) = config.address.as_deref() {
        repl.connect(address)?;
    }

    // Single command mode
    if let Some(cmd) = args.command {
        let command = ReplCommand::parse(&cmd)?;
        repl.execute(command)?;
        repl.disconnect();
        return Ok(());
    }

    // Interactive mode
    let mut rl = DefaultEditor::new()?;
    let history_path = dirs_next::home_dir()
        .map(|p| p.join(".side_stub_history"))
        .unwrap_or_default();

    let _ = rl.load_history(&history_path);

    loop {
        let prompt = format!("{}> ", "side-stub".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                let command = match ReplCommand::parse(line) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{} {}", "Error:".red(), e);
                        continue;
                    }
                };

                match repl.execute(command) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("{} {:#}", "Error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    repl.disconnect();
    let _ = rl.save_history(&history_path);
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Connection state behind the prompt
struct Repl {
    runtime: Runtime,
    session_config: SessionConfig,
    serial: SerialOptions,
    session: Option<Arc<Session>>,
    echo: Option<JoinHandle<()>>,
}

impl Repl {
    fn new(runtime: Runtime, session_config: SessionConfig, serial: SerialOptions) -> Self {
        Self {
            runtime,
            session_config,
            serial,
            session: None,
            echo: None,
        }
    }

    /// Run one command. Returns false when the user asked to quit.
    fn execute(&mut self, command: ReplCommand) -> Result<bool> {
        match command {
            ReplCommand::Connect { address } => self.connect(&address)?,
            ReplCommand::Registers { symbol } => {
                let session = self.session()?;
                let reply = self
                    .runtime
                    .block_on(session.tracepoint_get_registers(&symbol))?;
                print_reply(&reply);
            }
            ReplCommand::Memory { addr, length } => {
                let session = self.session()?;
                let data = self
                    .runtime
                    .block_on(session.tracepoint_get_memory(addr, length))?;
                print_memory(addr, &data);
            }
            ReplCommand::Arguments { function } => {
                let session = self.session()?;
                let reply = self
                    .runtime
                    .block_on(session.tracepoint_get_arguments(&function))?;
                print_reply(&reply);
            }
            ReplCommand::Send { body } => {
                let session = self.session()?;
                let packet = self.runtime.block_on(session.send_command(&body, ""))?;
                let text = packet.payload_lossy();
                if packet.verify() {
                    println!("{}", text);
                } else {
                    println!("{} {}", text, "(checksum mismatch)".yellow());
                }
            }
            ReplCommand::Stats => {
                let session = self.session()?;
                print_stats(&session.stats());
            }
            ReplCommand::Disconnect => {
                if self.session.is_none() {
                    println!("{}", "Not connected.".dimmed());
                }
                self.disconnect();
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Clear => print!("\x1B[2J\x1B[1;1H"),
            ReplCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn connect(&mut self, address: &str) -> Result<()> {
        self.disconnect();

        let session = self
            .runtime
            .block_on(Session::connect(address, self.session_config.clone(), &self.serial))
            .with_context(|| format!("Failed to connect to {}", address))?;
        let session = Arc::new(session);

        // Echo notifications as they arrive
        if let Some(mut notifications) = session.take_notifications() {
            self.echo = Some(self.runtime.spawn(async move {
                while let Some(packet) = notifications.recv().await {
                    println!("{} {}", "%".blue(), packet.payload_lossy().blue());
                }
            }));
        }

        self.session = Some(session);
        println!("{}", format!("Connected to {}", address).green());
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.runtime.block_on(session.disconnect()) {
                eprintln!("{} {}", "Error:".red(), e);
            }
            println!("{}", "Disconnected.".yellow());
        }
        if let Some(echo) = self.echo.take() {
            let _ = self
                .runtime
                .block_on(async { tokio::time::timeout(Duration::from_millis(500), echo).await });
        }
    }

    fn session(&self) -> Result<Arc<Session>> {
        match &self.session {
            Some(session) if session.is_connected() => Ok(session.clone()),
            Some(_) => anyhow::bail!("Connection lost. Use 'target remote <address>' to reconnect"),
            None => anyhow::bail!("Not connected. Use 'target remote <address>' first"),
        }
    }
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Ok => println!("{}", "OK".green()),
        Reply::Error(code) => println!("{}", format!("E{:02x}", code).red()),
        Reply::Unsupported => println!("{}", "(unsupported)".dimmed()),
        Reply::Data(data) => println!("{}", hex::encode(data).yellow()),
        Reply::Text(text) => println!("{}", text),
    }
}

fn print_memory(addr: u64, data: &[u8]) {
    if data.is_empty() {
        println!("{}", "(empty)".dimmed());
        return;
    }
    for (i, chunk) in data.chunks(16).enumerate() {
        let offset = addr.wrapping_add((i * 16) as u64);
        println!("{} {}", format!("{:#018x}:", offset).cyan(), hex::encode(chunk));
    }
}

fn print_stats(stats: &StatsSnapshot) {
    println!("commands sent    {}", stats.commands_sent);
    println!("replies          {}", stats.replies);
    println!("notifications    {}", stats.notifications);
    println!("acks sent        {}", stats.acks_sent);
    println!("dropped replies  {}", stats.dropped_replies);
    println!("timeouts         {}", stats.timeouts);
    println!("retransmits      {}", stats.retransmits);
    println!("framing errors   {}", stats.framing_errors);
}

fn print_banner() {
    println!(
        "{}",
        format!(
            "side-stub {} - type 'help' for commands, 'quit' to exit",
            env!("CARGO_PKG_VERSION")
        )
        .cyan()
    );
}

fn print_help() {
    println!(
        r#"
{}

{}
  target remote <address>                    Connect (serial path or tcp:<host>:<port>)
  disconnect                                 Close the connection

{}
  tracepoint-then-get-registers <symbol>     Registers when <symbol> is hit
  tracepoint-then-get-memory <addr> <len>    Memory when the tracepoint is hit
  tracepoint-then-get-arguments <function>   Call arguments of <function>
  send <packet-body>                         Send a raw packet and print the reply

{}
  stats                                      Session counters
  help                                       Show this help
  clear                                      Clear screen
  quit/exit                                  Exit CLI
"#,
        "side-stub Commands".cyan().bold(),
        "Connection".yellow().bold(),
        "Tracepoints".yellow().bold(),
        "Local".yellow().bold(),
    );
}

// Minimal dirs_next replacement for home directory
mod dirs_next {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
