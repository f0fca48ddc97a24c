//! Commandeer console host.
//!
//! Reads command lines from stdin and routes them through an in-memory host
//! command table to the dispatch engine.

mod demo;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, warn};

use commandeer::bridge::{CommandLine, CommandTable};
use commandeer::commands::{
    CommandDescriptor, CommandSender, Dispatcher, ErrorReporter, HandlerFailure, Invocation,
    Rejection, RejectionNotifier, StaticSender,
};
use commandeer::config::Settings;
use commandeer::{logging, EngineError};

use crate::demo::ServerCommands;

/// Console labels handled by the host itself.
const BUILTINS: [&str; 4] = ["help", "complete", "exit", "quit"];

#[derive(Debug, Parser)]
#[command(name = "commandeer", version, about = "Console host for the command engine")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Issue commands as this player instead of the console
    #[arg(short, long, value_name = "NAME")]
    player: Option<String>,

    /// Grant a permission to the player (repeatable)
    #[arg(long = "permission", value_name = "NODE")]
    permissions: Vec<String>,

    /// Log to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,

    /// Exit if any command fails to register
    #[arg(long)]
    strict: bool,
}

/// Tells the sender why a command was refused.
struct ConsoleNotifier;

impl RejectionNotifier for ConsoleNotifier {
    fn notify(
        &self,
        _invocation: &Invocation,
        descriptor: Option<&CommandDescriptor>,
        rejection: &Rejection,
    ) {
        println!("{}", rejection);
        if let Some(descriptor) = descriptor {
            if rejection.shows_usage() && !descriptor.usage.is_empty() {
                println!("Usage: {}", descriptor.usage);
            }
        }
    }
}

/// Prints handler failures alongside logging them.
struct ConsoleReporter;

impl ErrorReporter for ConsoleReporter {
    fn report(&self, invocation: &Invocation, failure: &HandlerFailure) {
        if failure.is_completed() {
            warn!(command = invocation.command(), "{}", failure);
            return;
        }
        error!(command = invocation.command(), "{}", failure);
        eprintln!("An error occurred while running /{}: {}", invocation.label(), failure);
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn run() -> commandeer::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    logging::init(&settings.logging, cli.log_stderr).map_err(|e| EngineError::other(e.to_string()))?;

    let mut dispatcher = Dispatcher::builder()
        .settings(settings)
        .notifier(Arc::new(ConsoleNotifier))
        .reporter(Arc::new(ConsoleReporter))
        .fallback(|inv| {
            println!("Unknown command '{}'. Type \"help\" for help.", inv.label());
            true
        })
        .build();

    let mut table = CommandTable::with_reserved(BUILTINS);
    let report = dispatcher.register_handlers(Arc::new(ServerCommands::new()), &mut table);
    println!("{}", report);
    if cli.strict {
        report.into_result()?;
    } else {
        for failure in &report.failures {
            eprintln!("warning: {}", failure);
        }
    }

    let sender: Arc<dyn CommandSender> = match &cli.player {
        Some(name) => Arc::new(StaticSender::player(name).with_permissions(cli.permissions.iter())),
        None => Arc::new(StaticSender::console()),
    };

    let result = console_loop(&dispatcher, &table, sender);
    logging::shutdown();
    result
}

fn console_loop(
    dispatcher: &Dispatcher,
    table: &CommandTable,
    sender: Arc<dyn CommandSender>,
) -> commandeer::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}> ", sender.name());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end_matches(['\r', '\n']);

        let Some(parsed) = CommandLine::parse(line) else {
            continue;
        };
        match parsed.label.to_lowercase().as_str() {
            "exit" | "quit" => return Ok(()),
            "help" => print_help(table),
            "complete" => {
                let partial = line
                    .trim_start()
                    .split_once(char::is_whitespace)
                    .map(|(_, rest)| rest.trim_start())
                    .unwrap_or("");
                let suggestions = table.complete(dispatcher, Arc::clone(&sender), partial);
                println!("{}", suggestions.join("  "));
            }
            _ => {
                if !table.execute(dispatcher, Arc::clone(&sender), line) {
                    dispatcher.on_command(
                        Arc::clone(&sender),
                        &parsed.label,
                        &parsed.label,
                        parsed.args,
                    );
                }
            }
        }
    }
}

fn print_help(table: &CommandTable) {
    for entry in table.entries() {
        let usage = if entry.usage.is_empty() {
            format!("/{}", entry.name)
        } else {
            entry.usage.clone()
        };
        println!("{:<28} {}", usage, entry.description);
    }
    println!("{:<28} {}", "complete <partial line>", "Show tab completions");
    println!("{:<28} {}", "exit", "Leave the console");
}
