//! Command-line interface and REPL
//!
//! Drives widgets through a [`HubHandle`] the way a user interface would:
//! `set` is a user edit, `force` a programmatic override.

use anyhow::{bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::hub::{HubHandle, WidgetSnapshot};
use crate::mvc::PartialState;

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// User edit through the widget's view
    Set { widget: String, edit: PartialState },
    /// Override without negotiation
    Force { widget: String, state: PartialState },
    Read {
        widget: String,
        param: Option<String>,
        force_view_update: bool,
    },
    Clear { widget: String },
    Show { widget: Option<String> },
    Help,
    Quit,
    Empty,
}

const HELP: &str = "\
  set <widget> <param>=<value>...     user edit (value is JSON, bare words are strings)
  force <widget> <param>=<value>...   override state without writing the model
  read <widget> [param] [--negotiate] read from the model (whole document if no param)
  clear <widget>                      reset the widget's transaction
  show [widget]                       print widget state
  help                                this text
  quit                                exit";

/// Parse one REPL line
pub fn parse_command(line: &str) -> Result<ReplCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(ReplCommand::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let widget = |usage: &str| -> Result<String> {
        rest.first()
            .map(|w| w.to_string())
            .with_context(|| format!("usage: {}", usage))
    };

    let cmd = match verb {
        "set" => ReplCommand::Set {
            widget: widget("set <widget> <param>=<value>...")?,
            edit: parse_assignments(&rest[1..])?,
        },
        "force" => ReplCommand::Force {
            widget: widget("force <widget> <param>=<value>...")?,
            state: parse_assignments(&rest[1..])?,
        },
        "read" => {
            let widget = widget("read <widget> [param] [--negotiate]")?;
            let negotiate = rest.contains(&"--negotiate");
            let param = rest[1..]
                .iter()
                .find(|w| !w.starts_with("--"))
                .map(|p| p.to_string());
            ReplCommand::Read {
                widget,
                param,
                force_view_update: !negotiate,
            }
        }
        "clear" => ReplCommand::Clear {
            widget: widget("clear <widget>")?,
        },
        "show" | "ls" => ReplCommand::Show {
            widget: rest.first().map(|w| w.to_string()),
        },
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => bail!("unknown command '{}' (try 'help')", other),
    };

    Ok(cmd)
}

fn parse_assignments(words: &[&str]) -> Result<PartialState> {
    if words.is_empty() {
        bail!("expected at least one <param>=<value>");
    }

    let mut state = PartialState::new();
    for word in words {
        let (param, raw) = word
            .split_once('=')
            .with_context(|| format!("expected <param>=<value>, got '{}'", word))?;
        if param.is_empty() {
            bail!("empty parameter name in '{}'", word);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        state.insert(param.to_string(), value);
    }
    Ok(state)
}

/// Run the REPL until `quit` or end of input
pub async fn run_repl(hub: HubHandle) -> Result<()> {
    let runtime = Handle::current();
    tokio::task::spawn_blocking(move || repl_loop(hub, runtime))
        .await
        .context("REPL task panicked")?
}

fn repl_loop(hub: HubHandle, runtime: Handle) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "Type 'help' for commands".dimmed());

    loop {
        let line = match rl.readline("widgets> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = rl.add_history_entry(line.as_str());

        let cmd = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{} {:#}", "error:".red(), e);
                continue;
            }
        };

        if cmd == ReplCommand::Quit {
            break;
        }
        if !hub.is_alive() {
            println!("{}", "hub has stopped".red());
            break;
        }

        if let Err(e) = runtime.block_on(execute(&hub, cmd)) {
            println!("{} {:#}", "error:".red(), e);
        }
    }

    Ok(())
}

async fn execute(hub: &HubHandle, cmd: ReplCommand) -> Result<()> {
    match cmd {
        ReplCommand::Set { widget, edit } => {
            if hub.user_input(&widget, edit).await? {
                println!("  {}", "sent".green());
            } else {
                println!("  {}", "dropped: transaction pending".yellow());
            }
        }
        ReplCommand::Force { widget, state } => {
            if !hub.force_set(&widget, state).await? {
                println!("  {}", "unchanged".dimmed());
            }
        }
        ReplCommand::Read {
            widget,
            param,
            force_view_update,
        } => hub.read(&widget, param, force_view_update).await?,
        ReplCommand::Clear { widget } => hub.clear_transaction(&widget).await?,
        ReplCommand::Show { widget: Some(widget) } => print_snapshot(&hub.snapshot(&widget).await?),
        ReplCommand::Show { widget: None } => {
            for snapshot in hub.list_widgets().await? {
                print_snapshot(&snapshot);
            }
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit | ReplCommand::Empty => {}
    }
    Ok(())
}

fn print_snapshot(snapshot: &WidgetSnapshot) {
    let tx = match snapshot.transaction {
        "idle" => snapshot.transaction.green(),
        "pending" => snapshot.transaction.yellow(),
        _ => snapshot.transaction.red(),
    };
    println!(
        "  {} [{}] models={} state={} shadow={}",
        snapshot.name.bright_white().bold(),
        tx,
        snapshot.models.join(",").cyan(),
        snapshot.state,
        snapshot.shadow.to_string().dimmed()
    );
}
