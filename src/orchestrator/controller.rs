//! View lifecycle controller.
//!
//! Applies UI commands to a mounted tool view and emits an event for every
//! settled pipeline state, for presentation layers to render.

use super::{LineDriven, ToolView};
use crate::model::PipelineState;
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

/// Commands emitted by UI layers to drive a tool view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Plain input line.
    Line(String),
    /// Switch mode by name (`encode`, `decode`, ...).
    Mode(String),
    Set { key: String, value: String },
    /// Reset the input to its empty default.
    Clear,
    Refresh,
    /// Unrecognized `:command`.
    Unknown(String),
    Quit,
}

/// Parse one line of the line protocol.
///
/// Lines starting with `:` are commands; `::` escapes a literal leading colon.
pub fn parse_command(line: &str) -> UiCommand {
    if let Some(rest) = line.strip_prefix("::") {
        return UiCommand::Line(format!(":{rest}"));
    }
    let Some(cmd) = line.strip_prefix(':') else {
        return UiCommand::Line(line.to_string());
    };
    let cmd = cmd.trim();
    let (name, arg) = match cmd.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim_start()),
        None => (cmd, ""),
    };
    match name {
        "q" | "quit" | "exit" => UiCommand::Quit,
        "encode" | "decode" => UiCommand::Mode(name.to_string()),
        "mode" if !arg.is_empty() => UiCommand::Mode(arg.to_string()),
        "clear" => UiCommand::Clear,
        "refresh" | "regen" => UiCommand::Refresh,
        "set" => match arg.split_once(char::is_whitespace) {
            Some((key, value)) => UiCommand::Set {
                key: key.to_string(),
                value: value.trim_start().to_string(),
            },
            None => UiCommand::Unknown(cmd.to_string()),
        },
        _ => UiCommand::Unknown(cmd.to_string()),
    }
}

/// Events emitted to presentation layers.
pub enum ViewEvent<T: LineDriven> {
    /// A pipeline state with no request outstanding.
    Settled(PipelineState<T>),
    Message(String),
}

/// Drive `view` from `cmd_rx` until quit, emitting events on `event_tx`.
///
/// Quit waits for the outstanding request, if any, so its result is still reported.
pub async fn run_view<T: LineDriven>(
    view: ToolView<T>,
    event_tx: UnboundedSender<ViewEvent<T>>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut snapshots = view.controller().subscribe();
    let mut last_reported = 0u64;
    let mut quit_pending = false;

    // The restored state may already have settled before we subscribed.
    {
        let snap = snapshots.borrow_and_update().clone();
        if !snap.loading {
            last_reported = snap.request_id;
            if !snap.output.is_empty() {
                let _ = event_tx.send(ViewEvent::Settled(snap));
            }
        }
    }

    loop {
        tokio::select! {
            biased;

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                if report_settled(&mut snapshots, &mut last_reported, &event_tx) && quit_pending {
                    break;
                }
            }
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        // A result committed after the last `changed` wakeup is flushed here.
                        if report_settled(&mut snapshots, &mut last_reported, &event_tx) {
                            break;
                        }
                        let _ = event_tx.send(ViewEvent::Message("Waiting for pending result…".into()));
                    }
                    Some(cmd) => {
                        if let Some(msg) = apply_command(&view, cmd) {
                            let _ = event_tx.send(ViewEvent::Message(msg));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Emit the latest snapshot if it has settled and is not reported yet.
///
/// Returns whether the latest snapshot has settled.
fn report_settled<T: LineDriven>(
    snapshots: &mut watch::Receiver<PipelineState<T>>,
    last_reported: &mut u64,
    event_tx: &UnboundedSender<ViewEvent<T>>,
) -> bool {
    let snap = snapshots.borrow_and_update().clone();
    if snap.loading {
        return false;
    }
    if snap.request_id != *last_reported {
        *last_reported = snap.request_id;
        let _ = event_tx.send(ViewEvent::Settled(snap));
    }
    true
}

/// Apply one command; returns a message for the user when there is something to say.
fn apply_command<T: LineDriven>(view: &ToolView<T>, cmd: UiCommand) -> Option<String> {
    match cmd {
        UiCommand::Line(line) => view
            .edit(|input, params| T::apply_line(input, params, &line))
            .err()
            .map(|e| format!("{e:#}")),
        UiCommand::Mode(word) => match T::parse_mode(&word) {
            Some(mode) => {
                view.set_mode(mode);
                Some(format!("Mode: {word}"))
            }
            None => Some(format!("{} has no mode {word:?}", T::ROUTE)),
        },
        UiCommand::Set { key, value } => view
            .edit(|input, params| T::apply_setting(input, params, &key, &value))
            .err()
            .map(|e| format!("{e:#}")),
        UiCommand::Clear => {
            view.set_input(T::Input::default());
            None
        }
        UiCommand::Refresh => {
            view.refresh();
            None
        }
        UiCommand::Unknown(cmd) => Some(format!("Unknown command: :{cmd}")),
        // Handled by the caller.
        UiCommand::Quit => None,
    }
}
