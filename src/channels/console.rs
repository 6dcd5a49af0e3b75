//! Console Channel
//!
//! A local stand-in for a chat platform: rendered messages are written to a
//! terminal and slash commands typed on stdin are mapped onto the poll
//! service. Every control is printed next to the command that presses it.

use super::transport::{Transport, TransportError, TransportResult};
use crate::polls::{
    render, ChatId, ControlAction, DraftToggle, MessageRef, PollError, PollId, PollService,
    RenderedMessage, UserId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Transport that writes messages to a terminal
pub struct ConsoleTransport {
    out: Mutex<Box<dyn Write + Send>>,
    next_message_id: AtomicU64,
}

impl ConsoleTransport {
    /// Write to stdout
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            next_message_id: AtomicU64::new(0),
        }
    }

    fn emit(&self, header: &str, message: &RenderedMessage) -> std::io::Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{}\n{}", header, format_message(message))?;
        out.flush()
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_message(
        &self,
        chat_id: &ChatId,
        message: &RenderedMessage,
    ) -> TransportResult<MessageRef> {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(&format!("── message #{} to {} ──", id, chat_id), message)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(MessageRef {
            chat_id: chat_id.clone(),
            message_id: id.to_string(),
        })
    }

    async fn edit_message(
        &self,
        target: &MessageRef,
        message: &RenderedMessage,
    ) -> TransportResult<()> {
        self.emit(
            &format!("── message #{} edited ──", target.message_id),
            message,
        )
        .map_err(|e| TransportError::EditFailed(e.to_string()))
    }

    async fn answer_callback(&self, _callback_id: &str, text: &str) -> TransportResult<()> {
        let mut out = self.out.lock();
        writeln!(out, "» {}", text).map_err(|e| TransportError::Other(e.to_string()))
    }
}

/// Text of a message followed by its controls
pub fn format_message(message: &RenderedMessage) -> String {
    let mut text = message.text.trim_end().to_string();
    if let Some(controls) = &message.controls {
        text.push('\n');
        for control in controls {
            text.push_str(&format!("\n  {:<40} {}", control.label, command_for(&control.action)));
        }
    }
    text
}

/// The console command that presses a control
pub fn command_for(action: &ControlAction) -> String {
    match action {
        ControlAction::Vote { poll_id, option } => format!("/vote {} {}", poll_id, option),
        ControlAction::VoteDone { poll_id } => format!("/done {}", poll_id),
        ControlAction::ToggleMultiChoice => "/multi".to_string(),
        ControlAction::ToggleAnonymous => "/anon".to_string(),
        ControlAction::Publish => "/publish".to_string(),
        ControlAction::ClosePoll { poll_id } => format!("/close {}", poll_id),
        ControlAction::ReopenPoll { poll_id } => format!("/reopen {}", poll_id),
        ControlAction::ExportPoll { poll_id } => format!("/export {}", poll_id),
        ControlAction::DeletePoll { poll_id } => format!("/delete {}", poll_id),
        ControlAction::BackToList => "/mine".to_string(),
    }
}

/// A line typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    CreatePoll,
    CreateQuiz,
    Cancel,
    Toggle(DraftToggle),
    Publish,
    Vote { poll_id: PollId, option: usize },
    Done(PollId),
    Manage(PollId),
    Close(PollId),
    Reopen(PollId),
    Export(PollId),
    Delete(PollId),
    Mine,
    Stats,
    SwitchUser(UserId),
    Quit,
    /// Anything that is not a command: draft text
    Text(String),
}

impl ConsoleCommand {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Self, String> {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Ok(ConsoleCommand::Text(line.to_string()));
        }

        let mut parts = trimmed.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        let poll_arg = |cmd: &str| {
            arg.map(PollId::from)
                .ok_or_else(|| format!("usage: {} <poll-id>", cmd))
        };

        let command = match name {
            "/help" | "/start" => ConsoleCommand::Help,
            "/poll" | "/create_poll" => ConsoleCommand::CreatePoll,
            "/quiz" | "/create_quiz" => ConsoleCommand::CreateQuiz,
            "/cancel" => ConsoleCommand::Cancel,
            "/multi" => ConsoleCommand::Toggle(DraftToggle::MultiChoice),
            "/anon" => ConsoleCommand::Toggle(DraftToggle::Anonymous),
            "/publish" => ConsoleCommand::Publish,
            "/vote" => {
                let usage = || "usage: /vote <poll-id> <option>".to_string();
                let poll_id = arg.map(PollId::from).ok_or_else(usage)?;
                let option = parts
                    .next()
                    .and_then(|o| o.parse::<usize>().ok())
                    .ok_or_else(usage)?;
                ConsoleCommand::Vote { poll_id, option }
            }
            "/done" => ConsoleCommand::Done(poll_arg(name)?),
            "/manage" => ConsoleCommand::Manage(poll_arg(name)?),
            "/close" => ConsoleCommand::Close(poll_arg(name)?),
            "/reopen" | "/open" => ConsoleCommand::Reopen(poll_arg(name)?),
            "/export" => ConsoleCommand::Export(poll_arg(name)?),
            "/delete" => ConsoleCommand::Delete(poll_arg(name)?),
            "/mine" | "/manage_polls" => ConsoleCommand::Mine,
            "/stats" => ConsoleCommand::Stats,
            "/as" => ConsoleCommand::SwitchUser(
                arg.map(UserId::from)
                    .ok_or_else(|| "usage: /as <user-id>".to_string())?,
            ),
            "/quit" | "/exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command {}", other)),
        };
        Ok(command)
    }
}

const HELP: &str = "\
Commands:
  /poll, /quiz          start a poll or quiz draft, then type the question and
                        options one per line and finish with an empty line
  /multi, /anon         toggle draft options
  /publish, /cancel     publish or drop the draft
  /vote <id> <n>        vote for option n
  /done <id>            finish a multi-choice vote
  /mine                 list your polls
  /manage <id>          show one of your polls with its management commands
  /close <id>, /reopen <id>, /export <id>, /delete <id>
  /stats                registry statistics
  /as <user>            act as another user
  /quit";

/// Drive `service` from stdin until EOF or `/quit`.
pub async fn run_console(
    service: &PollService,
    mut user: UserId,
    chat: ChatId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_text: Vec<String> = Vec::new();

    println!("{}", HELP);
    info!(user = %user, chat = %chat, "console session started");

    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{}", usage);
                continue;
            }
        };

        match command {
            ConsoleCommand::Text(text) => {
                if !text.trim().is_empty() {
                    pending_text.push(text);
                    continue;
                }
                if pending_text.is_empty() {
                    continue;
                }
                let raw = pending_text.join("\n");
                pending_text.clear();
                match service.submit_draft_text(&user, &raw) {
                    Ok(summary) => println!("{}", format_message(&render::render_draft(&summary))),
                    Err(e) => println!("{}", e),
                }
            }
            ConsoleCommand::Quit => break,
            command => {
                if let ConsoleCommand::SwitchUser(next) = &command {
                    user = next.clone();
                    println!("now acting as {}", user);
                    continue;
                }
                if let Err(e) = dispatch(service, &user, &chat, command).await {
                    println!("{}", e);
                }
            }
        }
    }

    debug!("console input closed");
    Ok(())
}

async fn dispatch(
    service: &PollService,
    user: &UserId,
    chat: &ChatId,
    command: ConsoleCommand,
) -> Result<(), PollError> {
    match command {
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::CreatePoll => {
            println!("{}", format_message(&service.start_draft(user, chat, false)?));
        }
        ConsoleCommand::CreateQuiz => {
            println!("{}", format_message(&service.start_draft(user, chat, true)?));
        }
        ConsoleCommand::Cancel => {
            if service.cancel_draft(user) {
                println!("Creation cancelled.");
            } else {
                println!("You are not creating a poll.");
            }
        }
        ConsoleCommand::Toggle(toggle) => {
            let summary = service.toggle_draft_option(user, toggle)?;
            println!("{}", format_message(&render::render_draft(&summary)));
        }
        ConsoleCommand::Publish => {
            let (poll_id, _) = service.publish_draft(user).await?;
            println!("Published {}. Use /mine to manage it.", poll_id);
        }
        ConsoleCommand::Vote { poll_id, option } => {
            service.vote(&poll_id, user, option, Some("console")).await?;
        }
        ConsoleCommand::Done(poll_id) => {
            service.vote_done(&poll_id, user, Some("console")).await?;
        }
        ConsoleCommand::Manage(poll_id) => {
            println!("{}", format_message(&service.manage_view(&poll_id, user)?));
        }
        ConsoleCommand::Close(poll_id) => {
            service.close_poll(&poll_id, user).await?;
            println!("Poll closed.");
        }
        ConsoleCommand::Reopen(poll_id) => {
            service.reopen_poll(&poll_id, user).await?;
            println!("Poll reopened.");
        }
        ConsoleCommand::Export(poll_id) => {
            let csv = service.export_poll(&poll_id, user)?;
            println!("── {} ──", render::export_file_name(&poll_id));
            println!("{}", String::from_utf8_lossy(&csv));
        }
        ConsoleCommand::Delete(poll_id) => {
            service.delete_poll(&poll_id, user).await?;
            println!("Poll deleted.");
        }
        ConsoleCommand::Mine => println!("{}", render::render_poll_list(&service.list_polls(user))),
        ConsoleCommand::Stats => println!("{:#?}", service.stats()),
        ConsoleCommand::SwitchUser(_) | ConsoleCommand::Quit | ConsoleCommand::Text(_) => {}
    }
    Ok(())
}
