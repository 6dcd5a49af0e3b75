//! Results Projector
//!
//! Read-only projections of poll state: the summary message, the voting
//! controls, the draft configuration view, the management list and view, and
//! the CSV export. Nothing here mutates a poll.

use super::draft::DraftSummary;
use super::poll::{Poll, PollId, UserId};
use serde::Serialize;
use std::fmt::Write;

/// Longest question prefix shown in the management list
const LIST_PREVIEW_CHARS: usize = 30;

/// Longest question prefix shown in a poll's management view
const MANAGE_PREVIEW_CHARS: usize = 50;

/// What pressing a control asks the engine to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ControlAction {
    Vote { poll_id: PollId, option: usize },
    VoteDone { poll_id: PollId },
    ToggleMultiChoice,
    ToggleAnonymous,
    Publish,
    ClosePoll { poll_id: PollId },
    ReopenPoll { poll_id: PollId },
    ExportPoll { poll_id: PollId },
    DeletePoll { poll_id: PollId },
    BackToList,
}

/// A pressable control attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub label: String,
    pub action: ControlAction,
    /// Whether the viewer currently holds this choice
    pub selected: bool,
}

impl Control {
    fn new(label: impl Into<String>, action: ControlAction) -> Self {
        Self {
            label: label.into(),
            action,
            selected: false,
        }
    }
}

/// A message ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub text: String,
    /// `None` means the message carries no controls at all
    pub controls: Option<Vec<Control>>,
}

impl RenderedMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: None,
        }
    }
}

/// Percentage of `count` in `total`, 0.0 when nothing has been cast
pub fn percentage(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(total) * 100.0
    }
}

/// Summary text of a poll as seen by `viewer`.
pub fn render_summary(poll: &Poll, viewer: Option<&UserId>) -> String {
    let total = poll.total_selections();
    let mut out = String::new();

    let mut badges = Vec::new();
    if poll.is_closed() {
        badges.push("[CLOSED]");
    }
    if poll.is_multi_choice() {
        badges.push("(multiple choice allowed)");
    }
    if poll.is_anonymous_results() {
        badges.push("(anonymous results)");
    }
    if !badges.is_empty() {
        out.push_str(&badges.join("\n"));
        out.push_str("\n\n");
    }

    let _ = write!(out, "{}\n\n", poll.question());

    let selections = viewer.map(|v| poll.selections_of(v)).unwrap_or(&[]);
    let reveal_quiz = poll.is_quiz() && poll.is_closed();

    for (i, option) in poll.options().iter().enumerate() {
        let count = poll.votes()[i];
        let _ = write!(
            out,
            "{} — {} votes ({:.1}%)",
            option,
            count,
            percentage(count, total)
        );

        let picked = selections.contains(&i);
        if picked && !poll.is_anonymous_results() {
            out.push_str(" [your choice]");
        }
        if reveal_quiz {
            if poll.correct_option() == Some(i) {
                out.push_str(" ✅ (correct answer)");
            } else if picked {
                out.push_str(" ❌ (incorrect)");
            }
        }
        out.push('\n');
    }

    if !poll.voters().is_empty() {
        let _ = write!(out, "\nParticipants: {}", poll.voters().len());
    }

    out
}

/// Voting controls for `viewer`, or `None` once the poll is closed.
pub fn render_voting_controls(poll: &Poll, viewer: Option<&UserId>) -> Option<Vec<Control>> {
    if poll.is_closed() {
        return None;
    }

    let selections = viewer.map(|v| poll.selections_of(v)).unwrap_or(&[]);
    let mut controls: Vec<Control> = poll
        .options()
        .iter()
        .enumerate()
        .map(|(i, option)| {
            let selected = poll.is_multi_choice() && selections.contains(&i);
            let label = if selected {
                format!("✅ {}", option)
            } else {
                option.clone()
            };
            Control {
                label,
                action: ControlAction::Vote {
                    poll_id: poll.id().clone(),
                    option: i,
                },
                selected,
            }
        })
        .collect();

    if poll.is_multi_choice() && !selections.is_empty() {
        controls.push(Control::new(
            "🗳️ Done voting / show results",
            ControlAction::VoteDone {
                poll_id: poll.id().clone(),
            },
        ));
    }

    Some(controls)
}

/// Summary plus voting controls in one message
pub fn render_message(poll: &Poll, viewer: Option<&UserId>) -> RenderedMessage {
    RenderedMessage {
        text: render_summary(poll, viewer),
        controls: render_voting_controls(poll, viewer),
    }
}

/// Prompt sent when a creator starts a draft
pub fn render_draft_prompt(is_quiz: bool) -> RenderedMessage {
    let (title, example) = if is_quiz {
        (
            "QUIZ",
            "Capital of France?\nParis\nLondon\nBerlin",
        )
    } else {
        ("POLL", "Which flavour is best?\nChocolate\nVanilla\nStrawberry")
    };
    let mut text = format!(
        "{} creation\n\nSend the question, then each answer option on its own line.\n",
        title
    );
    if is_quiz {
        text.push_str("(For quizzes the first option is the correct answer.)\n");
    }
    let _ = write!(text, "\nExample:\n{}\n\nUse /cancel to stop.", example);
    RenderedMessage::text(text)
}

/// Configuration view of a staged draft with its toggle controls
pub fn render_draft(summary: &DraftSummary) -> RenderedMessage {
    let mut controls = Vec::new();
    if !summary.is_quiz {
        let label = if summary.is_multi_choice {
            "✅ Multiple choice"
        } else {
            "❌ Single choice"
        };
        let mut control = Control::new(label, ControlAction::ToggleMultiChoice);
        control.selected = summary.is_multi_choice;
        controls.push(control);
    }

    let label = if summary.is_anonymous_results {
        "✅ Anonymous results"
    } else {
        "❌ Public results"
    };
    let mut control = Control::new(label, ControlAction::ToggleAnonymous);
    control.selected = summary.is_anonymous_results;
    controls.push(control);
    controls.push(Control::new("🚀 Publish", ControlAction::Publish));

    let kind = if summary.is_quiz { "quiz" } else { "poll" };
    let mut text = format!(
        "Configuration\n\nChoose the options for your {} before publishing:\n\n{}\n",
        kind, summary.question
    );
    for option in &summary.options {
        let _ = writeln!(text, "- {}", option);
    }

    RenderedMessage {
        text,
        controls: Some(controls),
    }
}

/// Management list of a creator's polls, one line per poll
pub fn render_poll_list(polls: &[Poll]) -> String {
    if polls.is_empty() {
        return "You have no polls to manage.".to_string();
    }

    let mut out = String::from("Select a poll to manage:\n");
    for poll in polls {
        let status = if poll.is_closed() { "CLOSED" } else { "OPEN" };
        let kind = if poll.is_quiz() { "QUIZ" } else { "POLL" };
        let _ = write!(
            out,
            "\n[{} {}] {} ({})",
            status,
            kind,
            question_preview(poll.question(), LIST_PREVIEW_CHARS),
            poll.id()
        );
    }
    out
}

/// Management view of one poll: status plus the creator's controls
pub fn render_manage_view(poll: &Poll) -> RenderedMessage {
    let status = if poll.is_closed() { "CLOSED" } else { "OPEN" };
    let text = format!(
        "Manage: {}\nStatus: {}",
        question_preview(poll.question(), MANAGE_PREVIEW_CHARS),
        status
    );

    let poll_id = poll.id().clone();
    let toggle = if poll.is_closed() {
        Control::new(
            "🔓 Reopen poll",
            ControlAction::ReopenPoll {
                poll_id: poll_id.clone(),
            },
        )
    } else {
        Control::new(
            "🔒 Close poll",
            ControlAction::ClosePoll {
                poll_id: poll_id.clone(),
            },
        )
    };
    let controls = vec![
        toggle,
        Control::new(
            "📊 Export CSV",
            ControlAction::ExportPoll {
                poll_id: poll_id.clone(),
            },
        ),
        Control::new("🗑️ Delete poll", ControlAction::DeletePoll { poll_id }),
        Control::new("⬅️ Back to list", ControlAction::BackToList),
    ];

    RenderedMessage {
        text,
        controls: Some(controls),
    }
}

/// File name an export of `poll_id` is offered under
pub fn export_file_name(poll_id: &PollId) -> String {
    format!("poll_results_{}.csv", poll_id)
}

/// Text a deleted poll's message is replaced with
pub fn render_deleted_notice() -> RenderedMessage {
    RenderedMessage::text("[DELETED] This poll was permanently removed by its creator.")
}

fn question_preview(question: &str, limit: usize) -> String {
    if question.chars().count() > limit {
        let cut: String = question.chars().take(limit).collect();
        format!("{}...", cut)
    } else {
        question.to_string()
    }
}

/// Export the results as CSV.
///
/// The first table has one row per option. Attributed polls get a second
/// table of voters and their choices; anonymous polls never do.
pub fn export_csv(poll: &Poll) -> String {
    let total = poll.total_selections();
    let mut out = String::new();

    let mut header = vec!["Option", "Votes", "Percentage"];
    if poll.is_quiz() {
        header.push("Correct");
    }
    write_row(&mut out, header);

    for (i, option) in poll.options().iter().enumerate() {
        let count = poll.votes()[i];
        let mut row = vec![
            option.clone(),
            count.to_string(),
            format!("{:.1}%", percentage(count, total)),
        ];
        if poll.is_quiz() {
            let correct = if poll.correct_option() == Some(i) { "Yes" } else { "No" };
            row.push(correct.to_string());
        }
        write_row(&mut out, row);
    }

    if !poll.is_anonymous_results() {
        out.push_str("\r\n");
        write_row(&mut out, ["Voter", "Selected options"]);
        for (voter, choices) in poll.voters() {
            let names = choices
                .iter()
                .filter_map(|&i| poll.options().get(i).map(String::as_str))
                .collect::<Vec<_>>()
                .join(", ");
            write_row(&mut out, [voter.to_string(), names]);
        }
    }

    out
}

fn write_row<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = fields
        .into_iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// Quote a field only when it contains a delimiter, quote or line break
fn csv_field(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
