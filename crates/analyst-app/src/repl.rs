//! Terminal chat loop over a `ChatController`.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use analyst_chat::{ChatController, ChatError, RecordingToggle, Submission};
use analyst_core::error::AnalystError;
use analyst_core::types::{Message, MessageKind};

const HELP: &str = "\
Type a question and press Enter. Commands:
  /record    start or stop recording (uses --recording as the microphone)
  /replay    play the last reply audio again
  /pick N    send recommendation N
  /history   show the backend's conversation history
  /end       end the session
  /quit      end the session and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Text(String),
    Record,
    Replay,
    Pick(usize),
    History,
    End,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(ReplCommand::Text(line.to_string()));
    };

    let mut words = rest.split_whitespace();
    let command = match words.next().unwrap_or_default() {
        "record" | "rec" => ReplCommand::Record,
        "replay" => ReplCommand::Replay,
        "pick" => {
            let n = words
                .next()
                .and_then(|w| w.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| "usage: /pick N (N starts at 1)".to_string())?;
            ReplCommand::Pick(n - 1)
        }
        "history" => ReplCommand::History,
        "end" => ReplCommand::End,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command /{}, try /help", other)),
    };
    Ok(command)
}

fn render_message(message: &Message) -> String {
    let who = match (message.kind, message.is_audio, message.is_error) {
        (MessageKind::User, true, _) => "you (voice)",
        (MessageKind::User, false, _) => "you",
        (MessageKind::Ai, _, true) => "analyst (error)",
        (MessageKind::Ai, _, false) => "analyst",
    };
    let mut line = format!("{}: {}", who, message.content);
    if let Some(ref language) = message.original_language {
        line.push_str(&format!(" [{}]", language));
    }
    if message.has_audio {
        line.push_str(" (audio)");
    }
    line
}

/// Print messages appended since `printed`, then the current recommendations
/// if anything new arrived. Returns the new high-water mark.
fn render_new(controller: &ChatController, printed: usize) -> usize {
    let messages = controller.messages();
    for message in &messages[printed.min(messages.len())..] {
        println!("{}", render_message(message));
    }
    if messages.len() > printed && !controller.recommendations().is_empty() {
        println!("suggestions:");
        for (i, recommendation) in controller.recommendations().iter().enumerate() {
            println!("  {}. {}", i + 1, recommendation);
        }
    }
    messages.len()
}

/// Report an error unless it already produced an error message in the chat.
fn report(err: &ChatError) {
    if !matches!(err, ChatError::Backend(_)) {
        eprintln!("! {}", err);
    }
}

fn report_submission(result: Result<Submission, ChatError>) {
    match result {
        Ok(Submission::Sent) => {}
        Ok(Submission::Ignored) => eprintln!("! nothing sent (empty input or no active session)"),
        Err(e) => report(&e),
    }
}

async fn prompt(recording: bool) -> Result<(), AnalystError> {
    let mut stdout = tokio::io::stdout();
    let marker = if recording { "rec> " } else { "> " };
    stdout.write_all(marker.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Run the chat until `/quit` or end of input.
pub async fn run(controller: &mut ChatController) -> Result<(), AnalystError> {
    if let Err(e) = controller.start_session().await {
        warn!(error = %e, "Chat started without a session");
    }
    let mut printed = render_new(controller, 0);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(controller.is_recording()).await?;

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Err(usage) => eprintln!("! {}", usage),
            Ok(ReplCommand::Quit) => break,
            Ok(ReplCommand::Help) => println!("{}", HELP),
            Ok(ReplCommand::Text(text)) => {
                controller.set_input(text);
                report_submission(controller.submit_input().await);
            }
            Ok(ReplCommand::Pick(index)) => {
                report_submission(controller.apply_recommendation(index).await);
            }
            Ok(ReplCommand::Record) => match controller.toggle_recording().await {
                Ok(RecordingToggle::Started) => println!("recording... /record again to send"),
                Ok(RecordingToggle::Stopped(outcome)) => report_submission(Ok(outcome)),
                Err(e) => report(&e),
            },
            Ok(ReplCommand::Replay) => {
                if let Err(e) = controller.replay_last_audio() {
                    report(&e);
                }
            }
            Ok(ReplCommand::History) => match controller.conversation_history().await {
                Ok(history) => {
                    for turn in history.history {
                        println!("[{}] you: {}", turn.timestamp, turn.user);
                        println!("[{}] analyst: {}", turn.timestamp, turn.bot);
                    }
                }
                Err(e) => eprintln!("! {}", e),
            },
            Ok(ReplCommand::End) => match controller.end_session().await {
                Ok(()) => println!("session ended"),
                Err(e) => report(&e),
            },
        }

        printed = render_new(controller, printed);
        prompt(controller.is_recording()).await?;
    }

    if controller.session().is_some_and(|s| s.is_active()) {
        if let Err(e) = controller.end_session().await {
            warn!(error = %e, "Failed to end session on exit");
        }
    }
    Ok(())
}
