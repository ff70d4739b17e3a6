//! Hydrolix Assistant - terminal client
//!
//! Every line typed is sent to the assistant along with the current editor
//! query. Slash commands manage the query and the conversation.

use hdx_assistant::client::{AssistantError, HttpFetch, LoggingFetch};
use hdx_assistant::config::AssistantConfig;
use hdx_assistant::context::ConversationContext;
use hdx_assistant::conversation::TurnOutcome;
use hdx_assistant::markdown;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
/query <sql>  set the editor query sent with each message
/apply        use the first SQL block of the last reply as the query
/thread       show the assistant thread id
/dismiss      hide the current error
/reset        start over with a new conversation
/quit         exit
Ctrl-C interrupts a pending reply.";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Ask(&'a str),
    Query(&'a str),
    Apply,
    Thread,
    Dismiss,
    Reset,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return if line.is_empty() {
            Command::Empty
        } else {
            Command::Ask(line)
        };
    };

    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    match name {
        "query" => Command::Query(arg.trim()),
        "apply" => Command::Apply,
        "thread" => Command::Thread,
        "dismiss" => Command::Dismiss,
        "reset" => Command::Reset,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(name),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with replies
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hdx_assistant=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AssistantConfig::from_env()?;
    tracing::info!(base_url = %config.resolve_base_url()?, "Assistant configured");

    let fetch = Arc::new(LoggingFetch::new(Arc::new(HttpFetch::new(&config)?)));
    let context = ConversationContext::new(fetch);

    let mut query = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Hydrolix Assistant. Type /help for commands.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Command::Ask(text) => {
                let turn = context.send_user_message(text, &query);
                tokio::pin!(turn);
                let result = tokio::select! {
                    result = &mut turn => result,
                    _ = tokio::signal::ctrl_c() => {
                        context.interrupt();
                        turn.await
                    }
                };
                print_outcome(&context, &result);
            }
            Command::Query(sql) => {
                query = sql.to_string();
                println!("Query set.");
            }
            Command::Apply => {
                let suggestion = context
                    .snapshot()
                    .last_reply()
                    .and_then(|reply| markdown::applicable_queries(&reply.content).into_iter().next());
                match suggestion {
                    Some(sql) => {
                        println!("Query set to:\n{sql}");
                        query = sql;
                    }
                    None => println!("The last reply has no SQL to apply."),
                }
            }
            Command::Thread => match context.thread_id() {
                id if id.is_empty() => println!("No thread yet."),
                id => println!("{id}"),
            },
            Command::Dismiss => context.dismiss_error(),
            Command::Reset => {
                context.reset_conversation();
                println!("Conversation reset.");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Empty => {}
            Command::Unknown(name) => println!("Unknown command /{name}. Type /help."),
        }
    }

    context.interrupt();
    Ok(())
}

fn print_outcome(context: &ConversationContext, result: &Result<TurnOutcome, AssistantError>) {
    match result {
        Ok(TurnOutcome::Completed { .. }) => {
            let state = context.snapshot();
            let Some(reply) = state.last_reply() else {
                return;
            };
            println!("{}", reply.content);
            let suggestions = reply
                .code_blocks()
                .iter()
                .filter(|b| b.is_applicable())
                .count();
            if suggestions > 0 {
                println!("({suggestions} SQL suggestion(s), /apply to use the first)");
            }
        }
        Ok(TurnOutcome::Aborted) => println!("(interrupted)"),
        Ok(TurnOutcome::Skipped) => println!("(a reply is still pending)"),
        Err(_) => {
            if let Some(message) = context.error_message() {
                println!("Error: {message}");
            }
        }
    }
}
