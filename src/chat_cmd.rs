//! `odin chat` commands: interactive chat, one-shot questions, history.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

use crate::auth::SessionStore;
use crate::chat::{render, ChatView, CloseReason, RenderedTurn, SseTransport};
use crate::chat_store::ChatStore;
use crate::config::Config;
use crate::output::{print_json, stdout_is_tty, OutputMode, StreamPrinter};

/// Builds the chat view wired to the SSE endpoint and the signed-in session.
pub fn build_view(config: &Config, store: ChatStore, sessions: SessionStore) -> Result<ChatView> {
    let transport = SseTransport::new(&config.api.url)?;
    Ok(ChatView::new(
        store,
        Arc::new(transport),
        Arc::new(sessions),
        config.chat.clear_policy,
    ))
}

pub async fn run_ask(view: &mut ChatView, question: &str, mode: OutputMode) -> Result<()> {
    let live = mode == OutputMode::Human && stdout_is_tty();
    let (reason, answer) = if mode == OutputMode::Human {
        let mut printer = StreamPrinter::new(std::io::stdout(), live);
        stream_answer(view, question, &mut printer).await?
    } else {
        let mut printer = StreamPrinter::new(std::io::sink(), false);
        stream_answer(view, question, &mut printer).await?
    };

    if mode == OutputMode::Json {
        return print_json(&serde_json::json!({
            "question": question.trim(),
            "answer": answer,
            "status": status_label(&reason),
        }));
    }
    if let CloseReason::Failed(e) = &reason {
        tracing::warn!(error = %e, "answer may be incomplete");
    }
    Ok(())
}

/// Submits `question` and prints the answer as it streams. Ctrl-C closes
/// the stream; whatever arrived so far is kept as the answer.
async fn stream_answer<W: Write>(
    view: &mut ChatView,
    question: &str,
    printer: &mut StreamPrinter<W>,
) -> Result<(CloseReason, Option<String>)> {
    let mut rx = view.store().subscribe();
    rx.borrow_and_update();
    view.submit(question)?;

    let finished = {
        let wait = view.wait();
        tokio::pin!(wait);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut watching = true;

        loop {
            tokio::select! {
                reason = &mut wait => break reason,
                changed = rx.changed(), if watching => match changed {
                    Ok(()) => {
                        let partial = rx.borrow_and_update().state.partial.clone();
                        printer.update(&partial)?;
                    }
                    Err(_) => watching = false,
                },
                _ = &mut ctrl_c => break None,
            }
        }
    };

    let reason = match finished {
        Some(reason) => reason,
        None => {
            view.close().await;
            CloseReason::Aborted
        }
    };

    let answer = match reason {
        CloseReason::Cleared => None,
        _ => view.store().transcript().last().cloned(),
    };
    printer.finish(answer.as_deref().unwrap_or(""))?;
    Ok((reason, answer))
}

fn status_label(reason: &CloseReason) -> &'static str {
    match reason {
        CloseReason::Completed => "completed",
        CloseReason::Failed(_) => "failed",
        CloseReason::Aborted => "aborted",
        CloseReason::Cleared => "cleared",
    }
}

/// Interactive loop. `/clear` clears the history, `/history` reprints it,
/// `/quit` or end of input exits.
pub async fn run_repl(view: &mut ChatView) -> Result<()> {
    if let Some(turns) = view.render() {
        if !turns.is_empty() {
            print!("{}", render_turns(&turns));
            println!();
        }
    }
    println!("Start chatting with Odin. /clear clears the history, /quit exits.");

    let live = stdout_is_tty();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You › ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                view.clear().await;
                println!("Chat cleared.");
            }
            "/history" => {
                if let Some(turns) = view.render() {
                    print!("{}", render_turns(&turns));
                }
            }
            question => {
                print!("Odin › ");
                std::io::stdout().flush()?;
                let mut printer = StreamPrinter::new(std::io::stdout(), live);
                match stream_answer(view, question, &mut printer).await {
                    Ok((CloseReason::Failed(e), _)) => {
                        eprintln!("(connection lost: {})", e);
                    }
                    Ok(_) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
    }

    view.close().await;
    Ok(())
}

pub fn render_turns(turns: &[RenderedTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let label = if turn.committed {
            turn.role.label().to_string()
        } else {
            format!("{} (typing…)", turn.role.label())
        };
        out.push_str(&format!("{}:\n", label));
        if turn.text.is_empty() {
            out.push_str("  (no answer)\n");
        }
        for line in turn.text.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}

pub fn run_history(store: &ChatStore, mode: OutputMode) -> Result<()> {
    let Some(turns) = render(&store.snapshot()) else {
        anyhow::bail!("chat history has not been loaded");
    };

    if mode == OutputMode::Json {
        let items: Vec<serde_json::Value> = turns
            .iter()
            .map(|t| {
                serde_json::json!({
                    "role": t.role.label().to_lowercase(),
                    "text": t.text,
                    "committed": t.committed,
                })
            })
            .collect();
        return print_json(&items);
    }

    if turns.is_empty() {
        println!("No messages yet.");
        return Ok(());
    }
    print!("{}", render_turns(&turns));
    Ok(())
}

pub fn run_clear(store: &ChatStore) -> Result<()> {
    store.clear();
    println!("Chat cleared.");
    Ok(())
}
