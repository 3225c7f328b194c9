//! Vault Copilot - terminal chat over a notes vault
//!
//! Reads one message per line from stdin and runs it through the
//! conversation engine. Ctrl-C cancels the run in progress, or exits when
//! idle at the prompt.

use clap::Parser;
use std::future::Future;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use vault_copilot::auth::{AuthState, CopilotTokenClient};
use vault_copilot::config::{load_auth, save_auth, Cli, ConfigError};
use vault_copilot::conversation::{ConversationMessage, ToolCallOutcome, ToolCallStatus};
use vault_copilot::engine::{ConversationEngine, EngineObserver, RunInput};
use vault_copilot::llm::{CopilotTransport, LoggingTransport};
use vault_copilot::tools::{ToolRegistry, Vault};

/// Prints run progress and persists credential changes
struct TerminalObserver {
    auth_path: PathBuf,
    auth: Arc<Mutex<AuthState>>,
}

impl EngineObserver for TerminalObserver {
    fn on_content_delta(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn on_tool_call(&self, outcome: &ToolCallOutcome) {
        match outcome.status {
            ToolCallStatus::Running => println!("\n[{}] running", outcome.name),
            ToolCallStatus::Success => println!("[{}] done", outcome.name),
            ToolCallStatus::Error => println!(
                "[{}] failed: {}",
                outcome.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            ToolCallStatus::Pending | ToolCallStatus::Rejected => {}
        }
    }

    fn on_error(&self, description: &str) {
        eprintln!("\nerror: {description}");
    }

    fn on_auth_update(&self, state: &AuthState) {
        if let Err(e) = save_auth(&self.auth_path, state) {
            tracing::warn!(error = %e, "Failed to persist auth state");
        }
        if let Ok(mut auth) = self.auth.lock() {
            *auth = state.clone();
        }
    }
}

/// Resolves on Ctrl-C; a failed handler install never fires
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Next prompt line, or `None` on end of input or interrupt
///
/// Once `ctrl_c()` has been polled SIGINT no longer terminates the process,
/// so the idle prompt has to listen for it too.
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => line,
        () = interrupt => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vault_copilot=info".into());
    let fmt = if cli.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    tracing_subscriber::registry().with(filter).with(fmt).init();

    let vault = Arc::new(Vault::open(&cli.vault).map_err(|source| ConfigError::Vault {
        path: cli.vault.clone(),
        source,
    })?);
    vault.set_active_file(cli.active_file.clone()).await;
    tracing::info!(root = %vault.root().display(), "Vault opened");

    let auth_path = cli.auth_path()?;
    let auth = Arc::new(Mutex::new(load_auth(&auth_path)?));
    if auth.lock().map(|a| a.github_token.is_none()).unwrap_or(true) {
        tracing::warn!(path = %auth_path.display(), "No GitHub token found. Set GITHUB_TOKEN or sign in first.");
    }

    let config = cli.engine_config();
    let tools = Arc::new(ToolRegistry::vault(Arc::clone(&vault))?);
    let transport = LoggingTransport::new(CopilotTransport::new(config.completions_url.clone())?);
    let refresher = CopilotTokenClient::new(config.token_url.clone())?;
    let engine = ConversationEngine::new(config, transport, Arc::clone(&tools), refresher);

    let observer = TerminalObserver {
        auth_path,
        auth: Arc::clone(&auth),
    };

    println!("Vault Copilot ({}). Type a message, /open <path> or /quit.", engine.config().model);
    let mut history: Vec<ConversationMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = next_input(&mut lines, ctrl_c()).await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }
        if let Some(path) = text.strip_prefix("/open") {
            let path = path.trim();
            let active = (!path.is_empty()).then(|| path.to_string());
            tools.vault_handle().set_active_file(active).await;
            println!("Active file: {}", if path.is_empty() { "(none)" } else { path });
            continue;
        }

        let current_auth = auth.lock().map(|a| a.clone()).unwrap_or_default();
        let cancel = CancellationToken::new();
        let report = {
            let input = RunInput {
                history: &history,
                user_text: text,
                auth: current_auth,
            };
            let run = engine.run(input, &observer, &cancel);
            tokio::pin!(run);
            tokio::select! {
                report = &mut run => report,
                () = ctrl_c() => {
                    cancel.cancel();
                    run.await
                }
            }
        };
        println!();
        tracing::debug!(rounds = report.rounds, finish = %report.finish, "Run complete");
        history.extend(report.messages);
    }

    Ok(())
}
