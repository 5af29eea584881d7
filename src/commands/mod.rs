/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`    — Interactive chat
- `history` — List and show chat sessions
- `usage`   — Message usage and tier
- `health`  — Answer service reachability

Handlers build the persistence and identity backends from configuration
and drive the library components; they own all terminal output.
*/

use crate::config::{Config, PersistenceBackend};
use crate::error::{GenieError, Result};
use crate::identity::{Identity, IdentityProvider, RestIdentity, StaticIdentity};
use crate::persistence::{create_persistence, Persistence};
use std::sync::Arc;

// Special commands parser for the chat loop
pub mod special_commands;

// Chat history commands
pub mod history;

// Terminal rendering helpers
pub mod render;

/// Persistence and identity backends selected by configuration
pub struct Backends {
    /// Record store
    pub persistence: Arc<dyn Persistence>,
    /// Signed-in user source
    pub identity: Arc<dyn IdentityProvider>,
}

/// Build the configured backends
///
/// The REST backend authenticates against the same service; the SQLite
/// backend uses the static local owner.
///
/// # Errors
///
/// Returns error if either backend cannot be initialized
pub fn build_backends(config: &Config) -> Result<Backends> {
    let persistence = create_persistence(&config.persistence)?;

    let identity: Arc<dyn IdentityProvider> = match config.persistence.backend {
        PersistenceBackend::Rest => {
            let base_url = config.persistence.base_url.clone().ok_or_else(|| {
                GenieError::Config("persistence.base_url is required".to_string())
            })?;
            Arc::new(RestIdentity::new(
                base_url,
                config.persistence.api_key.clone(),
                config.persistence.access_token.clone(),
            )?)
        }
        PersistenceBackend::Sqlite => Arc::new(StaticIdentity::new(&config.identity.owner_id)),
    };

    Ok(Backends {
        persistence,
        identity,
    })
}

/// Resolve the signed-in user or fail with `Unauthenticated`
pub async fn require_identity(identity: &dyn IdentityProvider) -> Result<Identity> {
    Ok(identity.current_user().await?.ok_or_else(|| {
        GenieError::Unauthenticated(
            "no signed-in user; set ASKGENIE_ACCESS_TOKEN for the REST backend".to_string(),
        )
    })?)
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Builds a `ChatOrchestrator` over the configured backends and runs a
    //! readline-based loop. Each question runs as a spawned task so the
    //! pending turn can be shown while the answer service works.

    use super::render::{print_transcript, print_turn, short_id, usage_badge};
    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::answer::HttpAnswerFetcher;
    use crate::orchestrator::{AttachOutcome, BlockReason, ChatOrchestrator, Phase, SubmitOutcome};
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::time::Duration;

    /// Start interactive chat
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `new` - Open a fresh session instead of resuming the latest one
    /// * `session` - Open this session instead of resuming the latest one
    ///
    /// # Errors
    ///
    /// Returns error if the backends cannot be built, nobody is signed in, or
    /// the requested session cannot be opened.
    pub async fn run_chat(config: Config, new: bool, session: Option<String>) -> Result<()> {
        let backends = build_backends(&config)?;
        let answers = Arc::new(HttpAnswerFetcher::new(&config.answer)?);
        let orchestrator =
            ChatOrchestrator::new(&config, backends.persistence, answers, backends.identity);

        orchestrator.start().await?;
        if new {
            orchestrator.new_chat().await?;
        } else if let Some(id) = session {
            orchestrator.load_chat(&id).await?;
        }

        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&orchestrator);
        print_transcript(&orchestrator.transcript());

        loop {
            let prompt = format!("{} ", "ask>".cyan().bold());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::NewChat) => {
                            match orchestrator.new_chat().await {
                                Ok(_) => print_transcript(&orchestrator.transcript()),
                                Err(e) => eprintln!("{}", format!("Error: {:#}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::LoadChat(id)) => {
                            let id = resolve_session_id(&orchestrator, &id);
                            match orchestrator.load_chat(&id).await {
                                Ok(session) => {
                                    println!("{}\n", format!("Opened \"{}\"", session.title).green());
                                    print_transcript(&orchestrator.transcript());
                                }
                                Err(e) => eprintln!("{}", format!("Error: {:#}", e).red()),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::History) => {
                            orchestrator.refresh_recent().await;
                            print_recent(&orchestrator);
                            continue;
                        }
                        Ok(SpecialCommand::Usage) => {
                            print_usage(&orchestrator);
                            continue;
                        }
                        Ok(SpecialCommand::Attach) => {
                            match orchestrator.attach_file() {
                                AttachOutcome::PremiumRequired => println!(
                                    "{}\n",
                                    "File uploads are available for premium users only.".yellow()
                                ),
                                AttachOutcome::Unsupported => println!(
                                    "{}\n",
                                    "File uploads are not available in the terminal client yet."
                                        .yellow()
                                ),
                            }
                            continue;
                        }
                        Ok(SpecialCommand::SignOut) => {
                            if let Err(e) = orchestrator.sign_out().await {
                                eprintln!("{}", format!("Error: {:#}", e).red());
                                continue;
                            }
                            println!("{}", "Signed out.".green());
                            break;
                        }
                        Ok(SpecialCommand::Help) => {
                            print_help();
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(SpecialCommand::None) => {
                            // Regular question
                        }
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    }

                    rl.add_history_entry(trimmed)?;
                    ask(&orchestrator, trimmed).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Submit one question and print its outcome
    async fn ask(orchestrator: &ChatOrchestrator, question: &str) {
        let task = {
            let orchestrator = orchestrator.clone();
            let question = question.to_string();
            tokio::spawn(async move { orchestrator.submit(&question).await })
        };

        let mut shown_pending = false;
        while !task.is_finished() {
            if !shown_pending && orchestrator.phase() == Phase::AwaitingAnswer {
                if let Some(pending) = orchestrator.transcript().last() {
                    print_turn(pending);
                }
                shown_pending = true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Question task failed: {}", e);
                return;
            }
        };

        match outcome {
            SubmitOutcome::Answered | SubmitOutcome::Recovered => {
                if let Some(reply) = orchestrator.transcript().last() {
                    print_turn(reply);
                }
            }
            SubmitOutcome::Blocked(BlockReason::QuotaDenied { used, limit }) => println!(
                "{}\n",
                format!(
                    "You've used {} of {} free messages. Upgrade to premium for unlimited questions.",
                    used, limit
                )
                .yellow()
            ),
            SubmitOutcome::Blocked(BlockReason::IncrementFailed(reason)) => eprintln!(
                "{}\n",
                format!("Could not update message usage, please try again: {}", reason).red()
            ),
            SubmitOutcome::NotReady => {
                eprintln!("{}\n", "No active chat. Use /new to start one.".red())
            }
            SubmitOutcome::Busy => {
                println!("{}\n", "Still working on the previous question.".yellow())
            }
            SubmitOutcome::Ignored | SubmitOutcome::Discarded => {}
        }
    }

    /// Expand a unique id prefix from the recent list
    fn resolve_session_id(orchestrator: &ChatOrchestrator, id: &str) -> String {
        let matches: Vec<String> = orchestrator
            .recent_sessions()
            .into_iter()
            .filter(|s| s.id.starts_with(id))
            .map(|s| s.id)
            .collect();
        match matches.as_slice() {
            [only] => only.clone(),
            _ => id.to_string(),
        }
    }

    fn print_recent(orchestrator: &ChatOrchestrator) {
        let recent = orchestrator.recent_sessions();
        if recent.is_empty() {
            println!("{}\n", "No chats yet.".yellow());
            return;
        }

        let current = orchestrator.current_session().map(|s| s.id);
        println!("\nRecent chats:");
        for session in recent {
            let marker = if current.as_deref() == Some(session.id.as_str()) {
                "*".green().bold()
            } else {
                " ".normal()
            };
            println!(
                " {} {}  {}  {}",
                marker,
                short_id(&session.id).cyan(),
                session.created_at.format("%Y-%m-%d %H:%M"),
                session.title
            );
        }
        println!("\nUse {} to open one.\n", "/load <ID>".cyan());
    }

    fn print_usage(orchestrator: &ChatOrchestrator) {
        match orchestrator.usage() {
            Some(record) => println!(
                "{}\n",
                usage_badge(&record, orchestrator.quota_policy()).bold()
            ),
            None => println!("{}\n", "Usage is unavailable right now.".yellow()),
        }
    }

    fn print_welcome_banner(orchestrator: &ChatOrchestrator) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║               askgenie Interactive Chat - Welcome!           ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        if let Some(session) = orchestrator.current_session() {
            println!("Chat:   {} ({})", session.title.bold(), short_id(&session.id).cyan());
        }
        if let Some(record) = orchestrator.usage() {
            println!("Usage:  {}", usage_badge(&record, orchestrator.quota_policy()));
        }
        println!("\nType '/help' for available commands, 'exit' to quit\n");
    }
}

// Usage command handler
pub mod usage {
    //! Show the signed-in owner's usage record.

    use super::render::usage_badge;
    use super::*;
    use crate::persistence::open_sqlite;
    use crate::quota::{QuotaPolicy, QuotaTracker};
    use colored::Colorize;

    /// Upgrade the local owner to premium without expiry
    ///
    /// # Errors
    ///
    /// Returns `GenieError::Config` for the REST backend, where the tier is
    /// managed by the service, or a storage error if the update fails
    pub fn grant_premium(config: &Config) -> Result<()> {
        if config.persistence.backend != PersistenceBackend::Sqlite {
            return Err(GenieError::Config(
                "--grant-premium is only available with the sqlite backend".to_string(),
            )
            .into());
        }

        let owner_id = &config.identity.owner_id;
        let storage = open_sqlite(&config.persistence)?;
        storage.set_premium(owner_id, None)?;
        tracing::info!(owner = %owner_id, "Granted premium tier");
        println!("{}", format!("Premium granted to {}", owner_id).green());
        Ok(())
    }

    /// Print usage and tier for the signed-in owner
    ///
    /// # Errors
    ///
    /// Returns error if nobody is signed in or the usage record cannot be read
    pub async fn show_usage(config: &Config) -> Result<()> {
        let backends = build_backends(config)?;
        let owner = require_identity(backends.identity.as_ref()).await?;
        let policy = QuotaPolicy::from(&config.quota);
        let tracker = QuotaTracker::new(backends.persistence, policy);
        let record = tracker.load(&owner.id).await?;

        println!("\n{}", "Usage".bold());
        println!("  Owner:          {}", owner.email.as_deref().unwrap_or(&owner.id));
        println!("  Messages used:  {}", record.messages_used);
        println!(
            "  Tier:           {}",
            if record.is_premium { "premium".green() } else { "free".normal() }
        );
        match tracker.remaining(&record) {
            Some(remaining) if policy.enforce => println!("  Remaining:      {}", remaining),
            Some(_) => println!("  Limit:          {} (not enforced)", policy.limit),
            None => println!("  Remaining:      unlimited"),
        }
        println!("\n{}\n", usage_badge(&record, policy).cyan());
        Ok(())
    }
}

// Health command handler
pub mod health {
    //! Check the answer service.

    use super::*;
    use crate::answer::HttpAnswerFetcher;
    use colored::Colorize;

    /// Probe the answer service and print its status
    ///
    /// # Errors
    ///
    /// Returns `GenieError::FetchFailed` if the service is unreachable
    pub async fn check_health(config: &Config) -> Result<()> {
        let fetcher = HttpAnswerFetcher::new(&config.answer)?;
        let status = fetcher.health().await?;
        println!(
            "{} {}",
            "Answer service is up:".green(),
            fetcher.endpoint()
        );
        if !status.is_null() {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Ok(())
    }
}
