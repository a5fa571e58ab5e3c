use crate::prefs::PrefsStore;
use crate::relay::HttpRelay;
use crate::session::{ChatSession, Relay};
use crate::ux::{ChatMessageType, GenerationSpinner, format_turn_footer, style_chat_text};
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use mbtichat_core::completion::CancellationToken;
use mbtichat_core::persona::{ALL_PERSONAS, Persona};
use rustyline::completion::{Candidate, Completer};
use rustyline::error::ReadlineError;
use rustyline::hint::Hinter;
use rustyline::{CompletionType, Editor, Helper, Highlighter, Validator};
use std::io::Write;

// -------------
// REPL commands
// -------------
#[derive(Parser, Debug)]
#[command(multicall = true)]
struct CliCommand {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Hash, PartialEq, Eq)]
enum Command {
    /// Clear chat history
    Clear,
    /// Manage the active persona.
    ///
    /// With no arguments, shows the current persona.
    /// Use "list" to see all sixteen personality tags.
    #[command(alias = "p")]
    Persona {
        /// Persona tag to switch to, or "list"
        tag: Option<String>,
    },
    /// Regenerate the last assistant reply
    #[command(alias = "r")]
    Retry,
    /// Toggle dark mode (persisted across sessions)
    Theme,
    /// Exit the chat session
    #[command(alias = "q", alias = "quit")]
    Exit,
}

/// What the REPL loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
enum CommandAction {
    Continue,
    Retry,
    Exit,
}

impl Command {
    fn execute<R: Relay>(
        self,
        session: &mut ChatSession<R>,
        prefs: &PrefsStore,
    ) -> Result<CommandAction> {
        match self {
            Command::Clear => {
                session.clear();
                println!("Chat history cleared");
            }
            Command::Persona { tag } => match tag {
                Some(tag) if tag == "list" => {
                    for persona in ALL_PERSONAS {
                        println!("{} ({})", persona.as_str(), persona.nickname());
                    }
                }
                Some(tag) => match tag.parse::<Persona>() {
                    Ok(persona) => {
                        session.select_persona(persona);
                        println!("Persona switched to: {} ({})", persona, persona.nickname());
                    }
                    Err(e) => {
                        eprintln!("{}", style_chat_text(&e.to_string(), ChatMessageType::Error));
                    }
                },
                None => {
                    let persona = session.persona();
                    println!("Current persona: {} ({})", persona, persona.nickname());
                }
            },
            Command::Retry => return Ok(CommandAction::Retry),
            Command::Theme => {
                let dark = prefs.toggle_dark_mode()?;
                println!(
                    "Dark mode {}",
                    if dark { "enabled" } else { "disabled" }
                );
            }
            Command::Exit => {
                println!("Bye!");
                return Ok(CommandAction::Exit);
            }
        }
        Ok(CommandAction::Continue)
    }
}

// Persona tag completion for `/persona`
fn persona_compl(
    line: &str,
    pos: usize,
    persona_tags: &[String],
) -> Result<(usize, Vec<CompletionCandidate>), ReadlineError> {
    let line_to_pos = &line[..pos];
    if let Some(space_pos) = line_to_pos.rfind(' ') {
        let tag_prefix_start = space_pos + 1;
        if tag_prefix_start <= line_to_pos.len() {
            let tag_prefix = &line_to_pos[tag_prefix_start..];
            let mut candidates = persona_tags
                .iter()
                .filter(|tag| tag.starts_with(&tag_prefix.to_uppercase()))
                .map(|tag| CompletionCandidate::new(tag))
                .collect::<Vec<_>>();

            if "list".starts_with(tag_prefix) {
                candidates.push(CompletionCandidate::new("list"));
            }
            return Ok((tag_prefix_start, candidates));
        }
    }
    Ok((0, Vec::new()))
}

// -------------
// REPL completion
// -------------
#[derive(Helper, Validator, Highlighter)]
struct Repl {
    pub command_names: Vec<String>,
    pub persona_tags: Vec<String>,
}

#[derive(Debug)]
struct CompletionCandidate {
    text: String,
    display_string: String,
}

impl CompletionCandidate {
    pub fn new(text: &str) -> Self {
        let display_string = style_chat_text(text, ChatMessageType::Footer).to_string();
        Self {
            text: text.to_owned(),
            display_string,
        }
    }
}

impl Candidate for CompletionCandidate {
    fn display(&self) -> &str {
        &self.display_string
    }

    fn replacement(&self) -> &str {
        &self.text
    }
}

impl Completer for Repl {
    type Candidate = CompletionCandidate;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Self::Candidate>), ReadlineError> {
        if !line.starts_with('/') {
            return Ok((0, Vec::new()));
        }

        let args = shlex::split(line).unwrap_or_default();
        if let Ok(cli_command) = CliCommand::try_parse_from(&args) {
            return match cli_command.command {
                Command::Persona { .. } => persona_compl(line, pos, &self.persona_tags),
                _ => Ok((0, Vec::new())),
            };
        }

        let candidates = self
            .command_names
            .iter()
            .filter(|name| name.starts_with(line))
            .map(|name| CompletionCandidate::new(name))
            .collect();

        Ok((0, candidates))
    }
}

impl Hinter for Repl {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        if line.starts_with('/') {
            // Suggest command completions
            self.command_names
                .iter()
                .find(|&cmd_name| cmd_name.starts_with(line))
                .map(|cmd_name| cmd_name[line.len()..].into())
        } else {
            None
        }
    }
}

/// Runs the interactive REPL for the chat session.
pub async fn run(mut session: ChatSession<HttpRelay>, prefs: PrefsStore) -> Result<()> {
    println!("Welcome to mbtichat! Type '/persona list' to browse personas, '/q' to exit.");

    let config = rustyline::Config::builder()
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let command_names = CliCommand::command()
        .get_subcommands()
        .flat_map(|c| c.get_name_and_visible_aliases())
        .map(|s| format!("/{s}"))
        .collect::<Vec<_>>();
    let persona_tags = ALL_PERSONAS
        .iter()
        .map(|p| p.as_str().to_string())
        .collect::<Vec<_>>();

    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(Repl {
        command_names,
        persona_tags,
    }));

    loop {
        let prompt_meta = format!("[persona: {}]", session.persona());
        let prompt = format!(
            "\n{}\n{}",
            style_chat_text(&prompt_meta, ChatMessageType::Prompt),
            style_chat_text("> ", ChatMessageType::Prompt)
        );
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(&line)?;
                let trimmed_line = line.trim();

                if trimmed_line.is_empty() {
                    continue;
                }

                if trimmed_line.starts_with('/') {
                    let args = shlex::split(trimmed_line).unwrap_or_default();
                    match CliCommand::try_parse_from(args) {
                        Ok(cli_command) => {
                            match cli_command.command.execute(&mut session, &prefs)? {
                                CommandAction::Continue => {}
                                CommandAction::Retry => {
                                    process_turn(&mut session, None).await?;
                                }
                                CommandAction::Exit => return Ok(()),
                            }
                        }
                        Err(e) => {
                            e.print()?;
                        }
                    }
                } else {
                    process_turn(&mut session, Some(trimmed_line)).await?;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Type /quit to exit.");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nBye!");
                return Ok(());
            }
            Err(err) => {
                return Err(err.into());
            }
        }
    }
}

/// Streams one turn to the terminal. `Some(text)` submits a new message,
/// `None` regenerates the last reply.
async fn process_turn<R: Relay>(
    session: &mut ChatSession<R>,
    input: Option<&str>,
) -> Result<()> {
    let spinner = GenerationSpinner::new("Generating...".to_string());
    let cancel_token = CancellationToken::new();

    let mut first_token_received = false;
    let mut on_delta = |text: &str| {
        if !first_token_received {
            spinner.clear();
            first_token_received = true;
        }
        print!("{text}");
        let _ = std::io::stdout().flush();
    };

    let outcome = {
        let turn = async {
            match input {
                Some(text) => session.submit(text, cancel_token.clone(), &mut on_delta).await,
                None => session.regenerate(cancel_token.clone(), &mut on_delta).await,
            }
        };
        tokio::pin!(turn);

        // Ctrl-C requests cancellation; the turn itself stops at the next
        // frame boundary and reports Cancelled.
        loop {
            tokio::select! {
                result = &mut turn => break result?,
                _ = tokio::signal::ctrl_c() => {
                    cancel_token.cancel();
                }
            }
        }
    };

    spinner.clear();

    match outcome {
        Some(outcome) => {
            println!();
            println!("{}", format_turn_footer(&outcome));
        }
        None => {
            if input.is_none() {
                println!("Nothing to retry yet.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use mbtichat_core::chat::{ChatRequest, Role};
    use mbtichat_core::wire::StreamFrame;
    use rustyline::history::DefaultHistory;
    use tempfile::tempdir;

    struct StaticRelay;

    #[async_trait]
    impl Relay for StaticRelay {
        async fn chat(
            &self,
            _request: &ChatRequest,
        ) -> Result<BoxStream<'static, Result<StreamFrame>>> {
            let frames = vec![
                Ok(StreamFrame::Delta {
                    text: "Hello world".to_string(),
                }),
                Ok(StreamFrame::Done {
                    finish_reason: Some("stop".to_string()),
                }),
            ];
            Ok(Box::pin(stream::iter(frames)))
        }
    }

    fn test_prefs() -> (tempfile::TempDir, PrefsStore) {
        let dir = tempdir().unwrap();
        let store = PrefsStore::new(dir.path().join("prefs.json"));
        (dir, store)
    }

    #[test]
    fn test_repl_completer_for_commands() {
        let repl = Repl {
            command_names: vec!["/clear".to_string(), "/theme".to_string()],
            persona_tags: vec![],
        };
        let line = "/c";
        let history = DefaultHistory::new();
        let (start, candidates) = repl
            .complete(line, line.len(), &rustyline::Context::new(&history))
            .unwrap();
        assert_eq!(start, 0);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].replacement(), "/clear");
    }

    #[test]
    fn test_persona_command_completion() {
        let history = DefaultHistory::new();
        let repl = Repl {
            command_names: vec![],
            persona_tags: vec!["INTJ".to_string(), "INTP".to_string(), "ENFP".to_string()],
        };

        let line = "/persona IN";
        let (start, candidates) = repl
            .complete(line, line.len(), &rustyline::Context::new(&history))
            .unwrap();
        assert_eq!(start, 9); // "/persona ".len()
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].replacement(), "INTJ");
        assert_eq!(candidates[1].replacement(), "INTP");

        // Lowercase prefixes match the uppercase tags
        let line = "/persona en";
        let (_, candidates) = repl
            .complete(line, line.len(), &rustyline::Context::new(&history))
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].replacement(), "ENFP");

        let line = "/persona l";
        let (_, candidates) = repl
            .complete(line, line.len(), &rustyline::Context::new(&history))
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].replacement(), "list");
    }

    #[test]
    fn test_repl_hinter() {
        let repl = Repl {
            command_names: vec!["/theme".to_string(), "/clear".to_string()],
            persona_tags: vec![],
        };
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        let line = "/t";
        let hint = repl.hint(line, line.len(), &ctx).unwrap();
        assert_eq!(hint, "heme");

        assert!(repl.hint("abc", 3, &ctx).is_none());
        assert!(repl.hint("/theme", 3, &ctx).is_none());
        assert!(repl.hint("", 0, &ctx).is_none());
    }

    #[test]
    fn test_persona_command_execute() {
        let (_dir, prefs) = test_prefs();
        let mut session = ChatSession::new(StaticRelay, Persona::Intj);

        let switch = Command::Persona {
            tag: Some("enfp".to_string()),
        };
        assert_eq!(
            switch.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );
        assert_eq!(session.persona(), Persona::Enfp);

        // A bad tag reports an error and leaves the persona unchanged.
        let bad = Command::Persona {
            tag: Some("HACKER".to_string()),
        };
        assert_eq!(
            bad.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );
        assert_eq!(session.persona(), Persona::Enfp);

        let list = Command::Persona {
            tag: Some("list".to_string()),
        };
        assert_eq!(
            list.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );

        let current = Command::Persona { tag: None };
        assert_eq!(
            current.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );
    }

    #[test]
    fn test_theme_command_persists_toggle() {
        let (_dir, prefs) = test_prefs();
        let mut session = ChatSession::new(StaticRelay, Persona::Intj);

        assert_eq!(
            Command::Theme.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );
        assert!(prefs.load().dark_mode);

        assert_eq!(
            Command::Theme.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );
        assert!(!prefs.load().dark_mode);
    }

    #[tokio::test]
    async fn test_clear_and_exit_commands() {
        let (_dir, prefs) = test_prefs();
        let mut session = ChatSession::new(StaticRelay, Persona::Intj);

        session
            .submit("hi", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap();
        assert!(!session.messages().is_empty());

        assert_eq!(
            Command::Clear.execute(&mut session, &prefs).unwrap(),
            CommandAction::Continue
        );
        assert!(session.messages().is_empty());

        assert_eq!(
            Command::Exit.execute(&mut session, &prefs).unwrap(),
            CommandAction::Exit
        );
        assert_eq!(
            Command::Retry.execute(&mut session, &prefs).unwrap(),
            CommandAction::Retry
        );
    }

    #[tokio::test]
    async fn test_process_turn_submit_and_retry() {
        let mut session = ChatSession::new(StaticRelay, Persona::Intj);

        process_turn(&mut session, Some("hi")).await.unwrap();
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, Role::Assistant);
        assert_eq!(session.messages()[1].content, "Hello world");

        // Retry replaces the reply in place.
        process_turn(&mut session, None).await.unwrap();
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].content, "Hello world");
    }
}
