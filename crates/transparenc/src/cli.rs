//! Terminal frontend: subcommands plus the chat REPL.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::{ApiClient, ChatBackend};
use crate::chat::{ChatController, ChatSession, SessionEvent, SessionObserver};
use crate::config::Config;
use crate::handoff::{self, LocalStorage, SessionStorage};
use crate::memory::ChatStore;
use crate::memory_db::MemoryDatabase;
use crate::render;

#[derive(Debug, Parser)]
#[command(name = "transparenc", version, about = "Chat with NCSU student government legislation")]
pub struct Cli {
    /// Base URL of the legislation service
    #[arg(long, global = true)]
    pub api_endpoint: Option<String>,

    /// Where chat history and drafts are kept
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new chat, optionally with a first prompt
    New {
        /// Search for legislation instead of chatting
        #[arg(long)]
        docs: bool,
        #[arg(long)]
        top_k: Option<u8>,
        /// Start from suggested prompt N (see `new` with no prompt)
        #[arg(long, value_name = "N", conflicts_with = "prompt")]
        suggest: Option<usize>,
        prompt: Vec<String>,
    },
    /// Continue a chat by id
    Open { id: String },
    /// List past chats, newest first
    History,
    /// Print a stored transcript
    Show { id: String },
    /// Delete a chat
    Delete { id: String },
    /// Save the home prompt draft
    Draft { text: Vec<String> },
    /// Chat history database statistics
    Stats,
    /// Delete chats not saved for a number of days
    Prune {
        #[arg(long)]
        older_than_days: u32,
    },
}

impl Cli {
    /// Applies flag overrides on top of the environment configuration.
    pub fn apply_overrides(&self, config: Config) -> Result<Config> {
        let mut config = match &self.api_endpoint {
            Some(endpoint) => config.with_api_endpoint(endpoint)?,
            None => config,
        };
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        Ok(config)
    }
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Prompt(String),
    ToggleDocSearch,
    TopK(u8),
    Select(String),
    ClearDocuments,
    NewChat,
    Help,
    Quit,
    Invalid(String),
}

const REPL_COMMANDS: [&str; 7] = ["/docs", "/k", "/select", "/clear", "/new", "/help", "/quit"];

pub fn parse_repl_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return ReplCommand::Prompt(line.to_string());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    match command {
        "/docs" => ReplCommand::ToggleDocSearch,
        "/k" => match arg.parse::<u8>() {
            Ok(k) => ReplCommand::TopK(k),
            Err(_) => ReplCommand::Invalid("usage: /k <1-9>".into()),
        },
        "/select" if !arg.is_empty() => ReplCommand::Select(arg.to_string()),
        "/select" => ReplCommand::Invalid("usage: /select <document id>".into()),
        "/clear" => ReplCommand::ClearDocuments,
        "/new" => ReplCommand::NewChat,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("unknown command {}", other)),
    }
}

#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: REPL_COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            let candidates = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Prints session changes as they happen.
struct TerminalObserver<'a> {
    config: &'a Config,
    streaming: bool,
}

impl<'a> TerminalObserver<'a> {
    fn new(config: &'a Config) -> Self {
        Self { config, streaming: false }
    }
}

impl SessionObserver for TerminalObserver<'_> {
    fn on_event(&mut self, event: &SessionEvent, session: &ChatSession) {
        match event {
            SessionEvent::UserAppended { .. } => {}
            SessionEvent::AssistantPlaceholder { index } => {
                if let Some(message) = session.messages.get(*index) {
                    print!("{}", render::render_live_placeholder(&message.content, session, self.config));
                }
            }
            SessionEvent::AssistantDelta { delta, .. } => {
                self.streaming = true;
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            }
            SessionEvent::AssistantReplaced { index } => {
                if self.streaming {
                    println!();
                    self.streaming = false;
                }
                if let Some(message) = session.messages.get(*index) {
                    print!("{}", render::render_message(message, session, self.config));
                }
            }
            SessionEvent::DocumentsAdded { count } => {
                println!(
                    "{}",
                    format!("{} new documents saved. Use /select <id> to ask about one.", count).bright_black()
                );
            }
            SessionEvent::DocumentModeChanged { .. } => match render::render_document_mode_banner(session) {
                Some(banner) => print!("{}", banner),
                None => println!("{}", "Document mode off.".bright_black()),
            },
            SessionEvent::LoadingChanged(false) if self.streaming => {
                println!();
                self.streaming = false;
            }
            SessionEvent::LoadingChanged(_) => {}
        }
    }
}

enum ReplExit {
    NewChat,
    Quit,
}

struct App {
    config: Config,
    store: Arc<MemoryDatabase>,
    backend: Arc<dyn ChatBackend>,
    session_storage: SessionStorage,
    local_storage: LocalStorage,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let store = Arc::new(MemoryDatabase::new(&config.database_path())?);
        let backend: Arc<dyn ChatBackend> = Arc::new(ApiClient::new(&config)?);
        let local_storage = LocalStorage::open(config.local_storage_path())?;
        Ok(Self {
            config,
            store,
            backend,
            session_storage: SessionStorage::new(),
            local_storage,
        })
    }

    fn controller(&self, id: &str) -> ChatController {
        ChatController::open(id, self.backend.clone(), self.store.clone())
            .with_top_k(self.config.default_top_k)
    }

    /// Opens chats until the user quits; `/new` moves on to a fresh id.
    async fn chat_loop(&self, first_id: String) -> Result<()> {
        let mut rl = Editor::new()?;
        rl.set_helper(Some(CliHelper::new()));

        let mut id = first_id;
        loop {
            let mut controller = self.controller(&id);
            match self.repl(&mut rl, &mut controller).await? {
                ReplExit::NewChat => id = Uuid::new_v4().to_string(),
                ReplExit::Quit => break,
            }
        }
        Ok(())
    }

    async fn repl(
        &self,
        rl: &mut Editor<CliHelper, rustyline::history::DefaultHistory>,
        controller: &mut ChatController,
    ) -> Result<ReplExit> {
        let mut observer = TerminalObserver::new(&self.config);

        println!("{}", format!("=== TranspareNC chat {} ===", controller.id()).bright_magenta().bold());
        print!("{}", render::render_transcript(controller.session(), &self.config));
        println!("{}", "Type /help for commands.".bright_black());

        controller.resume_handoff(&self.session_storage, &mut observer).await;

        loop {
            let prompt = format!("{} ({}) > ", controller.input_placeholder(), status_line(controller));
            match rl.readline(&prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line.as_str());

                    match parse_repl_command(&line) {
                        ReplCommand::Prompt(text) => {
                            controller.submit(&text, &mut observer).await;
                        }
                        ReplCommand::ToggleDocSearch => {
                            if controller.toggle_doc_search() {
                                let state = if controller.doc_search_enabled() { "on" } else { "off" };
                                println!("{}", format!("Document search {}.", state).bright_black());
                            } else {
                                println!("{}", "Clear the selected documents first (/clear).".yellow());
                            }
                        }
                        ReplCommand::TopK(k) => {
                            let k = controller.set_top_k(k);
                            println!("{}", format!("Retrieving {} documents per search.", k).bright_black());
                        }
                        ReplCommand::Select(doc_id) => {
                            if !controller.toggle_document(&doc_id, &mut observer) {
                                println!("{}", format!("No document {} in this chat.", doc_id).yellow());
                            }
                        }
                        ReplCommand::ClearDocuments => controller.clear_active_documents(&mut observer),
                        ReplCommand::NewChat => return Ok(ReplExit::NewChat),
                        ReplCommand::Help => print_help(),
                        ReplCommand::Quit => return Ok(ReplExit::Quit),
                        ReplCommand::Invalid(message) => println!("{}", message.yellow()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_green());
                    return Ok(ReplExit::Quit);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn status_line(controller: &ChatController) -> String {
    if controller.doc_search_enabled() {
        format!("search, top {}", controller.top_k())
    } else if controller.session().in_document_mode() {
        "documents".to_string()
    } else {
        "chat".to_string()
    }
}

fn print_help() {
    println!("{}", "/docs         toggle legislation search".bright_black());
    println!("{}", "/k N          documents per search (1-9)".bright_black());
    println!("{}", "/select ID    add or remove a document from the question scope".bright_black());
    println!("{}", "/clear        stop asking about selected documents".bright_black());
    println!("{}", "/new          start a new chat".bright_black());
    println!("{}", "/quit         exit".bright_black());
}

/// Picks the first prompt of a new chat: a suggestion, the typed words, or
/// the saved draft. Returns the prompt and whether document search is on.
fn choose_new_prompt(
    suggest: Option<usize>,
    words: &[String],
    draft: Option<String>,
    docs: bool,
) -> Result<(String, bool)> {
    if let Some(number) = suggest {
        let suggestion = handoff::suggested_prompt(number).ok_or_else(|| {
            anyhow!("no suggested prompt {} (choose 1-{})", number, handoff::SUGGESTED_PROMPTS.len())
        })?;
        return Ok((suggestion.text.to_string(), docs || suggestion.doc_search));
    }
    if words.is_empty() {
        return Ok((draft.unwrap_or_default(), docs));
    }
    Ok((words.join(" "), docs))
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let app = App::new(config)?;

    match cli.command {
        None => app.chat_loop(Uuid::new_v4().to_string()).await?,
        Some(Commands::New { docs, top_k, suggest, prompt }) => {
            let draft = handoff::load_draft(&app.local_storage);
            let (prompt, docs) = choose_new_prompt(suggest, &prompt, draft, docs)?;
            let id = if prompt.trim().is_empty() {
                print!("{}", render::render_suggestions());
                Uuid::new_v4().to_string()
            } else {
                let top_k = top_k.unwrap_or(app.config.default_top_k);
                handoff::stage_new_chat(&app.session_storage, &app.local_storage, &prompt, docs, top_k)?
            };
            info!("Opening new chat {}", id);
            app.chat_loop(id).await?;
        }
        Some(Commands::Open { id }) => app.chat_loop(id).await?,
        Some(Commands::History) => {
            let chats = app.store.get_all_chats()?;
            print!("{}", render::render_past_chats(&chats));
        }
        Some(Commands::Show { id }) => match app.store.get_chat(&id)? {
            Some(session) => print!("{}", render::render_transcript(&session, &app.config)),
            None => println!("{}", format!("No chat with id {}", id).yellow()),
        },
        Some(Commands::Delete { id }) => {
            if app.store.delete_chat(&id)? {
                println!("{}", format!("Deleted chat {}", id).bright_green());
            } else {
                println!("{}", format!("No chat with id {}", id).yellow());
            }
        }
        Some(Commands::Draft { text }) => {
            handoff::save_draft(&app.local_storage, &text.join(" "))?;
            debug!("Draft saved to {}", app.local_storage.path().display());
            println!("{}", "Draft saved. Run `transparenc new` to send it.".bright_black());
        }
        Some(Commands::Stats) => {
            let stats = app.store.get_stats()?;
            println!("Chats:     {}", stats.total_chats);
            println!("Messages:  {}", stats.total_messages);
            println!("Documents: {}", stats.total_documents);
            if let (Some(oldest), Some(newest)) = (stats.oldest_timestamp, stats.newest_timestamp) {
                println!("Oldest:    {}", render::format_timestamp(oldest));
                println!("Newest:    {}", render::format_timestamp(newest));
            }
            println!("Size:      {} bytes", stats.database_size_bytes);
        }
        Some(Commands::Prune { older_than_days }) => {
            let deleted = app.store.cleanup_old_data(older_than_days)?;
            println!("{}", format!("Deleted {} chats.", deleted).bright_green());
        }
    }

    if cli.metrics {
        eprintln!("{}", crate::metrics::gather_text()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repl_commands() {
        assert_eq!(parse_repl_command("  what is R29? "), ReplCommand::Prompt("  what is R29? ".into()));
        assert_eq!(parse_repl_command("/docs"), ReplCommand::ToggleDocSearch);
        assert_eq!(parse_repl_command("/k 4"), ReplCommand::TopK(4));
        assert_eq!(parse_repl_command("/select 29"), ReplCommand::Select("29".into()));
        assert_eq!(parse_repl_command("/clear"), ReplCommand::ClearDocuments);
        assert_eq!(parse_repl_command("/new"), ReplCommand::NewChat);
        assert_eq!(parse_repl_command("/exit"), ReplCommand::Quit);
    }

    #[test]
    fn test_parse_repl_command_errors() {
        assert!(matches!(parse_repl_command("/k many"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_repl_command("/select"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_repl_command("/bogus"), ReplCommand::Invalid(_)));
    }

    #[test]
    fn test_cli_parses_new_with_flags() {
        let cli = Cli::try_parse_from(["transparenc", "--metrics", "new", "--docs", "--top-k", "3", "bike", "share"])
            .unwrap();
        assert!(cli.metrics);
        match cli.command {
            Some(Commands::New { docs, top_k, suggest, prompt }) => {
                assert!(docs);
                assert_eq!(top_k, Some(3));
                assert_eq!(suggest, None);
                assert_eq!(prompt, vec!["bike", "share"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_suggest() {
        let cli = Cli::try_parse_from(["transparenc", "new", "--suggest", "1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::New { suggest: Some(1), .. })));
        assert!(Cli::try_parse_from(["transparenc", "new", "--suggest", "1", "parking"]).is_err());
    }

    #[test]
    fn test_choose_new_prompt() {
        let (prompt, docs) = choose_new_prompt(Some(1), &[], None, false).unwrap();
        assert_eq!(prompt, "What bills talk about DEI?");
        assert!(docs);

        let (prompt, docs) = choose_new_prompt(Some(3), &[], Some("draft".into()), false).unwrap();
        assert_eq!(prompt, "What was R29 about?");
        assert!(!docs);

        assert!(choose_new_prompt(Some(9), &[], None, false).is_err());

        let words = vec!["bike".to_string(), "share".to_string()];
        assert_eq!(choose_new_prompt(None, &words, Some("draft".into()), true).unwrap(), ("bike share".to_string(), true));
        assert_eq!(choose_new_prompt(None, &[], Some("draft".into()), false).unwrap(), ("draft".to_string(), false));
        assert_eq!(choose_new_prompt(None, &[], None, false).unwrap(), (String::new(), false));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "transparenc",
            "--api-endpoint",
            "https://api.example.org/",
            "--data-dir",
            "/tmp/tnc",
            "history",
        ])
        .unwrap();
        let config = cli.apply_overrides(Config::default()).unwrap();
        assert_eq!(config.doc_retrieval_url(), "https://api.example.org/doc-retrieval/");
        assert_eq!(config.data_dir(), std::path::Path::new("/tmp/tnc"));
    }

    #[test]
    fn test_completion_hints_commands() {
        let helper = CliHelper::new();
        assert!(helper.commands.iter().any(|c| c == "/select"));
    }
}
