//! Terminal rendering of transcripts, document cards and the chat history.
//!
//! Every function returns a `String`; nothing here prints.

use chrono::{Local, TimeZone};
use colored::Colorize;

use crate::chat::controller::SEARCHING_PLACEHOLDER;
use crate::chat::{ChatMessage, ChatSession, MessageContent, Role};
use crate::config::Config;
use crate::documents::{DocumentChunk, DocumentRecord, RetrievalView};
use crate::handoff::SUGGESTED_PROMPTS;
use crate::utils::TextUtils;

const LINE_WIDTH: usize = 80;
const LONG_TITLE_CHARS: usize = 100;
const BODY_CHARS: usize = 180;
const SPONSORS_CHARS: usize = 60;

const LOADING_MESSAGES: [&str; 3] = [
    SEARCHING_PLACEHOLDER,
    "Getting more information to answer your question...\n\n",
    "Getting detailed information about this document...\n\n",
];

/// Placeholder texts shown while a request is in flight. An empty body is
/// only a placeholder while live, see [`render_live_placeholder`].
pub fn is_loading_message(text: &str) -> bool {
    LOADING_MESSAGES.contains(&text)
}

/// Right-aligned "You" block.
pub fn render_user_message(text: &str) -> String {
    let label = format!("{:>width$}", "You", width = LINE_WIDTH);
    let mut out = format!("{}\n", label.green().bold());
    for line in text.lines() {
        out.push_str(&format!("{:>width$}\n", line, width = LINE_WIDTH));
    }
    out
}

pub fn render_assistant_message(content: &MessageContent, session: &ChatSession, config: &Config) -> String {
    let mut out = format!("{}\n", "TranspareNC".bright_blue().bold());
    match content {
        MessageContent::Text(text) if is_loading_message(text) => {
            out.push_str(&format!("{}\n", text.trim_end().dimmed()));
        }
        MessageContent::Text(text) => {
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
        }
        MessageContent::Structured(payload) => match RetrievalView::classify(payload) {
            RetrievalView::Summaries(docs) | RetrievalView::Results(docs) => {
                out.push_str(&format!("Found {} relevant documents:\n", docs.len()));
                for doc in &docs {
                    let selected = session.active_doc_ids.contains(&doc.id);
                    out.push_str(&render_document_card(doc, selected, config));
                }
            }
            RetrievalView::Chunks(chunks) => {
                out.push_str(&format!(
                    "Found {} relevant sections in this document:\n",
                    chunks.len()
                ));
                for chunk in &chunks {
                    out.push_str(&render_chunk(chunk));
                }
            }
            RetrievalView::Other => {
                out.push_str(&payload.to_string());
                out.push('\n');
            }
        },
    }
    out
}

/// Assistant placeholder of an exchange that is still running.
pub fn render_live_placeholder(content: &MessageContent, session: &ChatSession, config: &Config) -> String {
    match content {
        MessageContent::Text(text) if text.is_empty() => {
            format!("{}\n{}\n", "TranspareNC".bright_blue().bold(), "...".dimmed())
        }
        other => render_assistant_message(other, session, config),
    }
}

pub fn render_message(message: &ChatMessage, session: &ChatSession, config: &Config) -> String {
    match (message.role, &message.content) {
        (Role::User, MessageContent::Text(text)) => render_user_message(text),
        (Role::User, MessageContent::Structured(value)) => render_user_message(&value.to_string()),
        (Role::Assistant, content) => render_assistant_message(content, session, config),
    }
}

fn render_chunk(chunk: &DocumentChunk) -> String {
    let mut out = String::new();
    for line in chunk.content.trim().lines() {
        out.push_str(&format!("  {} {}\n", "|".dimmed(), line));
    }
    out.push('\n');
    out
}

pub fn render_document_card(doc: &DocumentRecord, selected: bool, config: &Config) -> String {
    let marker = if selected { "[x]".green().bold() } else { "[ ]".normal() };
    let mut out = format!(
        "  {} {} {}\n",
        marker,
        doc.display_title().bold(),
        "Legislation".cyan()
    );

    if let Some(long_title) = doc.metadata.long_title.as_deref().filter(|t| !TextUtils::is_blank(t)) {
        out.push_str(&format!("      {}\n", TextUtils::preview(long_title, LONG_TITLE_CHARS)));
    }
    let body = doc.body();
    if !TextUtils::is_blank(body) {
        out.push_str(&format!("      {}\n", TextUtils::preview(body, BODY_CHARS).as_str().dimmed()));
    }
    if let Some(first_reading) = doc.metadata.first_reading.as_deref() {
        out.push_str(&format!("      First Reading: {}\n", first_reading));
    }
    let sponsors = doc.sponsors();
    if !sponsors.is_empty() {
        out.push_str(&format!(
            "      Sponsors: {}\n",
            TextUtils::preview(&sponsors.join(", "), SPONSORS_CHARS)
        ));
    }
    if doc.has_id() {
        out.push_str(&format!("      {}\n", config.document_pdf_url(&doc.id).as_str().underline()));
        out.push_str(&format!("      id: {}\n", doc.id));
    }
    out.push('\n');
    out
}

/// `None` outside document mode.
pub fn render_document_mode_banner(session: &ChatSession) -> Option<String> {
    let title_of = |id: &str| {
        session
            .document(id)
            .map(|d| d.display_title().to_string())
            .unwrap_or_else(|| id.to_string())
    };

    match session.active_doc_ids.as_slice() {
        [] => None,
        [only] => Some(format!("{} {}\n", "Asking about:".yellow().bold(), title_of(only))),
        many => {
            let mut out = format!(
                "{} {} documents selected\n",
                "Asking about:".yellow().bold(),
                many.len()
            );
            for id in many {
                out.push_str(&format!("  - {}\n", title_of(id)));
            }
            Some(out)
        }
    }
}

pub fn render_transcript(session: &ChatSession, config: &Config) -> String {
    let mut out = String::new();
    for message in &session.messages {
        out.push_str(&render_message(message, session, config));
        out.push('\n');
    }
    if let Some(banner) = render_document_mode_banner(session) {
        out.push_str(&banner);
    }
    out
}

pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown time".to_string(),
    }
}

/// Newest first.
pub fn render_past_chats(chats: &[ChatSession]) -> String {
    if chats.is_empty() {
        return format!("{}\n", "No past chats yet.".dimmed());
    }

    let mut sorted: Vec<&ChatSession> = chats.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut out = format!("{}\n", "Past chats".bold());
    for chat in sorted {
        out.push_str(&format!(
            "  {}\n      {} messages · {} · {}\n",
            chat.title().as_str().bold(),
            chat.messages.len(),
            format_timestamp(chat.timestamp),
            chat.id.as_str().dimmed()
        ));
    }
    out
}

/// Numbered home-screen suggestions for `new --suggest N`.
pub fn render_suggestions() -> String {
    let mut out = format!("{}\n", "Try one of these with `new --suggest N`:".bold());
    for (i, suggestion) in SUGGESTED_PROMPTS.iter().enumerate() {
        let tag = if suggestion.doc_search { " (Legislation search)".cyan().to_string() } else { String::new() };
        out.push_str(&format!("  {}. {}{}\n", i + 1, suggestion.text, tag));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain() {
        colored::control::set_override(false);
    }

    fn session_with_docs() -> ChatSession {
        let mut session = ChatSession::new("s");
        let payload = json!({"type": "summaries", "results": [
            {
                "id": "29",
                "metadata": {
                    "short_title": "R29",
                    "long_title": "A Resolution to Reapportion the Student Senate",
                    "first_reading": "2024-02-07",
                    "sponsors": "['Sen. Alvarez', 'Sen. Brooks']"
                },
                "summary": "Reapportions\nsenate seats."
            },
            {"id": "30", "metadata": {}, "page_content": "Parking."}
        ]});
        session.remember_documents(RetrievalView::classify(&payload).documents());
        session.push(ChatMessage::user("reapportionment"));
        session.push(ChatMessage::assistant(MessageContent::from_json(payload)));
        session
    }

    #[test]
    fn test_document_card_fields() {
        plain();
        let session = session_with_docs();
        let card = render_document_card(&session.documents[0], true, &Config::default());

        assert!(card.contains("[x] R29 Legislation"));
        assert!(card.contains("Reapportions senate seats."));
        assert!(card.contains("First Reading: 2024-02-07"));
        assert!(card.contains("Sponsors: Sen. Alvarez, Sen. Brooks"));
        assert!(card.contains("https://ncsu-sg.s3.us-east-1.amazonaws.com/29.pdf"));
    }

    #[test]
    fn test_card_without_title_uses_id() {
        plain();
        let session = session_with_docs();
        let card = render_document_card(&session.documents[1], false, &Config::default());
        assert!(card.contains("[ ] 30 Legislation"));
        assert!(!card.contains("First Reading"));
    }

    #[test]
    fn test_summaries_header_and_chunks_header() {
        plain();
        let session = session_with_docs();
        let text = render_assistant_message(&session.messages[1].content, &session, &Config::default());
        assert!(text.contains("Found 2 relevant documents:"));

        let chunks = MessageContent::from_json(json!({"type": "chunks", "chunks": [{"content": "Section 1."}]}));
        let text = render_assistant_message(&chunks, &session, &Config::default());
        assert!(text.contains("Found 1 relevant sections in this document:"));
        assert!(text.contains("Section 1."));
    }

    #[test]
    fn test_unrecognised_payload_renders_as_json() {
        plain();
        let session = ChatSession::new("s");
        let content = MessageContent::from_json(json!({"detail": "nope"}));
        let text = render_assistant_message(&content, &session, &Config::default());
        assert!(text.contains(r#"{"detail":"nope"}"#));
    }

    #[test]
    fn test_banner_single_and_many() {
        plain();
        let mut session = session_with_docs();
        assert_eq!(render_document_mode_banner(&session), None);

        session.toggle_document("29");
        assert!(render_document_mode_banner(&session).unwrap().contains("R29"));

        session.toggle_document("30");
        let banner = render_document_mode_banner(&session).unwrap();
        assert!(banner.contains("2 documents selected"));
        assert!(banner.contains("- 30"));
    }

    #[test]
    fn test_past_chats_newest_first() {
        plain();
        let mut older = ChatSession::new("older");
        older.push(ChatMessage::user("first question"));
        older.timestamp = 1_000;
        let mut newer = ChatSession::new("newer");
        newer.timestamp = 2_000;

        let listing = render_past_chats(&[older, newer]);
        let newer_at = listing.find("Untitled Chat").unwrap();
        let older_at = listing.find("first question").unwrap();
        assert!(newer_at < older_at);
        assert!(listing.contains("1 messages"));
    }

    #[test]
    fn test_suggestions_are_numbered() {
        plain();
        let text = render_suggestions();
        assert!(text.contains("  1. What bills talk about DEI? (Legislation search)\n"));
        assert!(text.contains("  2. Why is reapportionment necessary?\n"));
        assert!(text.contains("  3. What was R29 about?\n"));
    }

    #[test]
    fn test_loading_placeholder_detection() {
        assert!(!is_loading_message(""));
        assert!(is_loading_message(SEARCHING_PLACEHOLDER));
        assert!(!is_loading_message("Here is the answer."));
    }

    #[test]
    fn test_finished_empty_answer_is_not_shown_as_loading() {
        plain();
        let session = ChatSession::new("s");
        let empty = MessageContent::Text(String::new());

        let stored = render_assistant_message(&empty, &session, &Config::default());
        assert!(!stored.contains("..."));

        let live = render_live_placeholder(&empty, &session, &Config::default());
        assert_eq!(live, "TranspareNC\n...\n");
    }

    #[test]
    fn test_you_label_lines_up_with_message() {
        plain();
        let text = render_user_message("What was R29 about?");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), LINE_WIDTH);
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
        assert!(lines[0].ends_with("You"));
        assert!(text.contains(&format!("{}You", " ".repeat(LINE_WIDTH - 3))));
    }

    #[test]
    fn test_documents_without_ids_are_counted_and_rendered() {
        plain();
        let payload = json!({"type": "summaries", "results": [
            {"id": null, "metadata": {"id": "29", "short_title": "R29"}},
            {"metadata": {"first_reading": 20240207}},
            {"id": "31"}
        ]});
        let mut session = ChatSession::new("s");
        let added = session.remember_documents(RetrievalView::classify(&payload).documents());
        let content = MessageContent::from_json(payload);
        let text = render_assistant_message(&content, &session, &Config::default());

        assert_eq!(added, 2);
        assert!(text.contains("Found 3 relevant documents:"));
        assert!(text.contains("[ ] R29 Legislation"));
        assert!(text.contains("First Reading: 20240207"));
        assert!(text.contains("[ ] 31 Legislation"));
        assert!(session.toggle_document("29"));
    }
}
