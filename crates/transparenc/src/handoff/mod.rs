//! Prompt handoff from the home screen to a freshly opened chat.
//!
//! The home screen stages the prompt (and, for document search, the mode and
//! `top_k`) in session storage and then opens a new chat id. The chat picks
//! the staged values up once, on open. The unsent home prompt is kept as a
//! draft in local storage.

mod storage;

pub use storage::{KeyValueStorage, LocalStorage, SessionStorage};

use tracing::warn;
use uuid::Uuid;

use crate::config::{Config, DEFAULT_TOP_K};

pub const TRANSFER_PROMPT_KEY: &str = "transferPrompt";
pub const TYPE_KEY: &str = "type";
pub const TOP_K_KEY: &str = "top_k";
pub const PROMPT_DRAFT_KEY: &str = "prompt";
pub const DOC_SEARCH_TYPE: &str = "docSearch";

/// A prompt waiting to be submitted by the chat that was just opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPrompt {
    pub prompt: String,
    pub doc_search: bool,
    pub top_k: u8,
}

/// A canned prompt offered on the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedPrompt {
    pub text: &'static str,
    /// Picking it also switches on document search.
    pub doc_search: bool,
}

pub const SUGGESTED_PROMPTS: [SuggestedPrompt; 3] = [
    SuggestedPrompt { text: "What bills talk about DEI?", doc_search: true },
    SuggestedPrompt { text: "Why is reapportionment necessary?", doc_search: false },
    SuggestedPrompt { text: "What was R29 about?", doc_search: false },
];

/// Suggestions are numbered from 1.
pub fn suggested_prompt(number: usize) -> Option<&'static SuggestedPrompt> {
    number.checked_sub(1).and_then(|i| SUGGESTED_PROMPTS.get(i))
}

/// Home-screen submit: clears the draft, stages the prompt, returns the new chat id.
pub fn stage_new_chat(
    session: &dyn KeyValueStorage,
    local: &dyn KeyValueStorage,
    prompt: &str,
    doc_search: bool,
    top_k: u8,
) -> anyhow::Result<String> {
    local.remove_item(PROMPT_DRAFT_KEY)?;
    session.set_item(TRANSFER_PROMPT_KEY, prompt)?;
    if doc_search {
        session.set_item(TOP_K_KEY, &Config::clamp_top_k(top_k).to_string())?;
        session.set_item(TYPE_KEY, DOC_SEARCH_TYPE)?;
    } else {
        session.remove_item(TOP_K_KEY)?;
        session.remove_item(TYPE_KEY)?;
    }
    Ok(Uuid::new_v4().to_string())
}

/// Takes the staged prompt, if any, and clears every handoff key.
///
/// A blank prompt counts as nothing staged.
pub fn take_pending(session: &dyn KeyValueStorage) -> anyhow::Result<Option<PendingPrompt>> {
    let prompt = session.get_item(TRANSFER_PROMPT_KEY);
    let doc_search = session.get_item(TYPE_KEY).as_deref() == Some(DOC_SEARCH_TYPE);
    let top_k = session
        .get_item(TOP_K_KEY)
        .and_then(|raw| match raw.trim().parse::<u8>() {
            Ok(k) => Some(Config::clamp_top_k(k)),
            Err(e) => {
                warn!("Ignoring staged top_k {:?}: {}", raw, e);
                None
            }
        })
        .unwrap_or(DEFAULT_TOP_K);

    let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };

    session.remove_item(TRANSFER_PROMPT_KEY)?;
    session.remove_item(TYPE_KEY)?;
    session.remove_item(TOP_K_KEY)?;

    Ok(Some(PendingPrompt { prompt, doc_search, top_k }))
}

pub fn save_draft(local: &dyn KeyValueStorage, prompt: &str) -> anyhow::Result<()> {
    local.set_item(PROMPT_DRAFT_KEY, prompt)
}

pub fn load_draft(local: &dyn KeyValueStorage) -> Option<String> {
    local.get_item(PROMPT_DRAFT_KEY).filter(|p| !p.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_then_take_doc_search() {
        let session = SessionStorage::new();
        let local = SessionStorage::new();
        save_draft(&local, "parking fees").unwrap();

        let id = stage_new_chat(&session, &local, "parking fees", true, 4).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(load_draft(&local), None);

        let pending = take_pending(&session).unwrap().unwrap();
        assert_eq!(
            pending,
            PendingPrompt { prompt: "parking fees".into(), doc_search: true, top_k: 4 }
        );
        assert_eq!(take_pending(&session).unwrap(), None);
        assert_eq!(session.get_item(TYPE_KEY), None);
        assert_eq!(session.get_item(TOP_K_KEY), None);
    }

    #[test]
    fn test_plain_chat_handoff_uses_default_top_k() {
        let session = SessionStorage::new();
        let local = SessionStorage::new();
        stage_new_chat(&session, &local, "hello", false, 7).unwrap();

        let pending = take_pending(&session).unwrap().unwrap();
        assert!(!pending.doc_search);
        assert_eq!(pending.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_blank_prompt_is_not_pending() {
        let session = SessionStorage::new();
        session.set_item(TRANSFER_PROMPT_KEY, "   ").unwrap();
        assert_eq!(take_pending(&session).unwrap(), None);
    }

    #[test]
    fn test_suggested_prompts_are_numbered_from_one() {
        let first = suggested_prompt(1).unwrap();
        assert_eq!(first.text, "What bills talk about DEI?");
        assert!(first.doc_search);
        assert!(!suggested_prompt(3).unwrap().doc_search);
        assert_eq!(suggested_prompt(0), None);
        assert_eq!(suggested_prompt(4), None);
    }

    #[test]
    fn test_bad_top_k_falls_back() {
        let session = SessionStorage::new();
        session.set_item(TRANSFER_PROMPT_KEY, "q").unwrap();
        session.set_item(TYPE_KEY, DOC_SEARCH_TYPE).unwrap();
        session.set_item(TOP_K_KEY, "lots").unwrap();
        assert_eq!(take_pending(&session).unwrap().unwrap().top_k, DEFAULT_TOP_K);
    }
}
