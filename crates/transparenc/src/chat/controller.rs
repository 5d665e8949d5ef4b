//! The per-conversation state machine.
//!
//! A [`ChatController`] owns one [`ChatSession`] plus the transient UI state
//! around it (document-search flag, `top_k`, loading). Every submission
//! appends the user's message, then an assistant placeholder that is
//! overwritten as the answer arrives. The session is saved after each
//! mutation and every mutation is reported to a [`SessionObserver`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::assembler::assemble;
use super::message::{ChatMessage, MessageContent};
use super::session::ChatSession;
use crate::api::{ChatBackend, ChatStreamRequest};
use crate::config::{Config, DEFAULT_TOP_K};
use crate::documents::RetrievalView;
use crate::handoff::{self, KeyValueStorage};
use crate::memory::ChatStore;

pub const RETRIEVAL_APOLOGY: &str =
    "Sorry, there was an error retrieving documents. Please try again later.";
pub const DOCUMENT_QUESTION_APOLOGY: &str =
    "Sorry, there was an error connecting to Claude. Please try again later.";
pub const CHAT_APOLOGY: &str = "Yeah so Claude's not vibing rn. Try again later.";

pub const SEARCHING_PLACEHOLDER: &str = "Searching for relevant legislation...\n\n";

/// What the next submission will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    DocumentSearch,
    DocumentQuestion,
    General,
}

/// A change to the session, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    UserAppended { index: usize },
    AssistantPlaceholder { index: usize },
    AssistantDelta { index: usize, delta: String },
    /// The assistant message was overwritten wholesale (final payload or apology).
    AssistantReplaced { index: usize },
    DocumentsAdded { count: usize },
    DocumentModeChanged { active_doc_ids: Vec<String> },
    LoadingChanged(bool),
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent, session: &ChatSession);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_event(&mut self, _event: &SessionEvent, _session: &ChatSession) {}
}

pub struct ChatController {
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn ChatStore>,
    session: ChatSession,
    doc_search: bool,
    top_k: u8,
    loading: bool,
}

impl ChatController {
    pub fn new(id: &str, backend: Arc<dyn ChatBackend>, store: Arc<dyn ChatStore>) -> Self {
        Self {
            backend,
            store,
            session: ChatSession::new(id),
            doc_search: false,
            top_k: DEFAULT_TOP_K,
            loading: false,
        }
    }

    /// Loads the stored session for `id`. Missing or unreadable sessions start empty.
    pub fn open(id: &str, backend: Arc<dyn ChatBackend>, store: Arc<dyn ChatStore>) -> Self {
        let mut controller = Self::new(id, backend, store);
        match controller.store.get_chat(id) {
            Ok(Some(session)) => {
                debug!("Loaded chat {} with {} messages", id, session.messages.len());
                controller.session = session;
            }
            Ok(None) => debug!("Chat {} not found, starting empty", id),
            Err(e) => error!("Error loading chat {}: {:#}", id, e),
        }
        controller
    }

    pub fn with_top_k(mut self, top_k: u8) -> Self {
        self.top_k = Config::clamp_top_k(top_k);
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn doc_search_enabled(&self) -> bool {
        self.doc_search
    }

    pub fn top_k(&self) -> u8 {
        self.top_k
    }

    pub fn mode(&self) -> ChatMode {
        if self.doc_search {
            ChatMode::DocumentSearch
        } else if self.session.in_document_mode() {
            ChatMode::DocumentQuestion
        } else {
            ChatMode::General
        }
    }

    /// Flips document search. Has no effect while documents are selected.
    pub fn toggle_doc_search(&mut self) -> bool {
        if self.session.in_document_mode() {
            debug!("Document search toggle ignored in document mode");
            return false;
        }
        self.doc_search = !self.doc_search;
        true
    }

    pub fn set_top_k(&mut self, top_k: u8) -> u8 {
        self.top_k = Config::clamp_top_k(top_k);
        self.top_k
    }

    /// Adds or removes a document from the selection. Unknown ids are refused.
    pub fn toggle_document(&mut self, doc_id: &str, observer: &mut dyn SessionObserver) -> bool {
        if !self.session.toggle_document(doc_id) {
            warn!("Cannot select unknown document {}", doc_id);
            return false;
        }
        self.emit_document_mode(observer);
        self.persist();
        true
    }

    pub fn clear_active_documents(&mut self, observer: &mut dyn SessionObserver) {
        if self.session.clear_active_documents() {
            self.emit_document_mode(observer);
            self.persist();
        }
    }

    pub fn input_placeholder(&self) -> String {
        match self.session.active_doc_ids.len() {
            1 => "Ask about this document...".to_string(),
            n if n > 1 => format!("Ask about these {} documents...", n),
            _ if self.doc_search => "Search for legislation...".to_string(),
            _ => "Ask anything".to_string(),
        }
    }

    /// Submits a prompt staged by the home screen, once.
    pub async fn resume_handoff(
        &mut self,
        storage: &dyn KeyValueStorage,
        observer: &mut dyn SessionObserver,
    ) -> bool {
        let pending = match handoff::take_pending(storage) {
            Ok(Some(pending)) => pending,
            Ok(None) => return false,
            Err(e) => {
                error!("Error reading handoff prompt: {:#}", e);
                return false;
            }
        };

        info!("Resuming handoff prompt (doc search: {})", pending.doc_search);
        if pending.doc_search {
            self.doc_search = true;
            self.top_k = pending.top_k;
        }
        self.submit(&pending.prompt, observer).await
    }

    /// Runs one exchange in the current mode. Blank prompts are ignored;
    /// anything else is stored and sent exactly as typed.
    pub async fn submit(&mut self, prompt: &str, observer: &mut dyn SessionObserver) -> bool {
        if prompt.trim().is_empty() {
            return false;
        }
        let query = prompt;

        match self.mode() {
            ChatMode::DocumentSearch => self.search_documents(query, observer).await,
            ChatMode::DocumentQuestion => {
                let request =
                    ChatStreamRequest::about_documents(query, self.session.active_doc_ids.clone());
                self.stream_answer(query, request, DOCUMENT_QUESTION_APOLOGY, observer).await
            }
            ChatMode::General => {
                let request = ChatStreamRequest::general(query);
                self.stream_answer(query, request, CHAT_APOLOGY, observer).await
            }
        }
        true
    }

    async fn search_documents(&mut self, query: &str, observer: &mut dyn SessionObserver) {
        self.doc_search = false;
        if self.session.clear_active_documents() {
            self.emit_document_mode(observer);
        }

        let assistant_index = self.begin_exchange(query, SEARCHING_PLACEHOLDER, observer);
        self.set_loading(true, observer);

        match self.backend.retrieve_documents(query, self.top_k).await {
            Ok(payload) => {
                let view = RetrievalView::classify(&payload);
                let added = self.session.remember_documents(view.documents());
                self.session.replace_last(MessageContent::from_json(payload));
                observer.on_event(&SessionEvent::AssistantReplaced { index: assistant_index }, &self.session);
                if added > 0 {
                    observer.on_event(&SessionEvent::DocumentsAdded { count: added }, &self.session);
                }
            }
            Err(e) => {
                error!("Error retrieving documents: {:#}", e);
                self.session.replace_last(RETRIEVAL_APOLOGY.into());
                observer.on_event(&SessionEvent::AssistantReplaced { index: assistant_index }, &self.session);
            }
        }

        self.set_loading(false, observer);
        self.persist();
    }

    async fn stream_answer(
        &mut self,
        query: &str,
        request: ChatStreamRequest,
        apology: &str,
        observer: &mut dyn SessionObserver,
    ) {
        let assistant_index = self.begin_exchange(query, "", observer);
        self.set_loading(true, observer);

        let opened = self.backend.stream_chat(request).await;
        let result = match opened {
            Ok(stream) => {
                assemble(stream, |delta, content| {
                    self.session.replace_last(content.into());
                    observer.on_event(
                        &SessionEvent::AssistantDelta { index: assistant_index, delta: delta.to_string() },
                        &self.session,
                    );
                    self.persist();
                })
                .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!("Error streaming answer: {:#}", e);
            self.session.replace_last(apology.into());
            observer.on_event(&SessionEvent::AssistantReplaced { index: assistant_index }, &self.session);
        }

        self.set_loading(false, observer);
        self.persist();
    }

    /// Appends the user message and the assistant placeholder. Returns the placeholder's index.
    fn begin_exchange(&mut self, query: &str, placeholder: &str, observer: &mut dyn SessionObserver) -> usize {
        let user_index = self.session.push(ChatMessage::user(query));
        observer.on_event(&SessionEvent::UserAppended { index: user_index }, &self.session);

        let assistant_index = self.session.push(ChatMessage::assistant(placeholder));
        observer.on_event(&SessionEvent::AssistantPlaceholder { index: assistant_index }, &self.session);

        self.persist();
        assistant_index
    }

    fn set_loading(&mut self, loading: bool, observer: &mut dyn SessionObserver) {
        self.loading = loading;
        observer.on_event(&SessionEvent::LoadingChanged(loading), &self.session);
    }

    fn emit_document_mode(&self, observer: &mut dyn SessionObserver) {
        observer.on_event(
            &SessionEvent::DocumentModeChanged { active_doc_ids: self.session.active_doc_ids.clone() },
            &self.session,
        );
    }

    fn persist(&mut self) {
        if self.session.is_empty() {
            return;
        }
        match self.store.save_chat(&self.session) {
            Ok(stamp) => self.session.timestamp = stamp,
            Err(e) => error!("Error saving chat {}: {:#}", self.session.id, e),
        }
    }
}
