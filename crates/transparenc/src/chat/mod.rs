//! Chat module - session state, streaming assembly and the controller

pub mod assembler;
pub mod controller;
pub mod message;
pub mod session;

pub use assembler::{assemble, StreamAssembler, Utf8StreamDecoder};
pub use controller::{ChatController, ChatMode, NoopObserver, SessionEvent, SessionObserver};
pub use message::{ChatMessage, MessageContent, Role, WireMessage};
pub use session::ChatSession;
