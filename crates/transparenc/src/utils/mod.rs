//! Utilities module - text shaping shared by titles and document cards

pub mod text_utils;

pub use text_utils::TextUtils;
