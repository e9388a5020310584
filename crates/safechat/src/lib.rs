//! A chat assistant that puts every user message through a content safety
//! gate before it reaches the model.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the gated conversation into your own host
//! apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod config;
mod session;

pub use session::{
    CONVERSATION_STARTERS, DEFAULT_SYSTEM_PROMPT, Session, SessionBuilder,
    notice_for,
};

/// Re-exports of [`safechat_core`] crate.
pub mod core {
    pub use safechat_core::*;
}
