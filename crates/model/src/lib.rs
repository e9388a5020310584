//! An abstraction layer for completion engines.
//!
//! This crate establishes an unified protocol for the conversation core
//! to talk to a language model that streams its reply, so that the core
//! can switch between concrete providers without modifying its own code.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
