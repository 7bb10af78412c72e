//! selka, a small IRC server that speaks three protocol dialects.
//!
//! The crate is a thin shell around [`State`], the shared world of
//! connections, users and channels.  `net` owns the sockets and the
//! framing; `selka_tokens` owns the message grammar.  Which commands,
//! modes and nickname spellings exist is decided by the configured
//! [`selka_tokens::Dialect`].

pub use crate::state::State;

pub mod config;
pub mod net;

mod channel;
mod client;
mod lines;
mod state;
mod util;
