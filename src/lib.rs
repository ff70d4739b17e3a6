//! Hydrolix Assistant conversation engine
//!
//! Client, state and orchestration for chatting with the Hydrolix query
//! assistant about the query currently in the editor.

pub mod client;
pub mod config;
pub mod context;
pub mod conversation;
pub mod markdown;
