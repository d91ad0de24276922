//! Data models for the board service.
//!
//! `board` holds the domain values the store layer works with; `rpc` holds the
//! request/response shapes exchanged over the wire.

mod board;
mod rpc;

pub use board::*;
pub use rpc::*;
