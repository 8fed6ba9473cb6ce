//! API endpoint modules.

pub mod health;
pub mod preset;
pub mod promptlist;
pub mod ws;
