//! Subsystem modules for the parley bot.

pub mod chat;
pub mod comms;
pub mod runtime;
