//! Transaction preparation and confirmation engine.
//!
//! Natural-language front ends hand structured actions to an [`dispatcher::ActionDispatcher`].
//! Preparations validate input, simulate against chain state and park at most one
//! operation per session until the user confirms or denies it. Confirmed operations go to
//! the wallet signer; submitted transactions are tracked to settlement on status cards.

pub mod abi;
pub mod action;
pub mod cards;
pub mod chain;
pub mod compiler;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod market;
pub mod network;
pub mod preparer;
pub mod queries;
pub mod registry;
pub mod sentinel;
pub mod sig_down;
pub mod slot;
pub mod telemetry;
pub mod validation;
pub mod wallet;
pub mod watcher;
