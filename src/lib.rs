//! A tiny interactive command shell with dynamically loaded plugins.
//!
//! This crate provides the building blocks of a minimal shell: a tokenizer
//! that turns one input line into a bounded argument vector, a dispatcher
//! that routes the command name to a built-in, a registered plugin, or an
//! external program, a registry of dynamically loaded plugin modules, and a
//! child-process runner for everything else. It is intentionally small and
//! easy to read.
//!
//! The main entry point is [`Interpreter`], which dispatches lines with a
//! set of pluggable factories and drives the interactive loop. The public
//! modules [`command`], [`env`], [`lexer`] and [`plugin`] expose the traits
//! and types for implementing your own commands, inspecting the persistent
//! shell state, and talking to plugin modules.

mod builtin;
pub mod command;
pub mod env;
mod external;
mod interpreter;
pub mod lexer;
pub mod plugin;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
