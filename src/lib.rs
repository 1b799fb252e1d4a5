//! A from-scratch toolchain for a small agent-based market simulation DSL:
//! a regular-expression engine (AST -> NFA -> DFA by powerset construction,
//! with named captures), a general LR(1) parser generator, a lexer built on
//! the regex engine, a typed language AST, a static semantic checker, and a
//! tree-walking interpreter with host/native interop.
//!
//! # Pipeline
//!
//! ```text
//! dsl::build_grammar()        -- the concrete DSL's Grammar (grammar module)
//!   -> lr::build()            -- canonical LR(1) table (shift/reduce/goto)
//!   -> dsl::build_lexer_table -- token rules compiled through the regex engine
//!   -> lexer::tokenize        -- source text -> Token stream
//!   -> lr::parse              -- Token stream -> ast::AstNode (via ast::DslAst)
//!   -> semantic::SemanticStaticChecker::check
//!   -> interpreter::{eval_expr, exec_stmt, ...}
//! ```
//!
//! `dsl::parse_source` wires tokenize -> parse into one call; `simulation::
//! interpret_simulation` carries that all the way through static checking and
//! agent wrapping, matching the external driver contract this crate exposes
//! to a host (see the `simulation` module docs).
//!
//! None of the market-tick driver loop, plotting, genetic-algorithm
//! optimization, agent template bodies, probability distributions, CLI, or
//! file I/O live in this crate - those are the host's responsibility. What
//! this crate owns ends at `simulation::interpret_simulation`'s return value.
pub mod ast;
pub mod automaton;
pub mod dsl;
mod error;
pub mod grammar;
pub mod interpreter;
pub mod lexer;
mod log;
pub mod lr;
pub mod regex;
pub mod semantic;
pub mod simulation;

pub use error::CryptosimError;
