//! Script line tokenization
//!
//! This crate handles:
//! - Quote- and bracket-aware scanning of single script lines
//! - Recognizing MySQL UPDATE/INSERT/DELETE/SELECT statements
//! - Recognizing MongoDB shell collection calls
//! - Reporting the target, touched fields and values written or compared
//! - Checking statements for missing clauses and mis-shaped call arguments

pub mod lexer;
mod mongo;
mod mysql;
pub mod shape;
pub mod tokenizer;

pub use shape::{check_shape, ShapeViolation};
pub use tokenizer::{tokenize, Assignment, Tokenized};
