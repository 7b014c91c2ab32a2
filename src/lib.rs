//! Front end for the lumen expression language: an on-demand tokenizer, a
//! recursive-descent parser with precedence climbing, and the closed AST
//! node model the two of them build.
//!
//! Code generation sits behind the [`codegen::Generate`] capability; the
//! bundled [`codegen::Interpreter`] is one implementation of it.

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
