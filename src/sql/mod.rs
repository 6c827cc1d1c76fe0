// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The query pipeline: lexer, recursive-descent parser, expression
//! evaluator, nested-loop join and the executing session.

mod ast;
mod eval;
mod executor;
mod joiner;
mod json_path;
mod jq;
mod lexer;
mod parser;

pub use executor::{Gvk, ResourceLister, Results, Row, execute_query};
