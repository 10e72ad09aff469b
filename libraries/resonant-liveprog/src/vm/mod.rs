//! Embedded expression language
//!
//! A small EEL-flavoured language: a script is split into `@init` and
//! `@sample` sections (anything before the first section is header text such
//! as `desc:` lines and property declarations). Every value is an `f64`;
//! `spl0`/`spl1` carry the current stereo frame and `srate` the sample rate.

mod ast;
mod lexer;
mod machine;
mod parser;

pub use machine::{
    ScriptVm, MAX_LOOP_ITERATIONS, MEMORY_SIZE, OUTPUT_CAPACITY, STRING_HANDLE_BASE,
};

use crate::error::Result;
use ast::Expr;

/// Compiled script
#[derive(Debug, Clone)]
pub struct Program {
    variables: Vec<String>,
    strings: Vec<String>,
    init: Option<Expr>,
    sample: Option<Expr>,
}

impl Program {
    /// Compile script source; errors carry the line and column
    pub fn compile(source: &str) -> Result<Self> {
        parser::compile(source)
    }

    /// Variable names in slot order (lowercase)
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }
}
