//! Source text to AST: lexer, Pratt parser, and the `--tokens` dumper.

pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;
