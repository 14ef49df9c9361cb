use std::io::{self, BufRead, Write};

use crate::bytecode::Bytecode;
use crate::bytecode::compile::Compiler;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::symbol_table::SymbolTable;
use crate::frontend::lexer::{Lexer, LexerError};
use crate::frontend::parser::Parser;
use crate::frontend::parser_error::ParserError;
use crate::lang::node::Program;
use crate::lang::value::Value;
use crate::runtime::config::VmConfig;
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::vm::Vm;

const PROMPT: &str = ">> ";

/// Any failure on the way from source text to a value.
#[derive(Debug)]
pub enum EvalError {
    Lex(LexerError),
    Parse(ParserError),
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Lex(e) => write!(f, "lexer error: {}", e),
            EvalError::Parse(e) => write!(f, "parse error: {}", e),
            EvalError::Compile(e) => write!(f, "{}", e),
            EvalError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<LexerError> for EvalError {
    fn from(err: LexerError) -> Self {
        EvalError::Lex(err)
    }
}

impl From<ParserError> for EvalError {
    fn from(err: ParserError) -> Self {
        EvalError::Parse(err)
    }
}

impl From<CompileError> for EvalError {
    fn from(err: CompileError) -> Self {
        EvalError::Compile(err)
    }
}

impl From<RuntimeError> for EvalError {
    fn from(err: RuntimeError) -> Self {
        EvalError::Runtime(err)
    }
}

pub fn parse(source: &str) -> Result<Program, EvalError> {
    let tokens = Lexer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

/// Global names and values carried from one evaluation to the next.
pub struct Session {
    config: VmConfig,
    symbol_table: SymbolTable,
    globals: Vec<Value>,
}

impl Session {
    pub fn new(config: VmConfig) -> Self {
        Self {
            config,
            symbol_table: SymbolTable::new(),
            globals: Vec::new(),
        }
    }

    /// Compile against the session's globals.
    ///
    /// A failed compile leaves the known names exactly as they were.
    pub fn compile(&mut self, program: &Program) -> Result<Bytecode, EvalError> {
        let snapshot = self.symbol_table.clone();

        let mut compiler = Compiler::with_symbol_table(std::mem::take(&mut self.symbol_table));
        let result = compiler.compile_program(program);
        let bytecode = compiler.bytecode();
        self.symbol_table = compiler.into_symbol_table();

        if let Err(err) = result {
            log::debug!("compile failed, restoring {} global names", snapshot.num_definitions());
            self.symbol_table = snapshot;
            return Err(err.into());
        }
        Ok(bytecode)
    }

    /// Run `bytecode` and return the last popped value. Globals assigned
    /// before a runtime error are kept.
    pub fn execute(&mut self, bytecode: Bytecode) -> Result<Value, EvalError> {
        let mut vm = Vm::with_config(bytecode, self.config.clone())
            .with_globals(std::mem::take(&mut self.globals));

        let result = vm.run();
        let value = vm.last_popped_stack_elem();
        self.globals = vm.into_globals();

        result?;
        Ok(value)
    }

    pub fn eval(&mut self, source: &str) -> Result<Value, EvalError> {
        let program = parse(source)?;
        let bytecode = self.compile(&program)?;
        self.execute(bytecode)
    }
}

/// Read-eval-print loop over stdin until EOF.
pub fn start(config: VmConfig) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = Session::new(config);

    println!("Monkey bytecode REPL. Ctrl-D to exit.");

    loop {
        print!("{}", PROMPT);
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        match session.eval(&line) {
            Ok(value) => println!("{}", value),
            Err(e) => eprintln!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(VmConfig::default())
    }

    #[test]
    fn test_globals_persist_across_lines() {
        let mut s = session();
        s.eval("let a = 10;").unwrap();
        s.eval("let b = a * 2;").unwrap();
        assert_eq!(s.eval("a + b").unwrap(), Value::Integer(30));
    }

    #[test]
    fn test_functions_persist_across_lines() {
        let mut s = session();
        s.eval("let add = fn(x, y) { x + y };").unwrap();
        assert_eq!(s.eval("add(2, 3)").unwrap(), Value::Integer(5));
    }

    #[test]
    fn test_compile_error_does_not_leak_definitions() {
        let mut s = session();
        s.eval("let a = 1;").unwrap();

        let err = s.eval("let b = 2; let c = nope;").unwrap_err();
        assert!(matches!(err, EvalError::Compile(CompileError::UndefinedVariable(_))));

        // `b` was rolled back along with the failed line.
        assert!(matches!(s.eval("b").unwrap_err(), EvalError::Compile(_)));
        // Slot numbering continues where the last good line left off.
        s.eval("let d = 4;").unwrap();
        assert_eq!(s.eval("a + d").unwrap(), Value::Integer(5));
    }

    #[test]
    fn test_runtime_error_keeps_earlier_globals() {
        let mut s = session();
        let err = s.eval("let a = 5; let b = a / 0;").unwrap_err();
        assert!(err.to_string().contains("division by zero"));

        assert_eq!(s.eval("a").unwrap(), Value::Integer(5));
        assert_eq!(s.eval("b").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_error_reported_with_location() {
        let err = session().eval("let = 1;").unwrap_err();
        assert!(matches!(err, EvalError::Parse(_)));
        assert!(err.to_string().starts_with("parse error: 1:5:"));
    }
}
