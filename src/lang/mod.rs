//! # Monkey language data
//!
//! Types shared by every stage of the pipeline: the AST produced by the
//! parser and consumed by the compiler, and the runtime values that live in
//! the constant pool and on the VM's operand stack.

pub mod node;
pub mod value;
