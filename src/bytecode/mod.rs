pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod instructions;
pub mod ir;
pub mod op;
pub mod symbol_table;

pub use instructions::Instructions;
pub use ir::Bytecode;
pub use op::Opcode;
