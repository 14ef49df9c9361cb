use std::rc::Rc;

use crate::bytecode::Instructions;
use crate::lang::value::CompiledFunction;

/// One function activation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub function: Rc<CompiledFunction>,

    /// Offset of the next byte to fetch
    pub ip: usize,

    /// First stack slot of this call's locals
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(function: Rc<CompiledFunction>, base_pointer: usize) -> Self {
        Self {
            function,
            ip: 0,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.function.instructions
    }

    pub fn is_finished(&self) -> bool {
        self.ip >= self.function.instructions.len()
    }
}
