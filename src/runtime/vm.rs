use std::rc::Rc;

use crate::bytecode::{Bytecode, Opcode, op};
use crate::lang::value::{CompiledFunction, HashObject, Value};
use crate::runtime::config::VmConfig;
use crate::runtime::frame::Frame;
use crate::runtime::runtime_error::{
    RuntimeError, division_by_zero, frame_overflow, malformed, stack_overflow, stack_underflow,
    unsupported_binary, unusable_hash_key,
};

pub struct Vm {
    config: VmConfig,
    constants: Vec<Value>,

    /// Fixed-capacity operand stack; `sp` is one past the logical top.
    stack: Vec<Value>,
    sp: usize,

    globals: Vec<Value>,

    /// Active calls; the first entry wraps the top-level instructions.
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_config(bytecode, VmConfig::default())
    }

    pub fn with_config(bytecode: Bytecode, config: VmConfig) -> Self {
        let main = Rc::new(CompiledFunction::new(bytecode.instructions, 0, 0));

        let mut frames = Vec::with_capacity(config.max_frames.min(64));
        frames.push(Frame::new(main, 0));

        Self {
            stack: vec![Value::Null; config.stack_size],
            sp: 0,
            globals: vec![Value::Null; config.globals_size],
            constants: bytecode.constants,
            frames,
            config,
        }
    }

    /// Continue with globals left behind by an earlier run.
    pub fn with_globals(mut self, mut globals: Vec<Value>) -> Self {
        globals.resize(self.config.globals_size, Value::Null);
        self.globals = globals;
        self
    }

    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    pub fn stack_top(&self) -> Option<&Value> {
        self.sp.checked_sub(1).map(|top| &self.stack[top])
    }

    /// The value most recently removed by `OpPop`, i.e. the result of the
    /// last top-level expression statement.
    pub fn last_popped_stack_elem(&self) -> Value {
        self.stack.get(self.sp).cloned().unwrap_or(Value::Null)
    }

    /// Execute until the main instruction stream is exhausted.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            match self.step() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => return Err(self.attach_call_stack(err)),
            }
        }
    }

    // Dispatch

    /// Execute one instruction. Returns `false` once the program is done.
    fn step(&mut self) -> Result<bool, RuntimeError> {
        let frame = self.current_frame()?;
        if frame.is_finished() {
            if self.frames.len() > 1 {
                return Err(malformed("function body ended without a return"));
            }
            return Ok(false);
        }

        let ip = frame.ip;
        let op = Opcode::try_from(frame.instructions()[ip])?;
        self.current_frame_mut()?.ip += 1;

        log::trace!("{:04} {:<16} sp={}", ip, op.name(), self.sp);

        match op {
            Opcode::Constant => {
                let index = self.read_u16()?;
                let value = self
                    .constants
                    .get(index)
                    .cloned()
                    .ok_or_else(|| malformed(format!("constant {} out of range", index)))?;
                self.push(value)?;
            }

            Opcode::Pop => {
                self.pop()?;
            }

            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                self.execute_binary_operation(op)?;
            }

            Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                self.execute_comparison(op)?;
            }

            Opcode::Bang => {
                let operand = self.pop()?;
                let result = match operand {
                    Value::Boolean(b) => !b,
                    Value::Null => true,
                    _ => false,
                };
                self.push(Value::Boolean(result))?;
            }

            Opcode::Minus => match self.pop()? {
                Value::Integer(n) => self.push(Value::Integer(n.wrapping_neg()))?,
                other => {
                    return Err(RuntimeError::new(&format!(
                        "unsupported type for negation: {}",
                        other.type_name()
                    )));
                }
            },

            Opcode::True => self.push(Value::Boolean(true))?,
            Opcode::False => self.push(Value::Boolean(false))?,
            Opcode::Null => self.push(Value::Null)?,

            Opcode::Jump => {
                let target = self.read_u16()?;
                self.jump_to(target)?;
            }

            Opcode::JumpNotTruthy => {
                let target = self.read_u16()?;
                let condition = self.pop()?;
                if !condition.is_truthy() {
                    self.jump_to(target)?;
                }
            }

            Opcode::SetGlobal => {
                let index = self.read_u16()?;
                let value = self.pop()?;
                let slot = self
                    .globals
                    .get_mut(index)
                    .ok_or_else(|| malformed(format!("global {} out of range", index)))?;
                *slot = value;
            }

            Opcode::GetGlobal => {
                let index = self.read_u16()?;
                let value = self
                    .globals
                    .get(index)
                    .cloned()
                    .ok_or_else(|| malformed(format!("global {} out of range", index)))?;
                self.push(value)?;
            }

            Opcode::SetLocal => {
                let index = self.read_u8()?;
                let slot = self.local_slot(index)?;
                let value = self.pop()?;
                self.stack[slot] = value;
            }

            Opcode::GetLocal => {
                let index = self.read_u8()?;
                let slot = self.local_slot(index)?;
                let value = self.stack[slot].clone();
                self.push(value)?;
            }

            Opcode::Array => {
                let count = self.read_u16()?;
                let elements = self.take_top(count)?;
                self.push(Value::array(elements))?;
            }

            Opcode::Hash => {
                let count = self.read_u16()?;
                let items = self.take_top(count)?;
                let hash = build_hash(items)?;
                self.push(Value::Hash(Rc::new(hash)))?;
            }

            Opcode::Index => {
                let index = self.pop()?;
                let left = self.pop()?;
                let value = execute_index_expression(&left, &index)?;
                self.push(value)?;
            }

            Opcode::Call => {
                let argc = self.read_u8()?;
                self.call_function(argc)?;
            }

            Opcode::ReturnValue => {
                let value = self.pop()?;
                return self.return_from_call(value);
            }

            Opcode::Return => return self.return_from_call(Value::Null),
        }

        Ok(true)
    }

    // Operators

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                Value::Integer(integer_arithmetic(op, *l, *r)?)
            }
            (Value::String(l), Value::String(r)) if op == Opcode::Add => {
                let mut joined = String::with_capacity(l.len() + r.len());
                joined.push_str(l);
                joined.push_str(r);
                Value::String(Rc::from(joined))
            }
            (Value::String(_), Value::String(_)) => {
                return Err(RuntimeError::new(&format!(
                    "unknown string operator: {}",
                    op.name()
                )));
            }
            _ => {
                return Err(unsupported_binary(
                    op.name(),
                    left.type_name(),
                    right.type_name(),
                ));
            }
        };

        self.push(result)
    }

    /// Integers compare numerically, everything else by identity.
    fn execute_comparison(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (op, &left, &right) {
            (Opcode::GreaterThan, Value::Integer(l), Value::Integer(r)) => l > r,
            (Opcode::Equal, _, _) => left.is_same_object(&right),
            (Opcode::NotEqual, _, _) => !left.is_same_object(&right),
            _ => {
                return Err(RuntimeError::new(&format!(
                    "unknown operator: {} ({} {})",
                    op.name(),
                    left.type_name(),
                    right.type_name()
                )));
            }
        };

        self.push(Value::Boolean(result))
    }

    // Calls

    fn call_function(&mut self, argc: usize) -> Result<(), RuntimeError> {
        if self.sp < argc + 1 {
            return Err(stack_underflow());
        }

        let function = match &self.stack[self.sp - 1 - argc] {
            Value::Function(f) => Rc::clone(f),
            other => {
                return Err(RuntimeError::new(&format!(
                    "calling non-function: {}",
                    other.type_name()
                )));
            }
        };

        if argc != function.num_parameters {
            return Err(RuntimeError::new(&format!(
                "wrong number of arguments: want={}, got={}",
                function.num_parameters, argc
            )));
        }
        if function.num_locals < function.num_parameters {
            return Err(malformed("function reserves fewer locals than parameters"));
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(frame_overflow(self.config.max_frames));
        }

        let base_pointer = self.sp - argc;
        let new_sp = base_pointer
            .checked_add(function.num_locals)
            .filter(|&sp| sp <= self.stack.len())
            .ok_or_else(|| stack_overflow(self.stack.len()))?;

        // Locals beyond the arguments start out null.
        for slot in &mut self.stack[self.sp..new_sp] {
            *slot = Value::Null;
        }

        log::debug!(
            "call: depth {} argc {} base {} locals {}",
            self.frames.len(),
            argc,
            base_pointer,
            function.num_locals
        );

        self.frames.push(Frame::new(function, base_pointer));
        self.sp = new_sp;
        Ok(())
    }

    fn return_from_call(&mut self, value: Value) -> Result<bool, RuntimeError> {
        // `return` at top level ends the program; a popped value stays
        // readable as the last popped element.
        if self.frames.len() == 1 {
            return Ok(false);
        }

        let frame = self.frames.pop().ok_or_else(stack_underflow)?;
        self.sp = frame.base_pointer.checked_sub(1).ok_or_else(stack_underflow)?;

        log::debug!("return: depth {} sp {}", self.frames.len(), self.sp);

        self.push(value)?;
        Ok(true)
    }

    // Frames and operands

    fn current_frame(&self) -> Result<&Frame, RuntimeError> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::new("no active frame"))
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::new("no active frame"))
    }

    fn read_u16(&mut self) -> Result<usize, RuntimeError> {
        self.read_operand(2)
    }

    fn read_u8(&mut self) -> Result<usize, RuntimeError> {
        self.read_operand(1)
    }

    fn read_operand(&mut self, width: usize) -> Result<usize, RuntimeError> {
        let frame = self.current_frame_mut()?;
        let start = frame.ip;

        let bytes = frame
            .function
            .instructions
            .get(start..start + width)
            .ok_or_else(|| malformed(format!("operand at {:04} runs past the end", start)))?;
        let value = match width {
            1 => op::read_u8(bytes) as usize,
            _ => op::read_u16(bytes) as usize,
        };

        frame.ip += width;
        Ok(value)
    }

    fn jump_to(&mut self, target: usize) -> Result<(), RuntimeError> {
        let frame = self.current_frame_mut()?;
        if target > frame.instructions().len() {
            return Err(malformed(format!("jump target {:04} out of range", target)));
        }
        frame.ip = target;
        Ok(())
    }

    fn local_slot(&self, index: usize) -> Result<usize, RuntimeError> {
        let frame = self.current_frame()?;
        if index >= frame.function.num_locals {
            return Err(malformed(format!("local {} out of range", index)));
        }
        Ok(frame.base_pointer + index)
    }

    // Stack

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.sp >= self.stack.len() {
            return Err(stack_overflow(self.stack.len()));
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.sp == 0 {
            return Err(stack_underflow());
        }
        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    /// Remove the top `count` values, bottom-most first.
    fn take_top(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let start = self.sp.checked_sub(count).ok_or_else(stack_underflow)?;
        let items = self.stack[start..self.sp].to_vec();
        self.sp = start;
        Ok(items)
    }

    fn attach_call_stack(&self, err: RuntimeError) -> RuntimeError {
        if self.frames.len() < 2 {
            return err;
        }

        self.frames
            .iter()
            .enumerate()
            .fold(err, |err, (depth, frame)| {
                let label = if depth == 0 {
                    "main".to_string()
                } else {
                    format!("fn#{} ({} params)", depth, frame.function.num_parameters)
                };
                err.with_context(&format!("{} at {:04}", label, frame.ip))
            })
    }
}

fn integer_arithmetic(op: Opcode, left: i64, right: i64) -> Result<i64, RuntimeError> {
    match op {
        Opcode::Add => Ok(left.wrapping_add(right)),
        Opcode::Sub => Ok(left.wrapping_sub(right)),
        Opcode::Mul => Ok(left.wrapping_mul(right)),
        Opcode::Div if right == 0 => Err(division_by_zero()),
        Opcode::Div => Ok(left.wrapping_div(right)),
        _ => Err(RuntimeError::new(&format!(
            "unknown integer operator: {}",
            op.name()
        ))),
    }
}

fn build_hash(items: Vec<Value>) -> Result<HashObject, RuntimeError> {
    if items.len() % 2 != 0 {
        return Err(malformed("hash literal with an odd number of elements"));
    }

    let mut hash = HashObject::default();
    let mut items = items.into_iter();
    while let (Some(key), Some(value)) = (items.next(), items.next()) {
        let type_name = key.type_name();
        if !hash.insert(key, value) {
            return Err(unusable_hash_key(type_name));
        }
    }
    Ok(hash)
}

fn execute_index_expression(left: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (left, index) {
        (Value::Array(items), Value::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Hash(hash), key) => {
            if key.hash_key().is_none() {
                return Err(unusable_hash_key(key.type_name()));
            }
            Ok(hash.get(key).cloned().unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::new(&format!(
            "index operator not supported: {}[{}]",
            left.type_name(),
            index.type_name()
        ))),
    }
}
