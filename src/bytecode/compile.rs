use std::rc::Rc;

use crate::{
    bytecode::{
        Bytecode, Instructions, Opcode,
        compile_error::CompileError,
        op::make,
        symbol_table::{SymbolScope, SymbolTable},
    },
    lang::{
        node::{Block, Expression, Program, Statement},
        value::{CompiledFunction, Value},
    },
};

/// Placeholder operand for jumps whose target is not known yet.
const UNPATCHED_JUMP: usize = 9999;

#[derive(Debug, Clone, Copy, PartialEq)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Instruction buffer for one nesting level: the program itself, or the body
/// of a function literal being compiled.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    /// Constant pool shared by every scope.
    constants: Vec<Value>,

    symbol_table: SymbolTable,

    /// Scope currently receiving instructions
    scope: CompilationScope,

    /// Suspended outer scopes, innermost last
    enclosing: Vec<CompilationScope>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_symbol_table(SymbolTable::new())
    }

    /// Start from existing global definitions, e.g. those of earlier REPL lines.
    pub fn with_symbol_table(symbol_table: SymbolTable) -> Self {
        Self {
            constants: Vec::new(),
            symbol_table,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
        }
    }

    pub fn into_symbol_table(self) -> SymbolTable {
        self.symbol_table
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode::new(self.scope.instructions.clone(), self.constants.clone())
    }

    pub fn into_bytecode(self) -> Bytecode {
        Bytecode::new(self.scope.instructions, self.constants)
    }

    /// Compile a whole program into the top-level scope.
    ///
    /// On error the compiler keeps whatever it emitted and defined so far.
    pub fn compile_program(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[])?;
            }

            Statement::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index])?,
                    SymbolScope::Local => self.emit(Opcode::SetLocal, &[symbol.index])?,
                };
            }

            Statement::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[])?;
            }
        }

        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::Integer(n) => {
                let index = self.add_constant(Value::Integer(*n))?;
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::String(s) => {
                let index = self.add_constant(Value::string(s))?;
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::Boolean(true) => {
                self.emit(Opcode::True, &[])?;
            }
            Expression::Boolean(false) => {
                self.emit(Opcode::False, &[])?;
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "-" => self.emit(Opcode::Minus, &[])?,
                    "!" => self.emit(Opcode::Bang, &[])?,
                    _ => return Err(CompileError::UnknownPrefixOperator(operator.clone())),
                };
            }

            Expression::Infix {
                left,
                operator,
                right,
            } => {
                // `a < b` is compiled as `b > a`
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[])?;
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;

                let op = match operator.as_str() {
                    "+" => Opcode::Add,
                    "-" => Opcode::Sub,
                    "*" => Opcode::Mul,
                    "/" => Opcode::Div,
                    ">" => Opcode::GreaterThan,
                    "==" => Opcode::Equal,
                    "!=" => Opcode::NotEqual,
                    _ => return Err(CompileError::UnknownInfixOperator(operator.clone())),
                };
                self.emit(op, &[])?;
            }

            Expression::Identifier(name) => {
                let (scope, index) = self
                    .symbol_table
                    .resolve(name)
                    .map(|symbol| (symbol.scope, symbol.index))
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;

                match scope {
                    SymbolScope::Global => self.emit(Opcode::GetGlobal, &[index])?,
                    // Resolved through an outer function's table.
                    SymbolScope::Local if !self.symbol_table.defines(name) => {
                        return Err(CompileError::capture(name));
                    }
                    SymbolScope::Local => self.emit(Opcode::GetLocal, &[index])?,
                };
            }

            Expression::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()])?;
            }

            Expression::Hash(pairs) => {
                // Fixed key order keeps the emitted code reproducible.
                let mut sorted: Vec<&(Expression, Expression)> = pairs.iter().collect();
                sorted.sort_by_cached_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2])?;
            }

            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[])?;
            }

            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,

            Expression::Function { parameters, body } => {
                self.compile_function(parameters, body)?;
            }

            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()])?;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Jump-based control flow
    // =========================================================================

    /// Emits:
    /// ```text
    ///   <condition>
    ///   OpJumpNotTruthy  else
    ///   <consequence>         ; trailing OpPop stripped
    ///   OpJump           end
    /// else:
    ///   <alternative>         ; or OpNull when absent
    /// end:
    /// ```
    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;

        let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[UNPATCHED_JUMP])?;

        self.compile_branch(consequence)?;

        let jump_pos = self.emit(Opcode::Jump, &[UNPATCHED_JUMP])?;

        let after_consequence = self.scope.instructions.len();
        self.change_operand(jump_not_truthy_pos, Opcode::JumpNotTruthy, after_consequence)?;

        match alternative {
            None => {
                self.emit(Opcode::Null, &[])?;
            }
            Some(alternative) => {
                self.compile_branch(alternative)?;
            }
        }

        let after_alternative = self.scope.instructions.len();
        self.change_operand(jump_pos, Opcode::Jump, after_alternative)?;

        Ok(())
    }

    /// Compile one arm of a conditional so that it leaves exactly one value.
    fn compile_branch(&mut self, block: &Block) -> Result<(), CompileError> {
        self.compile_block(block)?;

        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        } else if !self.last_instruction_is(Opcode::ReturnValue) {
            // Empty block, or one ending in `let`.
            self.emit(Opcode::Null, &[])?;
        }
        Ok(())
    }

    // =========================================================================
    // Function literals
    // =========================================================================

    fn compile_function(&mut self, parameters: &[String], body: &Block) -> Result<(), CompileError> {
        self.enter_scope();

        let body_result = self.compile_function_body(parameters, body);
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();
        body_result?;

        let function = CompiledFunction::new(instructions, num_locals, parameters.len());
        let index = self.add_constant(Value::Function(Rc::new(function)))?;
        self.emit(Opcode::Constant, &[index])?;

        Ok(())
    }

    fn compile_function_body(
        &mut self,
        parameters: &[String],
        body: &Block,
    ) -> Result<(), CompileError> {
        for parameter in parameters {
            self.symbol_table.define(parameter);
        }

        self.compile_block(body)?;

        // The value of the last expression statement is the implicit result.
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return()?;
        }
        // Empty body, or one ending in something that leaves no value.
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[])?;
        }

        Ok(())
    }

    fn enter_scope(&mut self) {
        let outer_scope = std::mem::take(&mut self.scope);
        self.enclosing.push(outer_scope);

        let outer_table = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::new_enclosed(outer_table);

        log::debug!("enter scope (depth {})", self.enclosing.len());
    }

    fn leave_scope(&mut self) -> Instructions {
        let outer_scope = self.enclosing.pop().unwrap_or_default();
        let inner = std::mem::replace(&mut self.scope, outer_scope);

        if let Some(outer_table) = self.symbol_table.take_outer() {
            self.symbol_table = outer_table;
        }

        log::debug!(
            "leave scope (depth {}, {} bytes)",
            self.enclosing.len(),
            inner.instructions.len()
        );
        inner.instructions
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        let index = self.constants.len();
        if index > u16::MAX as usize {
            return Err(CompileError::TooManyConstants(index + 1));
        }
        self.constants.push(value);
        Ok(index)
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> Result<usize, CompileError> {
        let instruction = make(op, operands)?;
        let position = self.scope.instructions.push(&instruction);
        log::trace!("emit {:04} {} {:?}", position, op.name(), operands);

        self.set_last_instruction(op, position);
        Ok(position)
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        self.scope.previous_instruction = self.scope.last_instruction;
        self.scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        matches!(self.scope.last_instruction, Some(last) if last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last_instruction {
            self.scope.instructions.truncate(last.position);
            self.scope.last_instruction = self.scope.previous_instruction;
        }
    }

    fn replace_last_pop_with_return(&mut self) -> Result<(), CompileError> {
        if let Some(last) = self.scope.last_instruction.as_mut() {
            let ret = make(Opcode::ReturnValue, &[])?;
            self.scope.instructions.replace(last.position, &ret);
            last.opcode = Opcode::ReturnValue;
        }
        Ok(())
    }

    /// Re-encode the whole `op` instruction at `op_pos` with a new operand.
    fn change_operand(
        &mut self,
        op_pos: usize,
        op: Opcode,
        operand: usize,
    ) -> Result<(), CompileError> {
        let instruction = make(op, &[operand])?;
        self.scope.instructions.replace(op_pos, &instruction);
        Ok(())
    }
}
