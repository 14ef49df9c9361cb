use crate::bytecode::op::EncodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A prefix operator the instruction set has no opcode for
    UnknownPrefixOperator(String),
    /// An infix operator the instruction set has no opcode for
    UnknownInfixOperator(String),
    /// An identifier that no enclosing scope defines
    UndefinedVariable(String),
    /// A reference to a local of an enclosing function
    UnsupportedCapture {
        name: String,
        hint: Option<String>,
    },
    /// More constants than a 2-byte operand can address
    TooManyConstants(usize),
    /// An operand did not fit its instruction (too many locals, arguments, ...)
    Encode(EncodeError),
}

impl CompileError {
    pub fn capture(name: &str) -> Self {
        CompileError::UnsupportedCapture {
            name: name.to_string(),
            hint: Some(
                "closures are not supported; pass the value as an argument instead".to_string(),
            ),
        }
    }
}

impl From<EncodeError> for CompileError {
    fn from(err: EncodeError) -> Self {
        CompileError::Encode(err)
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnknownPrefixOperator(op) => {
                write!(f, "compile error: unknown prefix operator {}", op)
            }
            CompileError::UnknownInfixOperator(op) => {
                write!(f, "compile error: unknown infix operator {}", op)
            }
            CompileError::UndefinedVariable(name) => {
                write!(f, "compile error: undefined variable {}", name)
            }
            CompileError::UnsupportedCapture { name, hint } => {
                write!(
                    f,
                    "compile error: '{}' belongs to an enclosing function",
                    name
                )?;
                if let Some(h) = hint {
                    write!(f, "\n  hint: {}", h)?;
                }
                Ok(())
            }
            CompileError::TooManyConstants(n) => {
                write!(f, "compile error: constant pool overflow ({} constants)", n)
            }
            CompileError::Encode(e) => write!(f, "compile error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}
