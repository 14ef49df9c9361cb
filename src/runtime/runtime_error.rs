use crate::bytecode::op::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
    pub call_stack: Vec<String>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)?;

        if !self.call_stack.is_empty() {
            write!(f, "\n  call stack:")?;

            for (i, frame) in self.call_stack.iter().rev().enumerate() {
                write!(f, "\n    {}: {}", i, frame)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    pub fn new(msg: &str) -> Self {
        RuntimeError {
            message: msg.to_string(),
            call_stack: Vec::new(),
        }
    }

    /// Record one enclosing activation, outermost first.
    pub fn with_context(mut self, context: &str) -> Self {
        self.call_stack.push(context.to_string());
        self
    }
}

impl From<DecodeError> for RuntimeError {
    fn from(err: DecodeError) -> Self {
        RuntimeError::new(&format!("malformed bytecode: {}", err))
    }
}

pub fn stack_overflow(capacity: usize) -> RuntimeError {
    RuntimeError::new(&format!("stack overflow ({} slots)", capacity))
}

pub fn stack_underflow() -> RuntimeError {
    RuntimeError::new("stack underflow")
}

pub fn frame_overflow(max_frames: usize) -> RuntimeError {
    RuntimeError::new(&format!(
        "frame overflow: more than {} active calls - possible infinite recursion",
        max_frames
    ))
}

pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

pub fn unsupported_binary(op: &str, left: &str, right: &str) -> RuntimeError {
    RuntimeError::new(&format!(
        "unsupported types for {}: {} {}",
        op, left, right
    ))
}

pub fn unusable_hash_key(type_name: &str) -> RuntimeError {
    RuntimeError::new(&format!("unusable as hash key: {}", type_name))
}

pub fn malformed(detail: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::new(&format!("malformed bytecode: {}", detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_call_stack() {
        assert_eq!(division_by_zero().to_string(), "runtime error: division by zero");
    }

    #[test]
    fn test_display_lists_innermost_frame_first() {
        let err = RuntimeError::new("boom")
            .with_context("main at 0009")
            .with_context("fn#1 at 0003");

        assert_eq!(
            err.to_string(),
            "runtime error: boom\n  call stack:\n    0: fn#1 at 0003\n    1: main at 0009"
        );
    }

    #[test]
    fn test_decode_error_converts() {
        let err: RuntimeError = DecodeError::UnknownOpcode(77).into();
        assert_eq!(err.message, "malformed bytecode: opcode 77 undefined");
    }

    #[test]
    fn test_helper_messages() {
        assert!(unsupported_binary("OpAdd", "INTEGER", "STRING")
            .message
            .contains("INTEGER STRING"));
        assert!(unusable_hash_key("ARRAY").message.contains("ARRAY"));
        assert!(frame_overflow(4).message.contains("4 active calls"));
    }
}
