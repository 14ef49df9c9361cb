use crate::bytecode::instructions::Instructions;
use crate::lang::value::Value;
use serde::{Deserialize, Serialize};

const MAGIC: &[u8; 4] = b"MKBC";
const FORMAT_VERSION: u8 = 1;

/// A compiled program: the top-level instruction stream plus the constant
/// pool its `OpConstant` operands index into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

#[derive(Debug)]
pub enum BytecodeIoError {
    BadMagic,
    UnsupportedVersion(u8),
    Encode(postcard::Error),
    Decode(postcard::Error),
}

impl std::fmt::Display for BytecodeIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BytecodeIoError::BadMagic => write!(f, "not a bytecode file (bad magic)"),
            BytecodeIoError::UnsupportedVersion(v) => {
                write!(
                    f,
                    "unsupported bytecode format version {} (expected {})",
                    v, FORMAT_VERSION
                )
            }
            BytecodeIoError::Encode(e) => write!(f, "cannot encode bytecode: {}", e),
            BytecodeIoError::Decode(e) => write!(f, "cannot decode bytecode: {}", e),
        }
    }
}

impl std::error::Error for BytecodeIoError {}

impl Bytecode {
    pub fn new(instructions: Instructions, constants: Vec<Value>) -> Self {
        Self {
            instructions,
            constants,
        }
    }

    /// Serialize as `MKBC`, a version byte, then the postcard body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BytecodeIoError> {
        let mut out = Vec::with_capacity(MAGIC.len() + 1);
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        let body = postcard::to_allocvec(self).map_err(BytecodeIoError::Encode)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BytecodeIoError> {
        let body = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or(BytecodeIoError::BadMagic)?;
        let (&version, body) = body.split_first().ok_or(BytecodeIoError::BadMagic)?;
        if version != FORMAT_VERSION {
            return Err(BytecodeIoError::UnsupportedVersion(version));
        }
        postcard::from_bytes(body).map_err(BytecodeIoError::Decode)
    }
}
