use crate::bytecode::op::{self, Definition, DecodeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// A flat, byte-encoded instruction stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an encoded instruction, returning its starting offset.
    pub fn push(&mut self, instruction: &[u8]) -> usize {
        let pos = self.0.len();
        self.0.extend_from_slice(instruction);
        pos
    }

    /// Overwrite bytes in place starting at `pos`.
    pub fn replace(&mut self, pos: usize, instruction: &[u8]) {
        self.0[pos..pos + instruction.len()].copy_from_slice(instruction);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode the instruction starting at `pos`.
    pub fn decode_at(
        &self,
        pos: usize,
    ) -> Result<(&'static Definition, Vec<usize>, usize), DecodeError> {
        let def = op::lookup(self.0[pos])?;
        let (operands, read) = op::read_operands(def, &self.0[pos + 1..])?;
        Ok((def, operands, 1 + read))
    }

    /// Offsets of every instruction in the stream, in order.
    pub fn boundaries(&self) -> Result<Vec<usize>, DecodeError> {
        let mut offsets = Vec::new();
        let mut pos = 0;
        while pos < self.0.len() {
            offsets.push(pos);
            let (_, _, len) = self.decode_at(pos)?;
            pos += len;
        }
        Ok(offsets)
    }

    fn fmt_instruction(def: &Definition, operands: &[usize]) -> String {
        let expected = def.operand_widths.len();
        if operands.len() != expected {
            return format!(
                "ERROR: operand len {} does not match defined {}",
                operands.len(),
                expected
            );
        }

        match operands {
            [] => def.name.to_string(),
            [a] => format!("{} {}", def.name, a),
            _ => {
                let rendered: Vec<String> = operands.iter().map(|o| o.to_string()).collect();
                format!("{} {}", def.name, rendered.join(" "))
            }
        }
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromIterator<Vec<u8>> for Instructions {
    /// Concatenate already-encoded instructions.
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

impl Deref for Instructions {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Instructions {
    /// Human-readable listing, one `NNNN OpName operands` line per instruction.
    ///
    /// An undecodable byte ends the listing with an `ERROR:` line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pos = 0;
        while pos < self.0.len() {
            match self.decode_at(pos) {
                Ok((def, operands, len)) => {
                    writeln!(f, "{:04} {}", pos, Self::fmt_instruction(def, &operands))?;
                    pos += len;
                }
                Err(e) => {
                    writeln!(f, "{:04} ERROR: {}", pos, e)?;
                    break;
                }
            }
        }
        Ok(())
    }
}
