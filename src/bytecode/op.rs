// =============================================================================
// OP - Opcode table and operand encoding
// =============================================================================
//
// An instruction is `[opcode][operand bytes...]`. Every opcode has a fixed
// list of operand widths; operands are unsigned big-endian.

/// One-byte operation tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // literals
    Constant = 0,
    Pop,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,

    True,
    False,

    // comparison
    Equal,
    NotEqual,
    GreaterThan,

    // prefix
    Minus,
    Bang,

    // control flow, absolute targets
    /// Pop the condition; jump to the target if it is not truthy.
    JumpNotTruthy,
    Jump,

    Null,

    // bindings
    GetGlobal,
    SetGlobal,

    // composites
    Array,
    Hash,
    Index,

    // functions
    Call,
    ReturnValue,
    Return,

    GetLocal,
    SetLocal,
}

/// Name and operand layout of an opcode.
#[derive(Debug, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Definition {
    const fn new(name: &'static str, operand_widths: &'static [usize]) -> Self {
        Self {
            name,
            operand_widths,
        }
    }

    /// Total encoded size, opcode byte included.
    pub fn instruction_len(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

/// Indexed by opcode byte. Order must match the `Opcode` discriminants.
static DEFINITIONS: [Definition; 26] = [
    Definition::new("OpConstant", &[2]),
    Definition::new("OpPop", &[]),
    Definition::new("OpAdd", &[]),
    Definition::new("OpSub", &[]),
    Definition::new("OpMul", &[]),
    Definition::new("OpDiv", &[]),
    Definition::new("OpTrue", &[]),
    Definition::new("OpFalse", &[]),
    Definition::new("OpEqual", &[]),
    Definition::new("OpNotEqual", &[]),
    Definition::new("OpGreaterThan", &[]),
    Definition::new("OpMinus", &[]),
    Definition::new("OpBang", &[]),
    Definition::new("OpJumpNotTruthy", &[2]),
    Definition::new("OpJump", &[2]),
    Definition::new("OpNull", &[]),
    Definition::new("OpGetGlobal", &[2]),
    Definition::new("OpSetGlobal", &[2]),
    Definition::new("OpArray", &[2]),
    Definition::new("OpHash", &[2]),
    Definition::new("OpIndex", &[]),
    Definition::new("OpCall", &[1]),
    Definition::new("OpReturnValue", &[]),
    Definition::new("OpReturn", &[]),
    Definition::new("OpGetLocal", &[1]),
    Definition::new("OpSetLocal", &[1]),
];

const OPCODES: [Opcode; 26] = [
    Opcode::Constant,
    Opcode::Pop,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::True,
    Opcode::False,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterThan,
    Opcode::Minus,
    Opcode::Bang,
    Opcode::JumpNotTruthy,
    Opcode::Jump,
    Opcode::Null,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::Array,
    Opcode::Hash,
    Opcode::Index,
    Opcode::Call,
    Opcode::ReturnValue,
    Opcode::Return,
    Opcode::GetLocal,
    Opcode::SetLocal,
];

impl Opcode {
    pub fn definition(self) -> &'static Definition {
        &DEFINITIONS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    #[cfg(test)]
    pub fn all() -> &'static [Opcode] {
        &OPCODES
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OPCODES
            .get(byte as usize)
            .copied()
            .ok_or(DecodeError::UnknownOpcode(byte))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// `make` was given the wrong number of operands.
    OperandCount {
        opcode: &'static str,
        expected: usize,
        got: usize,
    },
    /// An operand does not fit its slot.
    OperandOverflow {
        opcode: &'static str,
        operand: usize,
        width: usize,
    },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::OperandCount {
                opcode,
                expected,
                got,
            } => write!(
                f,
                "{} takes {} operand(s), got {}",
                opcode, expected, got
            ),
            EncodeError::OperandOverflow {
                opcode,
                operand,
                width,
            } => write!(
                f,
                "operand {} does not fit in {} byte(s) of {}",
                operand, width, opcode
            ),
        }
    }
}

impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOpcode(u8),
    /// The stream ends inside an instruction's operands.
    Truncated {
        opcode: &'static str,
        needed: usize,
        available: usize,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownOpcode(byte) => write!(f, "opcode {} undefined", byte),
            DecodeError::Truncated {
                opcode,
                needed,
                available,
            } => write!(
                f,
                "{} needs {} operand byte(s), only {} left",
                opcode, needed, available
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Resolve an opcode byte to its definition.
pub fn lookup(byte: u8) -> Result<&'static Definition, DecodeError> {
    DEFINITIONS
        .get(byte as usize)
        .ok_or(DecodeError::UnknownOpcode(byte))
}

/// Encode one instruction.
pub fn make(op: Opcode, operands: &[usize]) -> Result<Vec<u8>, EncodeError> {
    let def = op.definition();

    if operands.len() != def.operand_widths.len() {
        return Err(EncodeError::OperandCount {
            opcode: def.name,
            expected: def.operand_widths.len(),
            got: operands.len(),
        });
    }

    let mut instruction = Vec::with_capacity(def.instruction_len());
    instruction.push(op as u8);

    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => {
                let value = u16::try_from(operand).map_err(|_| EncodeError::OperandOverflow {
                    opcode: def.name,
                    operand,
                    width,
                })?;
                instruction.extend_from_slice(&value.to_be_bytes());
            }
            1 => {
                let value = u8::try_from(operand).map_err(|_| EncodeError::OperandOverflow {
                    opcode: def.name,
                    operand,
                    width,
                })?;
                instruction.push(value);
            }
            _ => unreachable!("operand width {} is not in the opcode table", width),
        }
    }

    Ok(instruction)
}

/// Decode the operands of `def` from the bytes that follow its opcode.
///
/// Returns the operand values and how many bytes were consumed.
pub fn read_operands(def: &Definition, ins: &[u8]) -> Result<(Vec<usize>, usize), DecodeError> {
    let needed = def.instruction_len() - 1;
    if ins.len() < needed {
        return Err(DecodeError::Truncated {
            opcode: def.name,
            needed,
            available: ins.len(),
        });
    }

    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for &width in def.operand_widths {
        match width {
            2 => operands.push(read_u16(&ins[offset..]) as usize),
            1 => operands.push(read_u8(&ins[offset..]) as usize),
            _ => unreachable!("operand width {} is not in the opcode table", width),
        }
        offset += width;
    }

    Ok((operands, offset))
}

/// Caller guarantees at least two bytes.
pub fn read_u16(ins: &[u8]) -> u16 {
    u16::from_be_bytes([ins[0], ins[1]])
}

/// Caller guarantees at least one byte.
pub fn read_u8(ins: &[u8]) -> u8 {
    ins[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_make() {
        let cases: Vec<(Opcode, Vec<usize>, Vec<u8>)> = vec![
            (Opcode::Constant, vec![65534], vec![Opcode::Constant as u8, 255, 254]),
            (Opcode::Add, vec![], vec![Opcode::Add as u8]),
            (Opcode::GetLocal, vec![255], vec![Opcode::GetLocal as u8, 255]),
            (Opcode::Call, vec![3], vec![Opcode::Call as u8, 3]),
        ];

        for (op, operands, expected) in cases {
            let instruction = make(op, &operands).unwrap();
            assert_eq!(instruction, expected, "{:?}", op);
        }
    }

    #[test]
    fn test_make_wrong_operand_count() {
        let err = make(Opcode::Constant, &[]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::OperandCount {
                opcode: "OpConstant",
                expected: 1,
                got: 0
            }
        );
        assert!(make(Opcode::Pop, &[1]).is_err());
    }

    #[test]
    fn test_make_operand_overflow() {
        assert!(matches!(
            make(Opcode::Constant, &[65536]),
            Err(EncodeError::OperandOverflow { width: 2, .. })
        ));
        assert!(matches!(
            make(Opcode::SetLocal, &[256]),
            Err(EncodeError::OperandOverflow { width: 1, .. })
        ));
    }

    #[test]
    fn test_lookup_unknown_opcode() {
        assert_eq!(lookup(255), Err(DecodeError::UnknownOpcode(255)));
        assert!(Opcode::try_from(26).is_err());
    }

    #[test]
    fn test_table_matches_discriminants() {
        for (i, op) in Opcode::all().iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(Opcode::try_from(i as u8), Ok(*op));
            assert_eq!(lookup(i as u8).unwrap(), op.definition());
            assert!(op.name().starts_with("Op"));
        }
    }

    #[test]
    fn test_read_operands() {
        let cases: Vec<(Opcode, Vec<usize>, usize)> = vec![
            (Opcode::Constant, vec![65535], 2),
            (Opcode::GetLocal, vec![255], 1),
            (Opcode::Null, vec![], 0),
        ];

        for (op, operands, bytes_read) in cases {
            let instruction = make(op, &operands).unwrap();
            let def = lookup(instruction[0]).unwrap();

            let (read, n) = read_operands(def, &instruction[1..]).unwrap();
            assert_eq!(n, bytes_read);
            assert_eq!(read, operands);
        }
    }

    #[test]
    fn test_read_operands_truncated() {
        let def = Opcode::Jump.definition();
        assert_eq!(
            read_operands(def, &[0]),
            Err(DecodeError::Truncated {
                opcode: "OpJump",
                needed: 2,
                available: 1
            })
        );
    }

    fn arb_instruction() -> impl Strategy<Value = (Opcode, Vec<usize>)> {
        (0..Opcode::all().len()).prop_flat_map(|i| {
            let op = Opcode::all()[i];
            let widths = op.definition().operand_widths;
            let operands: Vec<BoxedStrategy<usize>> = widths
                .iter()
                .map(|&w| (0usize..(1usize << (8 * w))).boxed())
                .collect();
            (Just(op), operands)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Decoding an encoded instruction gives back its operands.
        #[test]
        fn decode_inverts_encode((op, operands) in arb_instruction()) {
            let instruction = make(op, &operands).unwrap();
            prop_assert_eq!(instruction.len(), op.definition().instruction_len());

            let def = lookup(instruction[0]).unwrap();
            let (read, n) = read_operands(def, &instruction[1..]).unwrap();
            prop_assert_eq!(read, operands);
            prop_assert_eq!(n, instruction.len() - 1);
        }
    }
}
