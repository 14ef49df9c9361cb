use crate::bytecode::{Bytecode, Instructions};
use crate::lang::value::Value;
use std::fmt::Write;

const RULE: &str = "════════════════════════════════════════";

/// Print disassembly of a bytecode program
pub fn print_bc(bc: &Bytecode) {
    print!("{}", disassemble(bc));
}

/// Render the main stream, then every compiled function in the constant pool.
pub fn disassemble(bc: &Bytecode) -> String {
    let mut out = String::new();
    out.push_str("=== BYTECODE PROGRAM ===\n\n");

    write_code_object(&mut out, "main", &bc.instructions, &bc.constants);

    for (index, constant) in bc.constants.iter().enumerate() {
        if let Value::Function(f) = constant {
            let label = format!(
                "constant[{}] fn ({} params, {} locals)",
                index, f.num_parameters, f.num_locals
            );
            write_code_object(&mut out, &label, &f.instructions, &bc.constants);
        }
    }

    out
}

fn write_code_object(out: &mut String, name: &str, code: &Instructions, constants: &[Value]) {
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, " {}", name);
    let _ = writeln!(out, " {} bytes", code.len());
    let _ = writeln!(out, "{}", RULE);
    disassemble_instructions(out, code, constants);
    out.push('\n');
}

/// One line per instruction; jump targets are marked with `►`.
fn disassemble_instructions(out: &mut String, code: &Instructions, constants: &[Value]) {
    let jump_targets = collect_jump_targets(code);

    let mut ip = 0;
    while ip < code.len() {
        let (def, operands, len) = match code.decode_at(ip) {
            Ok(decoded) => decoded,
            Err(e) => {
                let _ = writeln!(out, "{:04}   ERROR: {}", ip, e);
                return;
            }
        };

        if jump_targets.contains(&ip) {
            let _ = writeln!(out, "      ┌──────────────────────────────────");
            let _ = write!(out, "{:04} ► ", ip);
        } else {
            let _ = write!(out, "{:04}   ", ip);
        }

        match (def.name, operands.as_slice()) {
            ("OpConstant", [index]) => {
                let shown = constants
                    .get(*index)
                    .map(describe_constant)
                    .unwrap_or_else(|| "<missing>".to_string());
                let _ = writeln!(out, "{:<16}{:<6}; {}", def.name, index, shown);
            }
            ("OpJump" | "OpJumpNotTruthy", [target]) => {
                let _ = writeln!(out, "{:<16}→ {:04}", def.name, target);
            }
            (_, []) => {
                let _ = writeln!(out, "{}", def.name);
            }
            (_, [operand]) => {
                let _ = writeln!(out, "{:<16}{}", def.name, operand);
            }
            (_, many) => {
                let rendered: Vec<String> = many.iter().map(|o| o.to_string()).collect();
                let _ = writeln!(out, "{:<16}{}", def.name, rendered.join(" "));
            }
        }

        ip += len;
    }

    if jump_targets.contains(&code.len()) {
        let _ = writeln!(out, "      ┌──────────────────────────────────");
        let _ = writeln!(out, "{:04} ► <end>", code.len());
    }
}

fn collect_jump_targets(code: &Instructions) -> Vec<usize> {
    let mut targets = Vec::new();

    let Ok(boundaries) = code.boundaries() else {
        return targets;
    };

    for ip in boundaries {
        let Ok((def, operands, _)) = code.decode_at(ip) else {
            continue;
        };
        if !matches!(def.name, "OpJump" | "OpJumpNotTruthy") {
            continue;
        }
        if let Some(&target) = operands.first() {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn describe_constant(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s.as_ref()),
        other => other.to_string(),
    }
}
