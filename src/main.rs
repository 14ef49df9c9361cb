mod bytecode;
mod frontend;
mod lang;
mod logging;
mod repl;
mod runtime;

use std::{env, fs, path::Path};

use crate::bytecode::Bytecode;
use crate::bytecode::disasm::print_bc;
use crate::frontend::lexer::Lexer;
use crate::frontend::token_dumper::TokenDumper;
use crate::repl::Session;
use crate::runtime::config::VmConfig;

/// Options that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--emit", "--stack-size", "--max-frames"];

fn main() {
    let args: Vec<String> = env::args().collect();
    let has = |flag: &str| args.iter().any(|a| a == flag);

    logging::init(logging::level_from(
        has("--verbose"),
        has("--trace"),
        env::var("MONKEY_LOG").ok().as_deref(),
    ));

    if has("--help") || has("-h") {
        print_usage();
        return;
    }

    let config = match vm_config(&args) {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
    };

    let tokens_only = has("--tokens");
    let no_color = has("--no-color");
    let pretty = has("--pretty");
    let ast = has("--ast");
    let disasm = has("--bc") || has("--bytecode");
    let emit = flag_value(&args, "--emit");

    match positional(&args) {
        None => start_repl(config),
        Some(_) if has("--repl") || has("-i") => start_repl(config),
        Some(filename) if filename.ends_with(".mkb") => run_bytecode_file(filename, config),
        Some(filename) => {
            ensure_extension(filename);
            let source = match fs::read_to_string(filename) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    std::process::exit(1);
                }
            };

            if tokens_only {
                dump_tokens(&source, no_color, pretty);
            } else {
                run_program(&source, ast, disasm, emit, config);
            }
        }
    }
}

fn start_repl(config: VmConfig) {
    if let Err(e) = repl::start(config) {
        eprintln!("REPL I/O error: {}", e);
        std::process::exit(1);
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn vm_config(args: &[String]) -> Result<VmConfig, String> {
    let mut config = VmConfig::default();

    for (flag, slot) in [
        ("--stack-size", &mut config.stack_size),
        ("--max-frames", &mut config.max_frames),
    ] {
        if let Some(value) = flag_value(args, flag) {
            *slot = value
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| format!("{} expects a positive integer, got '{}'", flag, value))?;
        } else if args.iter().any(|a| a == flag) {
            return Err(format!("{} expects a value", flag));
        }
    }

    Ok(config)
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("mk") {
        eprintln!("Error: expected a .mk or .mkb file, got {}", filename);
        std::process::exit(1);
    }
}

fn dump_tokens(source: &str, no_color: bool, pretty: bool) {
    let mut lexer = Lexer::new(source);

    match lexer.tokenize() {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            if pretty {
                dumper = dumper.pretty();
            }
            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("MONKEY - bytecode compiler and virtual machine");
    println!();
    println!("Usage:");
    println!("  monkey                        Start interactive REPL");
    println!("  monkey --repl, -i             Start interactive REPL");
    println!("  monkey <file.mk>              Compile and run a program");
    println!("  monkey <file.mkb>             Run previously emitted bytecode");
    println!("  monkey --tokens <file.mk>     Show tokens only (--no-color, --pretty)");
    println!("  monkey --ast <file.mk>        Show the parsed AST");
    println!("  monkey --bc <file.mk>         Disassemble, then run");
    println!("  monkey --emit <out.mkb> <file.mk>");
    println!("                                Write compiled bytecode instead of running");
    println!();
    println!("Options:");
    println!("  --stack-size N                Operand stack slots (default 2048)");
    println!("  --max-frames N                Maximum call depth (default 1024)");
    println!("  --verbose, --trace            Log compiler and VM activity to stderr");
    println!("                                (or set MONKEY_LOG=debug|trace)");
    println!("  --help, -h                    Show this help");
}

fn run_program(source: &str, ast: bool, disasm: bool, emit: Option<&str>, config: VmConfig) {
    let program = match repl::parse(source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if ast {
        println!("{:#?}", program);
        println!();
        println!("{}", program);
        return;
    }

    let mut session = Session::new(config);
    let bytecode = match session.compile(&program) {
        Ok(bytecode) => bytecode,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if disasm {
        print_bc(&bytecode);
    }

    if let Some(out) = emit {
        write_bytecode(&bytecode, out);
        return;
    }

    execute(&mut session, bytecode);
}

fn write_bytecode(bytecode: &Bytecode, out: &str) {
    let bytes = match bytecode.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = fs::write(out, &bytes) {
        eprintln!("Failed to write '{}': {}", out, e);
        std::process::exit(1);
    }
    println!("wrote {} bytes to {}", bytes.len(), out);
}

fn run_bytecode_file(filename: &str, config: VmConfig) {
    let bytes = match fs::read(filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            std::process::exit(1);
        }
    };

    let bytecode = match Bytecode::from_bytes(&bytes) {
        Ok(bytecode) => bytecode,
        Err(e) => {
            eprintln!("Error: {}: {}", filename, e);
            std::process::exit(1);
        }
    };

    execute(&mut Session::new(config), bytecode);
}

fn execute(session: &mut Session, bytecode: Bytecode) {
    match session.execute(bytecode) {
        Ok(value) => println!("{}", value),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        std::iter::once("monkey")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_positional_skips_flag_values() {
        assert_eq!(positional(&args(&["--emit", "out.mkb", "prog.mk"])), Some("prog.mk"));
        assert_eq!(positional(&args(&["--bc", "prog.mk"])), Some("prog.mk"));
        assert_eq!(positional(&args(&["--stack-size", "64"])), None);
        assert_eq!(positional(&args(&[])), None);
    }

    #[test]
    fn test_vm_config_from_flags() {
        let config = vm_config(&args(&["--stack-size", "64", "--max-frames", "8"])).unwrap();
        assert_eq!(config.stack_size, 64);
        assert_eq!(config.max_frames, 8);
        assert_eq!(config.globals_size, VmConfig::default().globals_size);
    }

    #[test]
    fn test_vm_config_rejects_bad_values() {
        assert!(vm_config(&args(&["--stack-size", "lots"])).is_err());
        assert!(vm_config(&args(&["--max-frames", "0"])).is_err());
        assert!(vm_config(&args(&["--max-frames"])).is_err());
    }
}
