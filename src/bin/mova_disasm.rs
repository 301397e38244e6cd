//! Human-readable listing of a compiled `.uabc` module.

use std::{env, fs};

use anyhow::{anyhow, Result};
use movascript::vm::{Constant, FunctionProto, Instruction, Module, Opcode};

fn main() -> Result<()> {
    let input = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("no input file provided"))?;
    let data = fs::read(&input)?;
    let module = Module::deserialize(&data)?;

    println!("constants ({}):", module.constants.len());
    for (index, constant) in module.constants.iter().enumerate() {
        println!("  {:4}: {}", index, constant_to_string(constant));
    }
    println!();

    println!("globals ({}):", module.globals.len());
    for (index, name) in module.globals.iter().enumerate() {
        println!("  {:4}: {}", index, name);
    }
    println!();

    for function in &module.functions {
        print_function(function, &module.constants, &module.globals);
    }

    println!(
        "main ({} instructions):",
        module.main_code.len()
    );
    print_code(&module.main_code, &module.constants, &module.globals);

    Ok(())
}

fn print_function(function: &FunctionProto, constants: &[Constant], globals: &[String]) {
    println!(
        "function {} (arity {}, locals {}, upvalues {}):",
        function.name,
        function.arity,
        function.local_count,
        function.upvalue_count()
    );
    for (index, upvalue) in function.upvalues.iter().enumerate() {
        let kind = if upvalue.is_local { "local" } else { "upvalue" };
        println!("  upvalue {} <- parent {} {}", index, kind, upvalue.parent_index);
    }
    print_code(&function.code, constants, globals);
    println!();
}

fn print_code(code: &[Instruction], constants: &[Constant], globals: &[String]) {
    for (offset, instruction) in code.iter().enumerate() {
        println!(
            "  {:04}: {}",
            offset,
            format_instruction(instruction, constants, globals)
        );
    }
}

fn format_instruction(
    instruction: &Instruction,
    constants: &[Constant],
    globals: &[String],
) -> String {
    let arg = instruction.arg;
    match instruction.opcode {
        Opcode::LoadConst | Opcode::GetAttr | Opcode::SetAttr => {
            let value = constants
                .get(arg as usize)
                .map(constant_to_string)
                .unwrap_or_else(|| "?".into());
            format!("{:?} {} ({})", instruction.opcode, arg, value)
        }
        Opcode::LoadGlobal | Opcode::StoreGlobal => {
            let name = globals
                .get(arg as usize)
                .map(String::as_str)
                .unwrap_or("?");
            format!("{:?} {} ({})", instruction.opcode, arg, name)
        }
        opcode if opcode.uses_operand() => format!("{:?} {}", opcode, arg),
        opcode => format!("{:?}", opcode),
    }
}

fn constant_to_string(constant: &Constant) -> String {
    match constant {
        Constant::None => "none".to_string(),
        Constant::Int(value) => value.to_string(),
        Constant::Float(value) => value.to_string(),
        Constant::Str(value) => format!("{:?}", value),
        Constant::Bool(value) => value.to_string(),
        Constant::Function(function) => format!("<fun {}>", function.name),
        Constant::Class(class) => format!(
            "<class {} ({} fields, {} methods)>",
            class.name,
            class.fields.len(),
            class.methods.len()
        ),
    }
}
