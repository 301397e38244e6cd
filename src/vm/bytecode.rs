//! Bytecode module model and the persistent `UABC` container format.
//!
//! The container is byte-for-byte defined: little-endian multi-byte
//! numerics, length-prefixed UTF-8 strings, and fixed 5-byte instructions
//! (`u8` opcode + `u32` operand, zero when unused).

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::instruction::{Instruction, Opcode};

/// Errors raised while encoding, decoding, or linking a bytecode module.
#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("invalid bytecode magic")]
    InvalidMagic,
    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u16),
    #[error("unknown constant tag {0}")]
    UnknownConstantTag(u8),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("unexpected end of bytecode")]
    UnexpectedEof,
    #[error("invalid module: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BytecodeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            BytecodeError::UnexpectedEof
        } else {
            BytecodeError::Io(err.to_string())
        }
    }
}

/// Upvalue capture descriptor. `is_local` captures the parent frame's local
/// at `parent_index` into a fresh cell; otherwise the parent's upvalue cell
/// at `parent_index` is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvalueDesc {
    pub is_local: bool,
    pub parent_index: u32,
}

/// A compiled function: display name, declared arity, local slot count,
/// upvalue descriptors, and its instruction sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionProto {
    pub name: String,
    pub arity: u32,
    pub local_count: u32,
    pub upvalues: Vec<UpvalueDesc>,
    pub code: Vec<Instruction>,
}

impl FunctionProto {
    pub fn upvalue_count(&self) -> u32 {
        self.upvalues.len() as u32
    }
}

/// A class in the constant pool: name, ordered field names (from the
/// constructor parameter list), and the method table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassConstant {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: Vec<(String, FunctionProto)>,
}

/// Constant-pool entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Function(FunctionProto),
    Class(ClassConstant),
}

/// A compiled module: the four aligned tables of the bytecode core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub constants: Vec<Constant>,
    pub globals: Vec<String>,
    pub functions: Vec<FunctionProto>,
    pub main_code: Vec<Instruction>,
}

impl Module {
    pub const MAGIC: &'static [u8; 4] = b"UABC";
    pub const VERSION: u16 = 1;

    pub fn serialize(&self) -> Result<Vec<u8>, BytecodeError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, BytecodeError> {
        Self::decode(bytes)
    }

    pub fn encode<W: Write>(&self, mut writer: W) -> Result<(), BytecodeError> {
        writer.write_all(&(Self::MAGIC.len() as u32).to_le_bytes())?;
        writer.write_all(Self::MAGIC)?;
        writer.write_all(&Self::VERSION.to_le_bytes())?;

        writer.write_all(&(self.constants.len() as u32).to_le_bytes())?;
        for constant in &self.constants {
            encode_constant(constant, &mut writer)?;
        }

        writer.write_all(&(self.globals.len() as u32).to_le_bytes())?;
        for name in &self.globals {
            write_string(&mut writer, name)?;
        }

        writer.write_all(&(self.functions.len() as u32).to_le_bytes())?;
        for function in &self.functions {
            encode_function(function, &mut writer)?;
        }

        writer.write_all(&(self.main_code.len() as u32).to_le_bytes())?;
        for instruction in &self.main_code {
            encode_instruction(instruction, &mut writer)?;
        }
        Ok(())
    }

    pub fn decode<R: Read>(mut reader: R) -> Result<Self, BytecodeError> {
        let magic = read_string(&mut reader)?;
        if magic.as_bytes() != Self::MAGIC {
            return Err(BytecodeError::InvalidMagic);
        }

        let mut version_bytes = [0u8; 2];
        reader.read_exact(&mut version_bytes)?;
        let version = u16::from_le_bytes(version_bytes);
        if version != Self::VERSION {
            return Err(BytecodeError::UnsupportedVersion(version));
        }

        let constants = read_vec(&mut reader, decode_constant)?;
        let globals = read_vec(&mut reader, read_string)?;
        let functions = read_vec(&mut reader, decode_function)?;
        let main_code = read_vec(&mut reader, decode_instruction)?;

        let module = Module {
            constants,
            globals,
            functions,
            main_code,
        };
        module.validate()?;
        Ok(module)
    }

    /// Structural link check: every jump operand lies within its function's
    /// code and every constant/global operand indexes its table.
    pub fn validate(&self) -> Result<(), BytecodeError> {
        for function in &self.functions {
            self.validate_code(&function.name, &function.code)?;
        }
        for constant in &self.constants {
            if let Constant::Function(function) = constant {
                self.validate_code(&function.name, &function.code)?;
            }
            if let Constant::Class(class) = constant {
                for (_, method) in &class.methods {
                    self.validate_code(&method.name, &method.code)?;
                }
            }
        }
        self.validate_code("<main>", &self.main_code)
    }

    fn validate_code(&self, name: &str, code: &[Instruction]) -> Result<(), BytecodeError> {
        for instruction in code {
            let arg = instruction.arg as usize;
            match instruction.opcode {
                op if op.is_jump() => {
                    if arg > code.len() {
                        return Err(BytecodeError::Invalid(format!(
                            "jump target {} out of range in {}",
                            arg, name
                        )));
                    }
                }
                Opcode::LoadConst | Opcode::GetAttr | Opcode::SetAttr => {
                    if arg >= self.constants.len() {
                        return Err(BytecodeError::Invalid(format!(
                            "constant index {} out of range in {}",
                            arg, name
                        )));
                    }
                }
                Opcode::LoadGlobal | Opcode::StoreGlobal => {
                    if arg >= self.globals.len() {
                        return Err(BytecodeError::Invalid(format!(
                            "global slot {} out of range in {}",
                            arg, name
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ───── primitive readers/writers ─────

fn read_u8<R: Read>(reader: &mut R) -> Result<u8, BytecodeError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, BytecodeError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64, BytecodeError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, BytecodeError> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|err| BytecodeError::Io(err.to_string()))
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), BytecodeError> {
    let bytes = value.as_bytes();
    writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_vec<R: Read, T, F>(reader: &mut R, mut f: F) -> Result<Vec<T>, BytecodeError>
where
    F: FnMut(&mut R) -> Result<T, BytecodeError>,
{
    let len = read_u32(reader)? as usize;
    let mut values = Vec::with_capacity(len.min(1 << 16));
    for _ in 0..len {
        values.push(f(reader)?);
    }
    Ok(values)
}

// ───── constants ─────

fn encode_constant<W: Write>(constant: &Constant, writer: &mut W) -> Result<(), BytecodeError> {
    match constant {
        Constant::None => writer.write_all(&[0])?,
        Constant::Int(value) => {
            // Integers travel as f64 payloads; the tag restores the kind.
            writer.write_all(&[1])?;
            writer.write_all(&(*value as f64).to_le_bytes())?;
        }
        Constant::Float(value) => {
            writer.write_all(&[2])?;
            writer.write_all(&value.to_le_bytes())?;
        }
        Constant::Str(value) => {
            writer.write_all(&[3])?;
            write_string(writer, value)?;
        }
        Constant::Bool(value) => {
            writer.write_all(&[4])?;
            writer.write_all(&[*value as u8])?;
        }
        Constant::Function(function) => {
            writer.write_all(&[5])?;
            encode_function(function, writer)?;
        }
        Constant::Class(class) => {
            writer.write_all(&[6])?;
            write_string(writer, &class.name)?;
            writer.write_all(&(class.fields.len() as u32).to_le_bytes())?;
            for field in &class.fields {
                write_string(writer, field)?;
            }
            writer.write_all(&(class.methods.len() as u32).to_le_bytes())?;
            for (name, method) in &class.methods {
                write_string(writer, name)?;
                encode_function(method, writer)?;
            }
        }
    }
    Ok(())
}

fn decode_constant<R: Read>(reader: &mut R) -> Result<Constant, BytecodeError> {
    match read_u8(reader)? {
        0 => Ok(Constant::None),
        1 => Ok(Constant::Int(read_f64(reader)? as i64)),
        2 => Ok(Constant::Float(read_f64(reader)?)),
        3 => Ok(Constant::Str(read_string(reader)?)),
        4 => Ok(Constant::Bool(read_u8(reader)? != 0)),
        5 => Ok(Constant::Function(decode_function(reader)?)),
        6 => {
            let name = read_string(reader)?;
            let fields = read_vec(reader, read_string)?;
            let methods = read_vec(reader, |r| {
                let method_name = read_string(r)?;
                let method = decode_function(r)?;
                Ok((method_name, method))
            })?;
            Ok(Constant::Class(ClassConstant {
                name,
                fields,
                methods,
            }))
        }
        other => Err(BytecodeError::UnknownConstantTag(other)),
    }
}

// ───── functions and instructions ─────

fn encode_function<W: Write>(function: &FunctionProto, writer: &mut W) -> Result<(), BytecodeError> {
    write_string(writer, &function.name)?;
    writer.write_all(&function.arity.to_le_bytes())?;
    writer.write_all(&function.local_count.to_le_bytes())?;
    writer.write_all(&function.upvalue_count().to_le_bytes())?;
    for upvalue in &function.upvalues {
        writer.write_all(&[upvalue.is_local as u8])?;
        writer.write_all(&upvalue.parent_index.to_le_bytes())?;
    }
    writer.write_all(&(function.code.len() as u32).to_le_bytes())?;
    for instruction in &function.code {
        encode_instruction(instruction, writer)?;
    }
    Ok(())
}

fn decode_function<R: Read>(reader: &mut R) -> Result<FunctionProto, BytecodeError> {
    let name = read_string(reader)?;
    let arity = read_u32(reader)?;
    let local_count = read_u32(reader)?;
    let upvalues = read_vec(reader, |r| {
        let is_local = read_u8(r)? != 0;
        let parent_index = read_u32(r)?;
        Ok(UpvalueDesc {
            is_local,
            parent_index,
        })
    })?;
    let code = read_vec(reader, decode_instruction)?;
    Ok(FunctionProto {
        name,
        arity,
        local_count,
        upvalues,
        code,
    })
}

fn encode_instruction<W: Write>(
    instruction: &Instruction,
    writer: &mut W,
) -> Result<(), BytecodeError> {
    writer.write_all(&[instruction.opcode as u8])?;
    let arg = if instruction.opcode.uses_operand() {
        instruction.arg
    } else {
        0
    };
    writer.write_all(&arg.to_le_bytes())?;
    Ok(())
}

fn decode_instruction<R: Read>(reader: &mut R) -> Result<Instruction, BytecodeError> {
    let byte = read_u8(reader)?;
    let opcode = Opcode::from_u8(byte).ok_or(BytecodeError::UnknownOpcode(byte))?;
    let arg = read_u32(reader)?;
    Ok(Instruction { opcode, arg })
}
