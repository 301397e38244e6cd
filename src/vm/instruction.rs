use serde::{Deserialize, Serialize};

/// VM opcodes. Discriminants are part of the bytecode container format and
/// must stay stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,

    // Stack operations
    LoadConst = 1,
    LoadVar = 2,
    StoreVar = 3,
    LoadGlobal = 4,
    StoreGlobal = 5,
    Pop = 6,
    Dup = 7,

    // Arithmetic
    Add = 8,
    Sub = 9,
    Mul = 10,
    Div = 11,
    Mod = 12,
    Pow = 13,
    Neg = 14,

    // Comparison
    Eq = 15,
    Ne = 16,
    Lt = 17,
    Gt = 18,
    Le = 19,
    Ge = 20,

    // Logic
    And = 21,
    Or = 22,
    Not = 23,

    // Control
    Jump = 24,
    JumpIfFalse = 25,
    JumpIfTrue = 26,

    // Functions
    Call = 27,
    Return = 28,
    MakeClosure = 29,
    LoadUpvalue = 30,
    StoreUpvalue = 31,

    // Objects
    MakeList = 32,
    MakeMap = 33,
    GetIndex = 34,
    SetIndex = 35,
    GetAttr = 36,
    SetAttr = 37,
    NewInstance = 38,

    // Built-in
    Print = 39,

    Halt = 40,
}

impl Opcode {
    /// Decode an opcode byte; `None` for bytes outside the instruction set.
    pub fn from_u8(byte: u8) -> Option<Self> {
        use Opcode::*;
        let opcode = match byte {
            0 => Nop,
            1 => LoadConst,
            2 => LoadVar,
            3 => StoreVar,
            4 => LoadGlobal,
            5 => StoreGlobal,
            6 => Pop,
            7 => Dup,
            8 => Add,
            9 => Sub,
            10 => Mul,
            11 => Div,
            12 => Mod,
            13 => Pow,
            14 => Neg,
            15 => Eq,
            16 => Ne,
            17 => Lt,
            18 => Gt,
            19 => Le,
            20 => Ge,
            21 => And,
            22 => Or,
            23 => Not,
            24 => Jump,
            25 => JumpIfFalse,
            26 => JumpIfTrue,
            27 => Call,
            28 => Return,
            29 => MakeClosure,
            30 => LoadUpvalue,
            31 => StoreUpvalue,
            32 => MakeList,
            33 => MakeMap,
            34 => GetIndex,
            35 => SetIndex,
            36 => GetAttr,
            37 => SetAttr,
            38 => NewInstance,
            39 => Print,
            40 => Halt,
            _ => return None,
        };
        Some(opcode)
    }

    /// True for opcodes whose operand is a jump target within the current
    /// instruction sequence.
    pub fn is_jump(&self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue)
    }

    /// True for opcodes whose operand carries meaning; all others serialize
    /// a zero operand.
    pub fn uses_operand(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            LoadConst
                | LoadVar
                | StoreVar
                | LoadGlobal
                | StoreGlobal
                | Jump
                | JumpIfFalse
                | JumpIfTrue
                | Call
                | MakeClosure
                | LoadUpvalue
                | StoreUpvalue
                | MakeList
                | MakeMap
                | GetAttr
                | SetAttr
                | NewInstance
                | Print
        )
    }
}

/// A single fixed-width instruction: opcode plus one u32 operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub arg: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, arg: u32) -> Self {
        Self { opcode, arg }
    }

    pub fn simple(opcode: Opcode) -> Self {
        Self { opcode, arg: 0 }
    }
}
