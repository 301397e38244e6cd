//! The MovaScript stack virtual machine.
//!
//! Holds a value stack, a frame stack, the module's constants (converted
//! to runtime values once at load), a dense slot-indexed globals vector
//! seeded from the builtin registry, and the output sink invoked by
//! `PRINT`. Execution is single-threaded and synchronous; every failure
//! aborts the run with a diagnostic naming the executing function and its
//! instruction pointer.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use super::builtins;
use super::bytecode::{Constant, FunctionProto, Module};
use super::instruction::Opcode;
use super::value::{BoundMethod, Cell, ClassObject, ClosureObject, InstanceObject, Value};

/// Fatal execution failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} in {function} at instruction {ip}")]
pub struct RuntimeError {
    pub message: String,
    pub function: String,
    pub ip: usize,
}

/// Runtime flags controlling tracing and limits.
#[derive(Debug, Clone)]
pub struct VmOptions {
    pub trace: bool,
    pub max_frames: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            trace: false,
            max_frames: 1024,
        }
    }
}

/// Record of an active function invocation.
struct CallFrame {
    function: Rc<FunctionProto>,
    ip: usize,
    base: usize,
    locals: Vec<Value>,
    cells: Vec<Cell>,
}

/// Output callback invoked synchronously by `PRINT`.
pub type OutputSink = Box<dyn FnMut(&str)>;

pub struct Vm {
    constants: Vec<Value>,
    globals: Vec<Option<Value>>,
    global_names: Vec<String>,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    entry: Rc<FunctionProto>,
    output: OutputSink,
    options: VmOptions,
}

impl Vm {
    pub fn new(module: &Module) -> Self {
        Self::with_options(module, VmOptions::default())
    }

    pub fn with_options(module: &Module, options: VmOptions) -> Self {
        let constants = module.constants.iter().map(constant_to_value).collect();

        // Globals are referenced by slot at runtime; builtin bindings are
        // installed once, by name, before execution.
        let globals = module
            .globals
            .iter()
            .map(|name| builtins::lookup(name).map(Value::Native))
            .collect();

        let entry = Rc::new(FunctionProto {
            name: "<main>".to_string(),
            arity: 0,
            local_count: 0,
            upvalues: Vec::new(),
            code: module.main_code.clone(),
        });

        Self {
            constants,
            globals,
            global_names: module.globals.clone(),
            stack: Vec::new(),
            frames: Vec::new(),
            entry,
            output: Box::new(|line| println!("{}", line)),
            options,
        }
    }

    /// Replaces the output sink consumed by `PRINT`.
    pub fn with_output(mut self, sink: impl FnMut(&str) + 'static) -> Self {
        self.output = Box::new(sink);
        self
    }

    /// Executes the module's main code to completion and yields the final
    /// value.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        self.stack.clear();
        self.frames.clear();
        self.frames.push(CallFrame {
            function: self.entry.clone(),
            ip: 0,
            base: 0,
            locals: Vec::new(),
            cells: Vec::new(),
        });

        loop {
            let instruction = {
                let frame = self.frames.last_mut().expect("frame stack not empty");
                if frame.ip >= frame.function.code.len() {
                    None
                } else {
                    let instruction = frame.function.code[frame.ip];
                    frame.ip += 1;
                    Some(instruction)
                }
            };

            // Falling off the end of a code sequence behaves like an
            // implicit `return none`.
            let Some(instruction) = instruction else {
                if let Some(value) = self.unwind_frame(Value::Null) {
                    return Ok(value);
                }
                continue;
            };

            if self.options.trace {
                trace!(
                    function = %self.frames.last().unwrap().function.name,
                    ip = self.frames.last().unwrap().ip - 1,
                    opcode = ?instruction.opcode,
                    arg = instruction.arg,
                    "execute"
                );
            }

            let arg = instruction.arg as usize;
            match instruction.opcode {
                Opcode::Nop => {}

                Opcode::LoadConst => {
                    let value = self
                        .constants
                        .get(arg)
                        .cloned()
                        .ok_or_else(|| self.error(format!("constant index {} out of range", arg)))?;
                    self.stack.push(value);
                }
                Opcode::LoadVar => {
                    let frame = self.frames.last().unwrap();
                    let value = frame.locals.get(arg).cloned().ok_or_else(|| {
                        self.error(format!("local slot {} out of range", arg))
                    })?;
                    self.stack.push(value);
                }
                Opcode::StoreVar => {
                    let value = self.pop()?;
                    let frame = self.frames.last_mut().unwrap();
                    if arg >= frame.locals.len() {
                        frame.locals.resize(arg + 1, Value::Null);
                    }
                    frame.locals[arg] = value;
                }
                Opcode::LoadGlobal => {
                    if arg >= self.globals.len() {
                        return Err(self.error(format!("global slot {} out of range", arg)));
                    }
                    match &self.globals[arg] {
                        Some(value) => {
                            let value = value.clone();
                            self.stack.push(value);
                        }
                        None => {
                            let name = self
                                .global_names
                                .get(arg)
                                .map(String::as_str)
                                .unwrap_or("?");
                            return Err(self.error(format!("undefined global '{}'", name)));
                        }
                    }
                }
                Opcode::StoreGlobal => {
                    if arg >= self.globals.len() {
                        return Err(self.error(format!("global slot {} out of range", arg)));
                    }
                    let value = self.pop()?;
                    self.globals[arg] = Some(value);
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Dup => {
                    let top = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or_else(|| self.error("stack underflow".to_string()))?;
                    self.stack.push(top);
                }

                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Pow => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let value = arithmetic(instruction.opcode, lhs, rhs)
                        .map_err(|message| self.error(message))?;
                    self.stack.push(value);
                }
                Opcode::Neg => {
                    let value = self.pop()?;
                    let result = match value {
                        Value::Integer(int) => int
                            .checked_neg()
                            .map(Value::Integer)
                            .ok_or_else(|| self.error("integer overflow".to_string()))?,
                        Value::Float(float) => Value::Float(-float),
                        other => {
                            return Err(self.error(format!(
                                "cannot negate {}",
                                other.type_name()
                            )));
                        }
                    };
                    self.stack.push(result);
                }

                Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    let value = comparison(instruction.opcode, lhs, rhs)
                        .map_err(|message| self.error(message))?;
                    self.stack.push(value);
                }

                Opcode::And => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.stack
                        .push(Value::Boolean(lhs.is_truthy() && rhs.is_truthy()));
                }
                Opcode::Or => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.stack
                        .push(Value::Boolean(lhs.is_truthy() || rhs.is_truthy()));
                }
                Opcode::Not => {
                    let value = self.pop()?;
                    self.stack.push(Value::Boolean(!value.is_truthy()));
                }

                Opcode::Jump => {
                    self.frames.last_mut().unwrap().ip = arg;
                }
                Opcode::JumpIfFalse => {
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.frames.last_mut().unwrap().ip = arg;
                    }
                }
                Opcode::JumpIfTrue => {
                    let condition = self.pop()?;
                    if condition.is_truthy() {
                        self.frames.last_mut().unwrap().ip = arg;
                    }
                }

                Opcode::Call => self.call_value(arg)?,
                Opcode::Return => {
                    let value = self.pop()?;
                    if let Some(final_value) = self.unwind_frame(value) {
                        return Ok(final_value);
                    }
                }
                Opcode::MakeClosure => {
                    let callee = self.pop()?;
                    let function = match callee {
                        Value::Function(proto) => proto,
                        other => {
                            return Err(self.error(format!(
                                "MAKE_CLOSURE expects a function, got {}",
                                other.type_name()
                            )));
                        }
                    };
                    let mut cells = Vec::with_capacity(function.upvalues.len());
                    for descriptor in &function.upvalues {
                        let index = descriptor.parent_index as usize;
                        let frame = self.frames.last().unwrap();
                        let cell = if descriptor.is_local {
                            // Fresh cell initialized from the parent local.
                            let value =
                                frame.locals.get(index).cloned().ok_or_else(|| {
                                    self.error(format!(
                                        "cannot capture local slot {}",
                                        index
                                    ))
                                })?;
                            Rc::new(std::cell::RefCell::new(value))
                        } else {
                            frame.cells.get(index).cloned().ok_or_else(|| {
                                self.error(format!("cannot capture upvalue {}", index))
                            })?
                        };
                        cells.push(cell);
                    }
                    self.stack
                        .push(Value::Closure(Rc::new(ClosureObject { function, cells })));
                }
                Opcode::LoadUpvalue => {
                    let frame = self.frames.last().unwrap();
                    let cell = frame
                        .cells
                        .get(arg)
                        .ok_or_else(|| self.error(format!("upvalue {} out of range", arg)))?;
                    let value = cell.borrow().clone();
                    self.stack.push(value);
                }
                Opcode::StoreUpvalue => {
                    let value = self.pop()?;
                    let frame = self.frames.last().unwrap();
                    let cell = frame
                        .cells
                        .get(arg)
                        .ok_or_else(|| self.error(format!("upvalue {} out of range", arg)))?;
                    *cell.borrow_mut() = value;
                }

                Opcode::MakeList => {
                    let values = self.pop_many(arg)?;
                    self.stack.push(Value::list(values));
                }
                Opcode::MakeMap => {
                    let flat = self.pop_many(arg * 2)?;
                    let mut entries = HashMap::with_capacity(arg);
                    for pair in flat.chunks(2) {
                        match &pair[0] {
                            Value::String(key) => {
                                entries.insert(key.clone(), pair[1].clone());
                            }
                            other => {
                                return Err(self.error(format!(
                                    "map keys must be strings, got {}",
                                    other.type_name()
                                )));
                            }
                        }
                    }
                    self.stack.push(Value::map(entries));
                }
                Opcode::GetIndex => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let value = self
                        .index_get(object, index)
                        .map_err(|message| self.error(message))?;
                    self.stack.push(value);
                }
                Opcode::SetIndex => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let value = self.pop()?;
                    self.index_set(object, index, value)
                        .map_err(|message| self.error(message))?;
                }
                Opcode::GetAttr => {
                    let name = self.attr_name(arg)?;
                    let object = self.pop()?;
                    let value = self
                        .attr_get(object, &name)
                        .map_err(|message| self.error(message))?;
                    self.stack.push(value);
                }
                Opcode::SetAttr => {
                    let name = self.attr_name(arg)?;
                    let object = self.pop()?;
                    let value = self.pop()?;
                    self.attr_set(object, &name, value)
                        .map_err(|message| self.error(message))?;
                }
                Opcode::NewInstance => {
                    let class_value = self.pop()?;
                    let args = self.pop_many(arg)?;
                    let class = match class_value {
                        Value::Class(class) => class,
                        other => {
                            return Err(self.error(format!(
                                "new expects a class, got {}",
                                other.type_name()
                            )));
                        }
                    };
                    // Positional arguments pair with field names in order;
                    // extras are ignored, missing fields remain absent.
                    let mut fields = HashMap::new();
                    for (name, value) in class.fields.iter().zip(args.into_iter()) {
                        fields.insert(name.clone(), value);
                    }
                    self.stack.push(Value::Instance(Rc::new(InstanceObject {
                        class,
                        fields: std::cell::RefCell::new(fields),
                    })));
                }

                Opcode::Print => {
                    let args = self.pop_many(arg)?;
                    let line = args
                        .iter()
                        .map(Value::display_string)
                        .collect::<Vec<_>>()
                        .join(" ");
                    (self.output)(&line);
                    self.stack.push(Value::Null);
                }

                Opcode::Halt => {
                    return Ok(self.stack.pop().unwrap_or(Value::Null));
                }
            }
        }
    }

    // ───── frame and stack helpers ─────

    fn error(&self, message: String) -> RuntimeError {
        let (function, ip) = self
            .frames
            .last()
            .map(|frame| (frame.function.name.clone(), frame.ip.saturating_sub(1)))
            .unwrap_or_else(|| ("<main>".to_string(), 0));
        RuntimeError {
            message,
            function,
            ip,
        }
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| self.error("stack underflow".to_string()))
    }

    fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if count > self.stack.len() {
            return Err(self.error("stack underflow".to_string()));
        }
        let start = self.stack.len() - count;
        Ok(self.stack.drain(start..).collect())
    }

    /// Pops the current frame, discards its working stack, and pushes the
    /// return value for the caller. Returns the final value when the last
    /// frame unwinds.
    fn unwind_frame(&mut self, value: Value) -> Option<Value> {
        let frame = self.frames.pop().expect("frame stack not empty");
        self.stack.truncate(frame.base);
        if self.frames.is_empty() {
            Some(value)
        } else {
            self.stack.push(value);
            None
        }
    }

    /// `CALL n`: pops the callee, then `n` arguments (top-most is the last
    /// declared), and dispatches by callee kind.
    fn call_value(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee = self.pop()?;
        let args = self.pop_many(argc)?;

        match callee {
            Value::Native(def) => {
                if def.arity >= 0 && args.len() != def.arity as usize {
                    return Err(self.error(format!(
                        "{}() expects {} arguments, received {}",
                        def.name, def.arity, args.len()
                    )));
                }
                let result = (def.func)(&args).map_err(|message| self.error(message))?;
                self.stack.push(result);
            }
            Value::Function(function) => {
                self.push_frame(function, None, args, Vec::new())?;
            }
            Value::Closure(closure) => {
                self.push_frame(
                    closure.function.clone(),
                    None,
                    args,
                    closure.cells.clone(),
                )?;
            }
            Value::Bound(bound) => {
                self.push_frame(
                    bound.method.clone(),
                    Some(bound.receiver.clone()),
                    args,
                    Vec::new(),
                )?;
            }
            Value::Class(class) => {
                return Err(self.error(format!(
                    "class {} must be constructed with 'new'",
                    class.name
                )));
            }
            other => {
                return Err(self.error(format!(
                    "value of type {} is not callable",
                    other.type_name()
                )));
            }
        }
        Ok(())
    }

    fn push_frame(
        &mut self,
        function: Rc<FunctionProto>,
        receiver: Option<Value>,
        args: Vec<Value>,
        cells: Vec<Cell>,
    ) -> Result<(), RuntimeError> {
        let implicit = receiver.is_some() as usize;
        if args.len() + implicit != function.arity as usize {
            let declared = function.arity as usize - implicit;
            return Err(self.error(format!(
                "function '{}' expects {} arguments, received {}",
                function.name,
                declared,
                args.len()
            )));
        }
        if self.frames.len() >= self.options.max_frames {
            return Err(self.error(format!(
                "frame stack overflow (depth {})",
                self.options.max_frames
            )));
        }

        let slots = (function.local_count as usize).max(function.arity as usize);
        let mut locals = vec![Value::Null; slots];
        let mut next = 0;
        if let Some(receiver) = receiver {
            locals[next] = receiver;
            next += 1;
        }
        for arg in args {
            locals[next] = arg;
            next += 1;
        }

        self.frames.push(CallFrame {
            function,
            ip: 0,
            base: self.stack.len(),
            locals,
            cells,
        });
        Ok(())
    }

    // ───── attribute and index access ─────

    fn attr_name(&self, index: usize) -> Result<String, RuntimeError> {
        match self.constants.get(index) {
            Some(Value::String(name)) => Ok(name.clone()),
            Some(other) => Err(self.error(format!(
                "attribute name must be a string constant, got {}",
                other.type_name()
            ))),
            None => Err(self.error(format!("constant index {} out of range", index))),
        }
    }

    fn attr_get(&self, object: Value, name: &str) -> Result<Value, String> {
        match &object {
            Value::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(name) {
                    return Ok(value.clone());
                }
                if let Some(method) = instance.class.methods.get(name) {
                    return Ok(Value::Bound(Rc::new(BoundMethod {
                        receiver: object.clone(),
                        method: method.clone(),
                    })));
                }
                Err(format!(
                    "unknown field or method '{}' on {}",
                    name, instance.class.name
                ))
            }
            Value::List(items) => match name {
                "length" => Ok(Value::Integer(items.borrow().len() as i64)),
                _ => Err(format!("unknown attribute '{}' on list", name)),
            },
            Value::String(text) => match name {
                "length" => Ok(Value::Integer(text.chars().count() as i64)),
                _ => Err(format!("unknown attribute '{}' on string", name)),
            },
            Value::Map(entries) => {
                if name == "length" {
                    return Ok(Value::Integer(entries.borrow().len() as i64));
                }
                entries
                    .borrow()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| format!("unknown key '{}' in map", name))
            }
            other => Err(format!(
                "{} has no attributes",
                other.type_name()
            )),
        }
    }

    fn attr_set(&self, object: Value, name: &str, value: Value) -> Result<(), String> {
        match object {
            Value::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Map(entries) => {
                entries.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(format!(
                "cannot set attribute '{}' on {}",
                name,
                other.type_name()
            )),
        }
    }

    fn index_get(&self, object: Value, index: Value) -> Result<Value, String> {
        match (&object, &index) {
            (Value::List(items), Value::Integer(i)) => {
                let items = items.borrow();
                let position = *i;
                if position < 0 || position as usize >= items.len() {
                    return Err(format!(
                        "index {} out of bounds for list of length {}",
                        position,
                        items.len()
                    ));
                }
                Ok(items[position as usize].clone())
            }
            (Value::String(text), Value::Integer(i)) => {
                let position = *i;
                let length = text.chars().count();
                if position < 0 || position as usize >= length {
                    return Err(format!(
                        "index {} out of bounds for string of length {}",
                        position, length
                    ));
                }
                Ok(Value::String(
                    text.chars().nth(position as usize).unwrap().to_string(),
                ))
            }
            // A missing map key reads as none.
            (Value::Map(entries), Value::String(key)) => Ok(entries
                .borrow()
                .get(key)
                .cloned()
                .unwrap_or(Value::Null)),
            (Value::Map(_), other) => {
                Err(format!("map keys must be strings, got {}", other.type_name()))
            }
            (other, _) => Err(format!("{} is not indexable", other.type_name())),
        }
    }

    fn index_set(&self, object: Value, index: Value, value: Value) -> Result<(), String> {
        match (&object, &index) {
            (Value::List(items), Value::Integer(i)) => {
                let mut items = items.borrow_mut();
                let position = *i;
                if position < 0 || position as usize >= items.len() {
                    return Err(format!(
                        "index {} out of bounds for list of length {}",
                        position,
                        items.len()
                    ));
                }
                items[position as usize] = value;
                Ok(())
            }
            (Value::Map(entries), Value::String(key)) => {
                entries.borrow_mut().insert(key.clone(), value);
                Ok(())
            }
            (Value::Map(_), other) => {
                Err(format!("map keys must be strings, got {}", other.type_name()))
            }
            (other, _) => Err(format!("{} is not indexable", other.type_name())),
        }
    }
}

// ───── value conversion and operators ─────

fn constant_to_value(constant: &Constant) -> Value {
    match constant {
        Constant::None => Value::Null,
        Constant::Int(value) => Value::Integer(*value),
        Constant::Float(value) => Value::Float(*value),
        Constant::Str(value) => Value::String(value.clone()),
        Constant::Bool(value) => Value::Boolean(*value),
        Constant::Function(proto) => Value::Function(Rc::new(proto.clone())),
        Constant::Class(class) => {
            let methods = class
                .methods
                .iter()
                .map(|(name, proto)| (name.clone(), Rc::new(proto.clone())))
                .collect();
            Value::Class(Rc::new(ClassObject {
                name: class.name.clone(),
                fields: class.fields.clone(),
                methods,
            }))
        }
    }
}

fn arithmetic(opcode: Opcode, lhs: Value, rhs: Value) -> Result<Value, String> {
    match opcode {
        Opcode::Add => add_values(lhs, rhs),
        Opcode::Mul => mul_values(lhs, rhs),
        Opcode::Sub | Opcode::Div | Opcode::Mod | Opcode::Pow => {
            numeric_arithmetic(opcode, lhs, rhs)
        }
        _ => Err("unsupported arithmetic opcode".to_string()),
    }
}

/// `ADD`: integer-pure numeric addition, display-string concatenation when
/// either side is a string, list concatenation for two lists.
fn add_values(lhs: Value, rhs: Value) -> Result<Value, String> {
    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_add(*b)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
            "{}{}",
            lhs.display_string(),
            rhs.display_string()
        ))),
        (Value::List(a), Value::List(b)) => {
            let mut combined = a.borrow().clone();
            combined.extend(b.borrow().iter().cloned());
            Ok(Value::list(combined))
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(format!(
                "unsupported operands for +: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )),
        },
    }
}

/// `MUL`: integer-pure numeric product; `(string, int)` repeats the string.
fn mul_values(lhs: Value, rhs: Value) -> Result<Value, String> {
    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => a
            .checked_mul(*b)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        (Value::String(text), Value::Integer(count)) => {
            if *count < 0 {
                return Err("string repeat count must not be negative".to_string());
            }
            Ok(Value::String(text.repeat(*count as usize)))
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Float(a * b)),
            _ => Err(format!(
                "unsupported operands for *: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )),
        },
    }
}

fn numeric_arithmetic(opcode: Opcode, lhs: Value, rhs: Value) -> Result<Value, String> {
    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => integer_arithmetic(opcode, *a, *b),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => float_arithmetic(opcode, a, b),
            _ => Err(format!(
                "unsupported operands for arithmetic: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )),
        },
    }
}

fn integer_arithmetic(opcode: Opcode, lhs: i64, rhs: i64) -> Result<Value, String> {
    match opcode {
        Opcode::Sub => lhs
            .checked_sub(rhs)
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        Opcode::Div => {
            if rhs == 0 {
                Err("Division by zero".to_string())
            } else {
                Ok(Value::Integer(lhs / rhs))
            }
        }
        Opcode::Mod => {
            if rhs == 0 {
                Err("Modulo by zero".to_string())
            } else {
                Ok(Value::Integer(lhs % rhs))
            }
        }
        // Integer base with a non-negative integer exponent stays integer;
        // a negative exponent taints the result to float.
        Opcode::Pow => {
            if rhs >= 0 {
                let exponent =
                    u32::try_from(rhs).map_err(|_| "integer overflow".to_string())?;
                lhs.checked_pow(exponent)
                    .map(Value::Integer)
                    .ok_or_else(|| "integer overflow".to_string())
            } else {
                Ok(Value::Float((lhs as f64).powf(rhs as f64)))
            }
        }
        _ => Err("unsupported integer opcode".to_string()),
    }
}

fn float_arithmetic(opcode: Opcode, lhs: f64, rhs: f64) -> Result<Value, String> {
    match opcode {
        Opcode::Sub => Ok(Value::Float(lhs - rhs)),
        Opcode::Div => {
            if rhs == 0.0 {
                Err("Division by zero".to_string())
            } else {
                Ok(Value::Float(lhs / rhs))
            }
        }
        Opcode::Mod => {
            if rhs == 0.0 {
                Err("Modulo by zero".to_string())
            } else {
                Ok(Value::Float(lhs % rhs))
            }
        }
        Opcode::Pow => Ok(Value::Float(lhs.powf(rhs))),
        _ => Err("unsupported float opcode".to_string()),
    }
}

fn comparison(opcode: Opcode, lhs: Value, rhs: Value) -> Result<Value, String> {
    match opcode {
        Opcode::Eq => Ok(Value::Boolean(lhs == rhs)),
        Opcode::Ne => Ok(Value::Boolean(lhs != rhs)),
        _ => {
            let ordering = match (&lhs, &rhs) {
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => match (lhs.as_number(), rhs.as_number()) {
                    (Some(a), Some(b)) => a
                        .partial_cmp(&b)
                        .ok_or_else(|| "cannot compare NaN".to_string())?,
                    _ => {
                        return Err(format!(
                            "cannot compare {} and {}",
                            lhs.type_name(),
                            rhs.type_name()
                        ));
                    }
                },
            };
            let result = match opcode {
                Opcode::Lt => ordering.is_lt(),
                Opcode::Gt => ordering.is_gt(),
                Opcode::Le => ordering.is_le(),
                Opcode::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Boolean(result))
        }
    }
}
