//! Runtime values and heap objects.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::bytecode::FunctionProto;

/// A shared mutable cell backing a captured variable. Identity matters:
/// every holder of the same cell observes writes through any other holder.
pub type Cell = Rc<RefCell<Value>>;

/// A native built-in. `arity < 0` means variadic.
#[derive(Debug)]
pub struct NativeDef {
    pub name: &'static str,
    pub arity: i32,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

/// A compiled function bound to its captured cells.
#[derive(Debug)]
pub struct ClosureObject {
    pub function: Rc<FunctionProto>,
    pub cells: Vec<Cell>,
}

/// Transient receiver/method pair produced by attribute lookup; consumed
/// by the next call.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Rc<FunctionProto>,
}

#[derive(Debug)]
pub struct ClassObject {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: HashMap<String, Rc<FunctionProto>>,
}

#[derive(Debug)]
pub struct InstanceObject {
    pub class: Rc<ClassObject>,
    pub fields: RefCell<HashMap<String, Value>>,
}

/// Values manipulated by the MovaScript VM.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<HashMap<String, Value>>>),
    Function(Rc<FunctionProto>),
    Native(&'static NativeDef),
    Closure(Rc<ClosureObject>),
    Bound(Rc<BoundMethod>),
    Class(Rc<ClassObject>),
    Instance(Rc<InstanceObject>),
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn map(entries: HashMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "none",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) | Value::Native(_) | Value::Closure(_) => "function",
            Value::Bound(_) => "bound method",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Display form used by `print`, string coercion, and diagnostics.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "none".to_string(),
            Value::Boolean(flag) => flag.to_string(),
            Value::Integer(int) => int.to_string(),
            Value::Float(float) => {
                if float.fract() == 0.0 && float.is_finite() {
                    format!("{:.0}", float)
                } else {
                    float.to_string()
                }
            }
            Value::String(text) => text.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::display_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let mut parts: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value.display_string()))
                    .collect();
                parts.sort();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Function(function) => format!("<fun {}>", function.name),
            Value::Native(native) => format!("<native {}>", native.name),
            Value::Closure(closure) => format!("<fun {}>", closure.function.name),
            Value::Bound(bound) => format!("<bound {}>", bound.method.name),
            Value::Class(class) => format!("<class {}>", class.name),
            Value::Instance(instance) => format!("<{} instance>", instance.class.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            // Map equality is identity; element-wise comparison is not part
            // of the core contract.
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => std::ptr::eq(*a, *b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Bound(a), Value::Bound(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
