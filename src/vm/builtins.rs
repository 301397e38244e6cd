//! Native built-in registry.
//!
//! The VM consults this name → function map when seeding global slots.
//! Every builtin publishes its arity (negative means variadic) and fails
//! cleanly on a type mismatch. Each function is registered under its
//! English name and a Ukrainian alias; the conversion builtins are reached
//! bilingually through the parser's type-word canonicalization.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::value::{NativeDef, Value};

static DEFS: &[NativeDef] = &[
    NativeDef {
        name: "abs",
        arity: 1,
        func: builtin_abs,
    },
    NativeDef {
        name: "sqrt",
        arity: 1,
        func: builtin_sqrt,
    },
    NativeDef {
        name: "min",
        arity: -1,
        func: builtin_min,
    },
    NativeDef {
        name: "max",
        arity: -1,
        func: builtin_max,
    },
    NativeDef {
        name: "round",
        arity: 1,
        func: builtin_round,
    },
    NativeDef {
        name: "floor",
        arity: 1,
        func: builtin_floor,
    },
    NativeDef {
        name: "ceil",
        arity: 1,
        func: builtin_ceil,
    },
    NativeDef {
        name: "len",
        arity: 1,
        func: builtin_len,
    },
    NativeDef {
        name: "upper",
        arity: 1,
        func: builtin_upper,
    },
    NativeDef {
        name: "lower",
        arity: 1,
        func: builtin_lower,
    },
    NativeDef {
        name: "trim",
        arity: 1,
        func: builtin_trim,
    },
    NativeDef {
        name: "split",
        arity: 2,
        func: builtin_split,
    },
    NativeDef {
        name: "join",
        arity: 2,
        func: builtin_join,
    },
    NativeDef {
        name: "int",
        arity: 1,
        func: builtin_int,
    },
    NativeDef {
        name: "float",
        arity: 1,
        func: builtin_float,
    },
    NativeDef {
        name: "str",
        arity: 1,
        func: builtin_str,
    },
    NativeDef {
        name: "bool",
        arity: 1,
        func: builtin_bool,
    },
    NativeDef {
        name: "range",
        arity: -1,
        func: builtin_range,
    },
    NativeDef {
        name: "sum",
        arity: 1,
        func: builtin_sum,
    },
    NativeDef {
        name: "type",
        arity: 1,
        func: builtin_type,
    },
];

/// Ukrainian surface names, resolving to the same entries.
static ALIASES: &[(&str, &str)] = &[
    ("модуль", "abs"),
    ("корінь", "sqrt"),
    ("мін", "min"),
    ("макс", "max"),
    ("округлити", "round"),
    ("вниз", "floor"),
    ("вгору", "ceil"),
    ("довжина", "len"),
    ("великі", "upper"),
    ("малі", "lower"),
    ("обрізати", "trim"),
    ("розділити", "split"),
    ("зєднати", "join"),
    ("діапазон", "range"),
    ("сума", "sum"),
    ("тип", "type"),
    // `str` has no type-word spelling; `рядок` canonicalizes to `string`.
    ("string", "str"),
];

static REGISTRY: Lazy<HashMap<&'static str, &'static NativeDef>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for def in DEFS {
        map.insert(def.name, def);
    }
    for (alias, target) in ALIASES {
        let def = DEFS
            .iter()
            .find(|def| def.name == *target)
            .expect("alias target must exist");
        map.insert(*alias, def);
    }
    map
});

/// Look up a builtin by either surface name.
pub fn lookup(name: &str) -> Option<&'static NativeDef> {
    REGISTRY.get(name).copied()
}

/// All registered names, for diagnostics and the disassembler.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

// ───── numeric helpers ─────

fn expect_number(name: &str, value: &Value) -> Result<f64, String> {
    value
        .as_number()
        .ok_or_else(|| format!("{}() expects a number, got {}", name, value.type_name()))
}

fn expect_string<'a>(name: &str, value: &'a Value) -> Result<&'a str, String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(format!(
            "{}() expects a string, got {}",
            name,
            other.type_name()
        )),
    }
}

fn expect_int(name: &str, value: &Value) -> Result<i64, String> {
    match value {
        Value::Integer(int) => Ok(*int),
        other => Err(format!(
            "{}() expects an integer, got {}",
            name,
            other.type_name()
        )),
    }
}

// ───── implementations ─────

fn builtin_abs(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(int) => int
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow in abs()".to_string()),
        Value::Float(float) => Ok(Value::Float(float.abs())),
        other => Err(format!("abs() expects a number, got {}", other.type_name())),
    }
}

fn builtin_sqrt(args: &[Value]) -> Result<Value, String> {
    let value = expect_number("sqrt", &args[0])?;
    if value < 0.0 {
        return Err("sqrt() of a negative number".to_string());
    }
    Ok(Value::Float(value.sqrt()))
}

fn builtin_min(args: &[Value]) -> Result<Value, String> {
    fold_extreme("min", args, |candidate, best| candidate < best)
}

fn builtin_max(args: &[Value]) -> Result<Value, String> {
    fold_extreme("max", args, |candidate, best| candidate > best)
}

fn fold_extreme(
    name: &str,
    args: &[Value],
    wins: fn(f64, f64) -> bool,
) -> Result<Value, String> {
    if args.is_empty() {
        return Err(format!("{}() expects at least one argument", name));
    }
    let mut best = args[0].clone();
    let mut best_key = expect_number(name, &best)?;
    for arg in &args[1..] {
        let key = expect_number(name, arg)?;
        if wins(key, best_key) {
            best = arg.clone();
            best_key = key;
        }
    }
    Ok(best)
}

fn builtin_round(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(int) => Ok(Value::Integer(*int)),
        Value::Float(float) => Ok(Value::Integer(float.round() as i64)),
        other => Err(format!(
            "round() expects a number, got {}",
            other.type_name()
        )),
    }
}

fn builtin_floor(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(int) => Ok(Value::Integer(*int)),
        Value::Float(float) => Ok(Value::Integer(float.floor() as i64)),
        other => Err(format!(
            "floor() expects a number, got {}",
            other.type_name()
        )),
    }
}

fn builtin_ceil(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(int) => Ok(Value::Integer(*int)),
        Value::Float(float) => Ok(Value::Integer(float.ceil() as i64)),
        other => Err(format!(
            "ceil() expects a number, got {}",
            other.type_name()
        )),
    }
}

fn builtin_len(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::String(text) => Ok(Value::Integer(text.chars().count() as i64)),
        Value::List(items) => Ok(Value::Integer(items.borrow().len() as i64)),
        Value::Map(entries) => Ok(Value::Integer(entries.borrow().len() as i64)),
        other => Err(format!(
            "len() expects a string, list, or map, got {}",
            other.type_name()
        )),
    }
}

fn builtin_upper(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(expect_string("upper", &args[0])?.to_uppercase()))
}

fn builtin_lower(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(expect_string("lower", &args[0])?.to_lowercase()))
}

fn builtin_trim(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(
        expect_string("trim", &args[0])?.trim().to_string(),
    ))
}

fn builtin_split(args: &[Value]) -> Result<Value, String> {
    let text = expect_string("split", &args[0])?;
    let separator = expect_string("split", &args[1])?;
    if separator.is_empty() {
        return Err("split() separator must not be empty".to_string());
    }
    let parts = text
        .split(separator)
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Value::list(parts))
}

fn builtin_join(args: &[Value]) -> Result<Value, String> {
    let items = match &args[0] {
        Value::List(items) => items,
        other => Err(format!(
            "join() expects a list, got {}",
            other.type_name()
        ))?,
    };
    let separator = expect_string("join", &args[1])?;
    let parts: Vec<String> = items.borrow().iter().map(Value::display_string).collect();
    Ok(Value::String(parts.join(separator)))
}

fn builtin_int(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(int) => Ok(Value::Integer(*int)),
        Value::Float(float) => Ok(Value::Integer(*float as i64)),
        Value::Boolean(flag) => Ok(Value::Integer(*flag as i64)),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("int() cannot parse '{}'", text)),
        other => Err(format!(
            "int() cannot convert {}",
            other.type_name()
        )),
    }
}

fn builtin_float(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(int) => Ok(Value::Float(*int as f64)),
        Value::Float(float) => Ok(Value::Float(*float)),
        Value::Boolean(flag) => Ok(Value::Float(if *flag { 1.0 } else { 0.0 })),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("float() cannot parse '{}'", text)),
        other => Err(format!(
            "float() cannot convert {}",
            other.type_name()
        )),
    }
}

fn builtin_str(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(args[0].display_string()))
}

fn builtin_bool(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Boolean(args[0].is_truthy()))
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)`.
/// Half-open; the step may be negative but never zero.
fn builtin_range(args: &[Value]) -> Result<Value, String> {
    let (start, stop, step) = match args.len() {
        1 => (0, expect_int("range", &args[0])?, 1),
        2 => (
            expect_int("range", &args[0])?,
            expect_int("range", &args[1])?,
            1,
        ),
        3 => (
            expect_int("range", &args[0])?,
            expect_int("range", &args[1])?,
            expect_int("range", &args[2])?,
        ),
        n => return Err(format!("range() expects 1 to 3 arguments, received {}", n)),
    };
    if step == 0 {
        return Err("range() step must not be zero".to_string());
    }
    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        values.push(Value::Integer(current));
        current += step;
    }
    Ok(Value::list(values))
}

fn builtin_sum(args: &[Value]) -> Result<Value, String> {
    let items = match &args[0] {
        Value::List(items) => items,
        other => Err(format!("sum() expects a list, got {}", other.type_name()))?,
    };
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut tainted = false;
    for item in items.borrow().iter() {
        match item {
            Value::Integer(int) => {
                int_total = int_total.wrapping_add(*int);
                float_total += *int as f64;
            }
            Value::Float(float) => {
                tainted = true;
                float_total += *float;
            }
            other => {
                return Err(format!(
                    "sum() expects numbers, got {}",
                    other.type_name()
                ));
            }
        }
    }
    if tainted {
        Ok(Value::Float(float_total))
    } else {
        Ok(Value::Integer(int_total))
    }
}

fn builtin_type(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(args[0].type_name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_both_surfaces() {
        assert!(lookup("abs").is_some());
        assert!(lookup("модуль").is_some());
        assert!(lookup("довжина").is_some());
        assert!(lookup("unknown").is_none());
    }

    #[test]
    fn range_half_open_and_negative_step() {
        let forward = builtin_range(&[Value::Integer(1), Value::Integer(4)]).unwrap();
        assert_eq!(forward.display_string(), "[1, 2, 3]");
        let backward = builtin_range(&[
            Value::Integer(3),
            Value::Integer(0),
            Value::Integer(-1),
        ])
        .unwrap();
        assert_eq!(backward.display_string(), "[3, 2, 1]");
        assert!(builtin_range(&[
            Value::Integer(0),
            Value::Integer(5),
            Value::Integer(0)
        ])
        .is_err());
    }

    #[test]
    fn sum_integer_purity() {
        let ints = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(builtin_sum(&[ints]).unwrap(), Value::Integer(3));
        let mixed = Value::list(vec![Value::Integer(1), Value::Float(0.5)]);
        assert_eq!(builtin_sum(&[mixed]).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn conversions() {
        assert_eq!(
            builtin_int(&[Value::String(" 42 ".into())]).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            builtin_float(&[Value::Integer(2)]).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            builtin_str(&[Value::Float(5.0)]).unwrap(),
            Value::String("5".into())
        );
        assert_eq!(
            builtin_bool(&[Value::String(String::new())]).unwrap(),
            Value::Boolean(false)
        );
        assert!(builtin_int(&[Value::String("seven".into())]).is_err());
    }

    #[test]
    fn type_names() {
        assert_eq!(
            builtin_type(&[Value::Null]).unwrap(),
            Value::String("none".into())
        );
        assert_eq!(
            builtin_type(&[Value::list(Vec::new())]).unwrap(),
            Value::String("list".into())
        );
    }
}
