//! Runtime values of the executor.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDef;
use crate::builtins::BuiltinKind;
use crate::types::StructType;

/// Captured environment of a closure.
pub type Env = im::HashMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Char(char),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Struct(StructValue),
    Function(Closure),
    Builtin(BuiltinKind, Vec<Value>),
    /// A struct constructor with the fields bound so far.
    Constructor(Rc<StructType>, Vec<Value>),
}

/// Immutable record. Updating a field produces a new value.
#[derive(Debug, Clone)]
pub struct StructValue {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(field, value)| (field == name).then_some(value))
    }

    pub fn with_field(&self, name: &str, value: Value) -> Option<StructValue> {
        let mut updated = self.clone();
        let slot = updated
            .fields
            .iter_mut()
            .find_map(|(field, slot)| (field == name).then_some(slot))?;
        *slot = value;
        Some(updated)
    }
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub applied: Vec<Value>,
    pub env: Env,
}

impl Value {
    /// Short description used in runtime mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Double(_) => "double",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Char(_) => "char",
            Value::Tuple(_) => "tuple",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Function(_) | Value::Builtin(..) | Value::Constructor(..) => "function",
        }
    }

    /// Structural equality. Functions never compare equal; the checker
    /// rejects such comparisons before they can run.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) | (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Struct(a), Value::Struct(b)) => {
                a.name == b.name
                    && a.fields.len() == b.fields.len()
                    && a
                        .fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((an, av), (bn, bv))| an == bn && av.equals(bv))
            }
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Value::Struct(record) => {
                if record.fields.is_empty() {
                    return write!(f, "{} {{}}", record.name);
                }
                write!(f, "{} {{ ", record.name)?;
                for (i, (name, value)) in record.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, " }}")
            }
            Value::Function(_) | Value::Builtin(..) | Value::Constructor(..) => {
                write!(f, "<function>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i64, y: i64) -> Value {
        Value::Struct(StructValue {
            name: "Point".into(),
            fields: vec![("iX".into(), Value::Int(x)), ("iY".into(), Value::Int(y))],
        })
    }

    #[test]
    fn renders_values_like_the_output_format() {
        assert_eq!(Value::Double(3.0).to_string(), "3.0");
        assert_eq!(Value::Str("a\"b".into()).to_string(), r#""a\"b""#);
        assert_eq!(Value::Char('x').to_string(), "'x'");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::Str("a".into())]).to_string(),
            r#"(1, "a")"#
        );
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(point(1, 2).to_string(), "Point { iX: 1, iY: 2 }");
        assert_eq!(
            Value::Builtin(BuiltinKind::Len, Vec::new()).to_string(),
            "<function>"
        );
    }

    #[test]
    fn struct_updates_copy_the_record() {
        let Value::Struct(original) = point(1, 2) else {
            unreachable!()
        };
        let updated = original.with_field("iX", Value::Int(9)).unwrap();
        assert!(original.field("iX").unwrap().equals(&Value::Int(1)));
        assert!(updated.field("iX").unwrap().equals(&Value::Int(9)));
        assert!(original.with_field("iZ", Value::Int(0)).is_none());
    }

    #[test]
    fn equality_is_structural() {
        assert!(point(1, 2).equals(&point(1, 2)));
        assert!(!point(1, 2).equals(&point(2, 1)));
        assert_eq!(
            Value::Str("a".into()).compare(&Value::Str("b".into())),
            Some(Ordering::Less)
        );
    }
}
