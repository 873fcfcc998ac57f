//! Built-in functions visible at the Glyph level.
//!
//! Each overload is one [`BuiltinDescriptor`]. The type checker reads the
//! table to type references, the executor evaluates the [`BuiltinKind`]
//! directly, and the compiler copies each descriptor's host source into the
//! generated program's prelude.

use crate::error::RuntimeError;
use crate::types::{Signature, Type};
use crate::value::Value;

/// Kind of builtin, one per overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    ShowInt,
    ShowDouble,
    ShowBool,
    ShowChar,
    ShowString,
    /// Number of characters in a string.
    Len,
    /// Integer to double.
    Float,
    /// Double to integer, rounding toward zero.
    Trunc,
}

/// Metadata about a single builtin overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    /// Name at the Glyph level (e.g. `fsShow`). Overloads share a name.
    pub name: &'static str,

    pub kind: BuiltinKind,

    /// Name of the host function in generated programs.
    pub host_name: &'static str,

    /// Definition of the host function.
    pub host_source: &'static str,
}

/// The complete list of builtins known to the core.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        name: "fsShow",
        kind: BuiltinKind::ShowInt,
        host_name: "show_int",
        host_source: "fn show_int(value: i64) -> String { value.to_string() }",
    },
    BuiltinDescriptor {
        name: "fsShow",
        kind: BuiltinKind::ShowDouble,
        host_name: "show_double",
        host_source: "fn show_double(value: f64) -> String { format!(\"{:?}\", value) }",
    },
    BuiltinDescriptor {
        name: "fsShow",
        kind: BuiltinKind::ShowBool,
        host_name: "show_bool",
        host_source: "fn show_bool(value: bool) -> String { value.to_string() }",
    },
    BuiltinDescriptor {
        name: "fsShow",
        kind: BuiltinKind::ShowChar,
        host_name: "show_char",
        host_source: "fn show_char(value: char) -> String { value.to_string() }",
    },
    BuiltinDescriptor {
        name: "fsShow",
        kind: BuiltinKind::ShowString,
        host_name: "show_string",
        host_source: "fn show_string(value: String) -> String { value }",
    },
    BuiltinDescriptor {
        name: "fiLen",
        kind: BuiltinKind::Len,
        host_name: "len_string",
        host_source: "fn len_string(value: String) -> i64 { value.chars().count() as i64 }",
    },
    BuiltinDescriptor {
        name: "fdFloat",
        kind: BuiltinKind::Float,
        host_name: "int_to_double",
        host_source: "fn int_to_double(value: i64) -> f64 { value as f64 }",
    },
    BuiltinDescriptor {
        name: "fiTrunc",
        kind: BuiltinKind::Trunc,
        host_name: "trunc_double",
        host_source: "fn trunc_double(value: f64) -> i64 { value.trunc() as i64 }",
    },
];

impl BuiltinKind {
    pub fn descriptor(self) -> &'static BuiltinDescriptor {
        BUILTINS
            .iter()
            .find(|descriptor| descriptor.kind == self)
            .unwrap_or(&BUILTINS[0])
    }

    pub fn signature(self) -> Signature {
        let (param, result) = match self {
            BuiltinKind::ShowInt => (Type::Int, Type::Str),
            BuiltinKind::ShowDouble => (Type::Double, Type::Str),
            BuiltinKind::ShowBool => (Type::Bool, Type::Str),
            BuiltinKind::ShowChar => (Type::Char, Type::Str),
            BuiltinKind::ShowString => (Type::Str, Type::Str),
            BuiltinKind::Len => (Type::Str, Type::Int),
            BuiltinKind::Float => (Type::Int, Type::Double),
            BuiltinKind::Trunc => (Type::Double, Type::Int),
        };
        Signature::new(vec![param], result)
    }

    pub fn arity(self) -> usize {
        self.signature().params.len()
    }

    /// Evaluate with a complete argument list.
    pub fn invoke(self, args: &[Value]) -> Result<Value, RuntimeError> {
        let value = match (self, args) {
            (BuiltinKind::ShowInt, [Value::Int(n)]) => Value::Str(n.to_string()),
            (BuiltinKind::ShowDouble, [Value::Double(d)]) => Value::Str(format!("{d:?}")),
            (BuiltinKind::ShowBool, [Value::Bool(b)]) => Value::Str(b.to_string()),
            (BuiltinKind::ShowChar, [Value::Char(c)]) => Value::Str(c.to_string()),
            (BuiltinKind::ShowString, [Value::Str(s)]) => Value::Str(s.clone()),
            (BuiltinKind::Len, [Value::Str(s)]) => Value::Int(s.chars().count() as i64),
            (BuiltinKind::Float, [Value::Int(n)]) => Value::Double(*n as f64),
            (BuiltinKind::Trunc, [Value::Double(d)]) => Value::Int(d.trunc() as i64),
            (_, args) if args.len() != self.arity() => {
                return Err(RuntimeError::Arity {
                    expected: self.arity(),
                    applied: args.len(),
                });
            }
            (_, args) => {
                return Err(RuntimeError::Mismatch {
                    expected: self.signature().params[0].to_string(),
                    found: args[0].kind_name().to_string(),
                });
            }
        };
        Ok(value)
    }
}

/// All overloads published under a Glyph-level name.
pub fn overloads(name: &str) -> impl Iterator<Item = &'static BuiltinDescriptor> + '_ {
    BUILTINS.iter().filter(move |descriptor| descriptor.name == name)
}

/// The type of a builtin name: one signature per overload.
pub fn builtin_type(name: &str) -> Option<Type> {
    let signatures: Vec<Signature> = overloads(name).map(|d| d.kind.signature()).collect();
    (!signatures.is_empty()).then_some(Type::Function(signatures))
}

/// The overload of `name` whose signature is exactly `signature`.
pub fn resolve(name: &str, signature: &Signature) -> Option<BuiltinKind> {
    overloads(name)
        .map(|descriptor| descriptor.kind)
        .find(|kind| kind.signature() == *signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_is_overloaded() {
        let ty = builtin_type("fsShow").unwrap();
        assert!(ty.is_overloaded());
        let chosen = resolve("fsShow", &Signature::new(vec![Type::Char], Type::Str));
        assert_eq!(chosen, Some(BuiltinKind::ShowChar));
        assert!(builtin_type("fqMissing").is_none());
    }

    #[test]
    fn descriptors_name_their_host_function() {
        for descriptor in BUILTINS {
            assert_eq!(descriptor.kind.descriptor(), descriptor);
            assert!(
                descriptor
                    .host_source
                    .starts_with(&format!("fn {}(", descriptor.host_name))
            );
        }
    }

    #[test]
    fn invokes_builtins() {
        assert_eq!(
            BuiltinKind::Len.invoke(&[Value::Str("héllo".into())]).unwrap().to_string(),
            "5"
        );
        assert_eq!(
            BuiltinKind::Trunc.invoke(&[Value::Double(-2.7)]).unwrap().to_string(),
            "-2"
        );
        assert_eq!(
            BuiltinKind::ShowDouble.invoke(&[Value::Double(2.0)]).unwrap().to_string(),
            r#""2.0""#
        );
        assert!(matches!(
            BuiltinKind::Len.invoke(&[]),
            Err(RuntimeError::Arity { expected: 1, applied: 0 })
        ));
    }
}
