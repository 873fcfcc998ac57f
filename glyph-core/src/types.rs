//! Core type system for Glyph.
//!
//! Types are purely structural. Struct types carry their field list so that
//! every stage after the checker can work from the type alone.

use std::fmt;

/// The type of a Glyph value or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Double,
    Bool,
    Str,
    Char,
    Tuple(Vec<Type>),
    Array(Box<Type>),
    /// One or more overload signatures. Only built-ins have more than one.
    Function(Vec<Signature>),
    Struct(StructType),
}

/// `(P1, ..., Pn) -> R`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    pub result: Box<Type>,
}

/// A named record type with ordered, typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl StructType {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields
            .iter()
            .find_map(|(field, ty)| (field == name).then_some(ty))
    }
}

impl Signature {
    pub fn new(params: Vec<Type>, result: Type) -> Self {
        Signature {
            params,
            result: Box::new(result),
        }
    }

    /// The signature left after binding the first `count` parameters.
    pub fn drop_params(&self, count: usize) -> Signature {
        Signature {
            params: self.params[count.min(self.params.len())..].to_vec(),
            result: self.result.clone(),
        }
    }
}

impl Type {
    pub fn function(params: Vec<Type>, result: Type) -> Type {
        Type::Function(vec![Signature::new(params, result)])
    }

    /// The only signature of a non-overloaded function type.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Type::Function(signatures) if signatures.len() == 1 => signatures.first(),
            _ => None,
        }
    }

    pub fn is_overloaded(&self) -> bool {
        matches!(self, Type::Function(signatures) if signatures.len() > 1)
    }

    /// Whether `==` and `!=` are defined, i.e. no function is nested inside.
    pub fn is_comparable(&self) -> bool {
        match self {
            Type::Int | Type::Double | Type::Bool | Type::Str | Type::Char => true,
            Type::Tuple(items) => items.iter().all(Type::is_comparable),
            Type::Array(element) => element.is_comparable(),
            Type::Function(_) => false,
            Type::Struct(structure) => structure.fields.iter().all(|(_, ty)| ty.is_comparable()),
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Type::Int | Type::Double | Type::Str | Type::Char)
    }

    /// Structural compatibility used for assignments and branch unification.
    ///
    /// Tuples compare by position, structs by name and then field by field,
    /// functions by result and then parameters, arrays by element type.
    pub fn compatible(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Int, Type::Int)
            | (Type::Double, Type::Double)
            | (Type::Bool, Type::Bool)
            | (Type::Str, Type::Str)
            | (Type::Char, Type::Char) => true,
            (Type::Tuple(left), Type::Tuple(right)) => {
                left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.compatible(r))
            }
            (Type::Array(left), Type::Array(right)) => left.compatible(right),
            (Type::Struct(left), Type::Struct(right)) => {
                left.name == right.name
                    && left.fields.len() == right.fields.len()
                    && left
                        .fields
                        .iter()
                        .zip(&right.fields)
                        .all(|((ln, lt), (rn, rt))| ln == rn && lt.compatible(rt))
            }
            (Type::Function(left), Type::Function(right)) => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|(l, r)| {
                        l.result.compatible(&r.result)
                            && l.params.len() == r.params.len()
                            && r.params.iter().zip(&l.params).all(|(rp, lp)| rp.compatible(lp))
                    })
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "integer"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "boolean"),
            Type::Str => write!(f, "string"),
            Type::Char => write!(f, "char"),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Type::Array(element) => write!(f, "[{element}]"),
            Type::Function(signatures) => {
                for (i, signature) in signatures.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{signature}")?;
                }
                Ok(())
            }
            Type::Struct(structure) => write!(f, "struct {}", structure.name),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        if !self.params.is_empty() {
            write!(f, " ")?;
        }
        write!(f, "-> {})", self.result)
    }
}

/// The type category encoded by the leading characters of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sigil {
    Int,
    Double,
    Bool,
    Str,
    Char,
    Tuple,
    Object,
    Array,
    /// `f` alone, or the function marker followed by the result's sigil.
    Function(Option<Box<Sigil>>),
}

impl Sigil {
    fn from_char(c: char) -> Option<Sigil> {
        let sigil = match c {
            'i' => Sigil::Int,
            'd' => Sigil::Double,
            'b' => Sigil::Bool,
            's' => Sigil::Str,
            'c' => Sigil::Char,
            't' => Sigil::Tuple,
            'o' => Sigil::Object,
            'a' => Sigil::Array,
            'f' => Sigil::Function(None),
            _ => return None,
        };
        Some(sigil)
    }

    /// Read the sigil off an identifier such as `iX`, `fX` or `fiFact`.
    pub fn of(name: &str) -> Option<Sigil> {
        let mut chars = name.chars();
        let first = chars.next()?;
        let second = chars.next()?;
        if first == 'f' && second.is_ascii_lowercase() {
            let inner = Sigil::from_char(second)?;
            return Some(Sigil::Function(Some(Box::new(inner))));
        }
        Sigil::from_char(first)
    }

    /// Whether a fresh binding with this sigil may hold a value of `ty`.
    pub fn admits(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Sigil::Int, Type::Int)
            | (Sigil::Double, Type::Double)
            | (Sigil::Bool, Type::Bool)
            | (Sigil::Str, Type::Str)
            | (Sigil::Char, Type::Char)
            | (Sigil::Tuple, Type::Tuple(_))
            | (Sigil::Array, Type::Array(_))
            | (Sigil::Object, Type::Struct(_))
            | (Sigil::Function(None), Type::Function(_)) => true,
            // Struct constructors live under `o` names.
            (Sigil::Object, Type::Function(_)) => ty
                .signature()
                .is_some_and(|sig| matches!(*sig.result, Type::Struct(_))),
            (Sigil::Function(Some(result)), Type::Function(_)) => ty
                .signature()
                .is_some_and(|sig| result.admits(&sig.result)),
            _ => false,
        }
    }

    /// The exact type implied by a primitive sigil.
    pub fn primitive_type(&self) -> Option<Type> {
        match self {
            Sigil::Int => Some(Type::Int),
            Sigil::Double => Some(Type::Double),
            Sigil::Bool => Some(Type::Bool),
            Sigil::Str => Some(Type::Str),
            Sigil::Char => Some(Type::Char),
            _ => None,
        }
    }

    /// Result type promised by a function-marker sigil such as `fi`.
    pub fn declared_result(&self) -> Option<Type> {
        match self {
            Sigil::Function(Some(inner)) => inner.primitive_type(),
            _ => None,
        }
    }
}

/// `oPoint` → `Point`, `foPoint` → `Point`.
pub fn struct_name(identifier: &str) -> String {
    identifier
        .trim_start_matches(|c: char| c.is_ascii_lowercase())
        .to_string()
}
