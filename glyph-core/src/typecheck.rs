//! AST builder and type checker.
//!
//! Converts one raw statement at a time into a typed [`Statement`], checking
//! it against the live scope. A statement that fails is rejected as a whole:
//! the scope and the struct registry are put back the way they were before
//! the statement was checked.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{
    BinaryOp, Expr, ExprKind, FunctionBody, FunctionDef, Literal, Receiver, Statement,
};
use crate::builtins;
use crate::error::TypeError;
use crate::lexer::{Category, Token};
use crate::scope::{Resolution, Scope};
use crate::syntax::{NodeKind, RawNode};
use crate::types::{Sigil, Signature, StructType, Type, struct_name};

/// Bookkeeping for the function literal whose body is being checked.
#[derive(Debug)]
struct FunctionContext {
    frame: usize,
    captures: BTreeSet<String>,
    recursive: bool,
    returns: Vec<Type>,
    outer_loops: usize,
}

/// A resolved assignment target.
struct Target {
    receiver: Receiver,
    /// Type the value must have; `None` for a fresh unannotated binding.
    expected: Option<Type>,
    /// Name of the binding the assignment introduces, if any.
    declares: Option<String>,
}

impl Target {
    fn simple_name(&self) -> Option<&str> {
        match &self.receiver {
            Receiver::Variable(name) => Some(name),
            _ => None,
        }
    }
}

/// Core type checker. Owns the scope of one pass.
#[derive(Debug, Default)]
pub struct TypeChecker {
    scope: Scope,
    functions: Vec<FunctionContext>,
    loops: usize,
    /// Struct types registered so far in this pass, by name.
    structs: BTreeMap<String, StructType>,
    /// Name of the binding a struct constructor is being assigned to.
    naming: Option<String>,
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker::default()
    }

    /// Type of a binding visible at the top level.
    pub fn binding(&self, name: &str) -> Option<Type> {
        self.scope.lookup_local(name).map(|(ty, _)| ty)
    }

    /// Convert one raw statement into a typed statement.
    pub fn convert(&mut self, raw: &RawNode) -> Result<Statement, TypeError> {
        let scope = self.scope.clone();
        let structs = self.structs.clone();
        let result = self.check_statement(raw);
        match &result {
            Ok(_) => debug!(kind = ?raw.kind(), "checked statement"),
            Err(error) => {
                debug!(%error, "rejected statement");
                self.scope = scope;
                self.structs = structs;
                self.functions.clear();
                self.loops = 0;
                self.naming = None;
            }
        }
        result
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn check_statement(&mut self, raw: &RawNode) -> Result<Statement, TypeError> {
        let RawNode::Branch(kind, children) = raw else {
            return Err(TypeError::invalid("statement", "expected a statement"));
        };

        match kind {
            NodeKind::Assignment => self.check_assignment(children),
            NodeKind::Return => {
                let value = self.check_value(child(children, 0, "return")?)?;
                let Some(function) = self.functions.last_mut() else {
                    return Err(TypeError::invalid("return", "not inside a function body"));
                };
                let disagrees = function.returns.first().filter(|first| !first.compatible(&value.ty));
                if let Some(first) = disagrees {
                    return Err(TypeError::Mismatch {
                        expected: first.clone(),
                        found: value.ty.clone(),
                        construct: "return".to_string(),
                    });
                }
                function.returns.push(value.ty.clone());
                Ok(Statement::Return(value))
            }
            NodeKind::Break | NodeKind::Continue => {
                let construct = if *kind == NodeKind::Break { "break" } else { "continue" };
                if self.loops == 0 {
                    return Err(TypeError::invalid(construct, "not inside a loop"));
                }
                Ok(if *kind == NodeKind::Break {
                    Statement::Break
                } else {
                    Statement::Continue
                })
            }
            NodeKind::ExpressionStatement => {
                let value = self.check_value(child(children, 0, "expression")?)?;
                Ok(Statement::Expression(value))
            }
            NodeKind::If => self.check_if(children),
            NodeKind::While => {
                let condition = self.check_condition(child(children, 0, "while")?)?;
                let body = self.check_loop_body(child(children, 1, "while")?)?;
                Ok(Statement::While { condition, body })
            }
            NodeKind::DoWhile => {
                let body = self.check_loop_body(child(children, 0, "do-while")?)?;
                let condition = self.check_condition(child(children, 1, "do-while")?)?;
                Ok(Statement::DoWhile { body, condition })
            }
            NodeKind::For => {
                let var = identifier(child(children, 0, "for")?, "for")?;
                if !Sigil::of(var).is_some_and(|sigil| sigil.admits(&Type::Int)) {
                    return Err(TypeError::Sigil {
                        name: var.to_string(),
                        found: Type::Int,
                    });
                }
                let from = self.check_value(child(children, 1, "for")?)?;
                let to = self.check_value(child(children, 2, "for")?)?;
                for bound in [&from, &to] {
                    expect_type(&Type::Int, &bound.ty, "range bound")?;
                }
                self.scope.push_block();
                self.scope.bind(var, Type::Int);
                let body = self.check_loop_body(child(children, 3, "for")?)?;
                self.scope.pop();
                Ok(Statement::For {
                    var: var.to_string(),
                    from,
                    to,
                    body,
                })
            }
            NodeKind::ForIn => {
                let var = identifier(child(children, 0, "for-in")?, "for-in")?;
                let iterable = self.check_value(child(children, 1, "for-in")?)?;
                let Type::Array(element) = &iterable.ty else {
                    return Err(TypeError::invalid(
                        "for-in",
                        format!("can only iterate over an array, found {}", iterable.ty),
                    ));
                };
                if !Sigil::of(var).is_some_and(|sigil| sigil.admits(element)) {
                    return Err(TypeError::Sigil {
                        name: var.to_string(),
                        found: (**element).clone(),
                    });
                }
                self.scope.push_block();
                self.scope.bind(var, (**element).clone());
                let body = self.check_loop_body(child(children, 2, "for-in")?)?;
                self.scope.pop();
                Ok(Statement::ForIn {
                    var: var.to_string(),
                    iterable,
                    body,
                })
            }
            NodeKind::Do => Ok(Statement::Do(
                self.check_block(child(children, 0, "do")?)?,
            )),
            other => Err(TypeError::invalid(
                "statement",
                format!("{other} is not a statement"),
            )),
        }
    }

    fn check_if(&mut self, children: &[RawNode]) -> Result<Statement, TypeError> {
        let condition = self.check_condition(child(children, 0, "if")?)?;
        let body = self.check_block(child(children, 1, "if")?)?;
        let mut branches = vec![(condition, body)];
        let mut otherwise = None;
        for branch in &children[2..] {
            match branch {
                RawNode::Branch(NodeKind::ElseIf, parts) => {
                    let condition = self.check_condition(child(parts, 0, "elif")?)?;
                    let body = self.check_block(child(parts, 1, "elif")?)?;
                    branches.push((condition, body));
                }
                RawNode::Branch(NodeKind::Else, parts) => {
                    otherwise = Some(self.check_block(child(parts, 0, "else")?)?);
                }
                _ => return Err(TypeError::invalid("if", "unexpected branch")),
            }
        }
        Ok(Statement::If {
            branches,
            otherwise,
        })
    }

    fn check_block(&mut self, raw: &RawNode) -> Result<Vec<Statement>, TypeError> {
        let RawNode::Branch(NodeKind::Block, statements) = raw else {
            return Err(TypeError::invalid("block", "expected a block of statements"));
        };
        self.scope.push_block();
        let checked = statements
            .iter()
            .map(|statement| self.check_statement(statement))
            .collect::<Result<Vec<_>, _>>()?;
        self.scope.pop();
        Ok(checked)
    }

    fn check_loop_body(&mut self, raw: &RawNode) -> Result<Vec<Statement>, TypeError> {
        self.loops += 1;
        let body = self.check_block(raw)?;
        self.loops -= 1;
        Ok(body)
    }

    fn check_condition(&mut self, raw: &RawNode) -> Result<Expr, TypeError> {
        let condition = self.check_value(raw)?;
        expect_type(&Type::Bool, &condition.ty, "condition")?;
        Ok(condition)
    }

    fn check_assignment(&mut self, children: &[RawNode]) -> Result<Statement, TypeError> {
        let [target_raw, value_raw] = children else {
            return Err(TypeError::invalid("assignment", "malformed assignment"));
        };
        let target = self.check_receiver(target_raw)?;

        // Only a fresh binding may refer to itself; a reassignment reads the old value.
        let defining = target
            .declares
            .clone()
            .filter(|_| value_raw.kind() == Some(NodeKind::FunctionLiteral));
        if let Some(name) = &defining {
            let declared = match &target.expected {
                Some(ty) => Some(ty.clone()),
                None => self.sigil_declared_type(name, value_raw),
            };
            self.scope.set_defining(name.as_str(), declared);
        }
        if value_raw.kind() == Some(NodeKind::StructConstructor) {
            self.naming = target.simple_name().map(str::to_string);
        }

        let (before, functions, loops) = (self.scope.clone(), self.functions.len(), self.loops);
        let mut value = self.check_value(value_raw);
        let undeclared = defining.as_deref().filter(|name| {
            matches!(&value, Err(TypeError::UndeclaredRecursion { name: found }) if found.as_str() == *name)
        });
        if let Some(name) = undeclared {
            self.scope = before;
            self.functions.truncate(functions);
            self.loops = loops;
            if let Some(ty) = self.infer_recursive_type(name, value_raw) {
                debug!(%name, %ty, "inferred recursive function type");
                self.scope.set_defining(name, Some(ty));
                value = self.check_value(value_raw);
            }
        }
        self.scope.clear_defining();
        self.naming = None;
        let value = value?;

        match &target.expected {
            Some(expected) => {
                if !expected.compatible(&value.ty) {
                    return Err(TypeError::Mismatch {
                        expected: expected.clone(),
                        found: value.ty.clone(),
                        construct: format!("assignment to {}", target.receiver),
                    });
                }
            }
            None => {
                let name = target.declares.as_deref().unwrap_or_default();
                if !Sigil::of(name).is_some_and(|sigil| sigil.admits(&value.ty)) {
                    return Err(TypeError::Sigil {
                        name: name.to_string(),
                        found: value.ty.clone(),
                    });
                }
            }
        }

        let declares = target.declares.is_some();
        if let Some(name) = &target.declares {
            let ty = target.expected.clone().unwrap_or_else(|| value.ty.clone());
            self.scope.bind(name.clone(), ty);
        }
        Ok(Statement::Assignment {
            target: target.receiver,
            value,
            declares,
        })
    }

    /// Type of a self-referencing literal without a declared type, taken
    /// from the first branch of a conditional body that types without it.
    fn infer_recursive_type(&mut self, name: &str, literal: &RawNode) -> Option<Type> {
        let (params, body) = match literal.children() {
            [params, body] if params.kind() == Some(NodeKind::Params) => {
                (self.check_params(Some(params)).ok()?, body)
            }
            [body] => (Vec::new(), body),
            _ => return None,
        };
        let mut branches = vec![body];
        let mut candidates = Vec::new();
        while let Some(branch) = branches.pop() {
            match branch {
                RawNode::Branch(NodeKind::Conditional, parts) if parts.len() == 3 => {
                    branches.push(&parts[2]);
                    branches.push(&parts[1]);
                }
                other => candidates.push(other),
            }
        }

        let outer = self.scope.clone();
        let functions = self.functions.len();
        let loops = self.loops;
        let mut result = None;
        for candidate in candidates {
            self.scope.push_function(&params);
            let typed = self.check_value(candidate);
            self.scope = outer.clone();
            self.functions.truncate(functions);
            self.loops = loops;
            if let Ok(expr) = typed {
                result = Some(expr.ty);
                break;
            }
        }
        debug!(%name, found = result.is_some(), "searched for a non-recursive branch");
        Some(Type::function(
            params.into_iter().map(|(_, ty)| ty).collect(),
            result?,
        ))
    }

    /// The function type promised by a marker sigil such as `fi`, built from
    /// the literal's own parameter types.
    fn sigil_declared_type(&self, name: &str, literal: &RawNode) -> Option<Type> {
        let result = Sigil::of(name)?.declared_result()?;
        let params = match literal.children() {
            [params, _] if params.kind() == Some(NodeKind::Params) => {
                self.check_params(Some(params)).ok()?
            }
            _ => Vec::new(),
        };
        Some(Type::function(
            params.into_iter().map(|(_, ty)| ty).collect(),
            result,
        ))
    }

    // -----------------------------------------------------------------
    // Receivers and annotations
    // -----------------------------------------------------------------

    fn check_receiver(&mut self, raw: &RawNode) -> Result<Target, TypeError> {
        match raw {
            RawNode::Leaf(token) if token.category == Category::Identifier => {
                self.variable_target(&token.text, None)
            }
            RawNode::Branch(NodeKind::Annotated, parts) => {
                let name = identifier(child(parts, 0, "annotation")?, "annotation")?;
                let ty = self.check_annotation(child(parts, 1, "annotation")?)?;
                if !Sigil::of(name).is_some_and(|sigil| sigil.admits(&ty)) {
                    return Err(TypeError::Sigil {
                        name: name.to_string(),
                        found: ty,
                    });
                }
                self.variable_target(name, Some(ty))
            }
            RawNode::Branch(NodeKind::FieldReceiver, _) => self.field_target(raw),
            RawNode::Branch(NodeKind::ConditionalReceiver, parts) => {
                let condition = self.check_condition(child(parts, 0, "conditional receiver")?)?;
                let then = self.check_receiver(child(parts, 1, "conditional receiver")?)?;
                let otherwise = self.check_receiver(child(parts, 2, "conditional receiver")?)?;
                if then.declares.is_some() || otherwise.declares.is_some() {
                    return Err(TypeError::invalid(
                        "conditional receiver",
                        "both receivers must already be bound",
                    ));
                }
                match (&then.expected, &otherwise.expected) {
                    (Some(left), Some(right)) if left.compatible(right) => {}
                    (Some(left), Some(right)) => {
                        return Err(TypeError::Mismatch {
                            expected: left.clone(),
                            found: right.clone(),
                            construct: "conditional receiver".to_string(),
                        });
                    }
                    _ => {
                        return Err(TypeError::invalid(
                            "conditional receiver",
                            "both receivers must already be bound",
                        ));
                    }
                }
                Ok(Target {
                    expected: then.expected.clone(),
                    receiver: Receiver::Conditional {
                        condition,
                        then: Box::new(then.receiver),
                        otherwise: Box::new(otherwise.receiver),
                    },
                    declares: None,
                })
            }
            _ => Err(TypeError::invalid("assignment", "invalid assignment target")),
        }
    }

    fn variable_target(&self, name: &str, annotation: Option<Type>) -> Result<Target, TypeError> {
        match self.scope.lookup_local(name) {
            Some((ty, frame)) => {
                self.ensure_assignable(name, frame)?;
                if let Some(annotated) = annotation.filter(|annotated| !annotated.compatible(&ty)) {
                    return Err(TypeError::Mismatch {
                        expected: ty,
                        found: annotated,
                        construct: format!("annotation of {name}"),
                    });
                }
                Ok(Target {
                    receiver: Receiver::Variable(name.to_string()),
                    expected: Some(ty),
                    declares: None,
                })
            }
            None => {
                if builtins::builtin_type(name).is_some() {
                    return Err(TypeError::invalid(
                        "assignment",
                        format!("built-in {name} cannot be reassigned"),
                    ));
                }
                Ok(Target {
                    receiver: Receiver::Variable(name.to_string()),
                    expected: annotation,
                    declares: Some(name.to_string()),
                })
            }
        }
    }

    fn ensure_assignable(&self, name: &str, frame: usize) -> Result<(), TypeError> {
        match self.scope.function_frame() {
            Some(function) if frame < function => Err(TypeError::CapturedAssignment {
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn field_target(&self, raw: &RawNode) -> Result<Target, TypeError> {
        let mut path = Vec::new();
        let mut node = raw;
        while let RawNode::Branch(NodeKind::FieldReceiver, parts) = node {
            path.push(identifier(child(parts, 1, "field")?, "field")?.to_string());
            node = child(parts, 0, "field")?;
        }
        path.reverse();
        let base = identifier(node, "field receiver")?;

        let Some((mut ty, frame)) = self.scope.lookup_local(base) else {
            return Err(TypeError::Unbound {
                name: base.to_string(),
            });
        };
        self.ensure_assignable(base, frame)?;
        for field in &path {
            ty = field_type(&ty, field)?;
        }
        Ok(Target {
            receiver: Receiver::Field {
                base: base.to_string(),
                path,
            },
            expected: Some(ty),
            declares: None,
        })
    }

    fn check_annotation(&self, raw: &RawNode) -> Result<Type, TypeError> {
        match raw {
            RawNode::Leaf(token) => match (token.category, token.text.as_str()) {
                (Category::Keyword, "int") => Ok(Type::Int),
                (Category::Keyword, "double") => Ok(Type::Double),
                (Category::Keyword, "bool") => Ok(Type::Bool),
                (Category::Keyword, "string") => Ok(Type::Str),
                (Category::Keyword, "char") => Ok(Type::Char),
                (Category::Identifier, constructor) => self
                    .structs
                    .get(&struct_name(constructor))
                    .map(|structure| Type::Struct(structure.clone()))
                    .ok_or_else(|| {
                        TypeError::invalid(
                            "annotation",
                            format!("{constructor} does not name a struct type"),
                        )
                    }),
                (_, other) => Err(TypeError::invalid(
                    "annotation",
                    format!("`{other}` is not a type"),
                )),
            },
            RawNode::Branch(NodeKind::TupleType, items) => Ok(Type::Tuple(
                items
                    .iter()
                    .map(|item| self.check_annotation(item))
                    .collect::<Result<_, _>>()?,
            )),
            RawNode::Branch(NodeKind::ArrayType, items) => Ok(Type::Array(Box::new(
                self.check_annotation(child(items, 0, "array type")?)?,
            ))),
            RawNode::Branch(NodeKind::FunctionType, items) => {
                let Some((result, params)) = items.split_last() else {
                    return Err(TypeError::invalid("function type", "missing result type"));
                };
                let params = params
                    .iter()
                    .map(|param| self.check_annotation(param))
                    .collect::<Result<_, _>>()?;
                Ok(Type::function(params, self.check_annotation(result)?))
            }
            RawNode::Branch(kind, _) => Err(TypeError::invalid(
                "annotation",
                format!("{kind} is not a type"),
            )),
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    /// Type an expression that is used as a value, which rules out
    /// overloaded functions that have not been applied yet.
    fn check_value(&mut self, raw: &RawNode) -> Result<Expr, TypeError> {
        let expr = self.check_expr(raw)?;
        if expr.ty.is_overloaded() {
            return Err(TypeError::Overloaded {
                name: describe(&expr),
            });
        }
        Ok(expr)
    }

    fn check_expr(&mut self, raw: &RawNode) -> Result<Expr, TypeError> {
        let (kind, children) = match raw {
            RawNode::Leaf(token) => return self.check_leaf(token),
            RawNode::Branch(kind, children) => (*kind, children.as_slice()),
        };

        match kind {
            NodeKind::Negative => {
                let token = child(children, 0, "negative")?
                    .token()
                    .ok_or_else(|| TypeError::invalid("negative", "expected a constant"))?;
                constant(&token.text, true)
            }
            NodeKind::BinaryOp => {
                let [lhs, op, rhs] = children else {
                    return Err(TypeError::invalid("operator", "malformed operation"));
                };
                let op = op
                    .token()
                    .and_then(|token| BinaryOp::from_symbol(&token.text))
                    .ok_or_else(|| TypeError::invalid("operator", "unknown operator"))?;
                let lhs = self.check_value(lhs)?;
                let rhs = self.check_value(rhs)?;
                let ty = binary_type(op, &lhs.ty, &rhs.ty)?;
                Ok(Expr {
                    kind: ExprKind::BinaryOp {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                })
            }
            NodeKind::Conditional => {
                let condition = self.check_condition(child(children, 0, "conditional")?)?;
                let then = self.check_value(child(children, 1, "conditional")?)?;
                let otherwise = self.check_value(child(children, 2, "conditional")?)?;
                if !then.ty.compatible(&otherwise.ty) {
                    return Err(TypeError::Mismatch {
                        expected: then.ty,
                        found: otherwise.ty,
                        construct: "conditional branches".to_string(),
                    });
                }
                Ok(Expr {
                    ty: then.ty.clone(),
                    kind: ExprKind::Conditional {
                        condition: Box::new(condition),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                })
            }
            NodeKind::FunctionLiteral => self.check_function_literal(children),
            NodeKind::StructConstructor => self.check_struct_constructor(children),
            NodeKind::Tuple => {
                let items = children
                    .iter()
                    .map(|item| self.check_value(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr {
                    ty: Type::Tuple(items.iter().map(|item| item.ty.clone()).collect()),
                    kind: ExprKind::Tuple(items),
                })
            }
            NodeKind::Array => {
                let items = children
                    .iter()
                    .map(|item| self.check_value(item))
                    .collect::<Result<Vec<_>, _>>()?;
                let Some(first) = items.first() else {
                    return Err(TypeError::invalid("array", "arrays need at least one element"));
                };
                let element = first.ty.clone();
                for item in &items[1..] {
                    expect_type(&element, &item.ty, "array element")?;
                }
                Ok(Expr {
                    ty: Type::Array(Box::new(element)),
                    kind: ExprKind::Array(items),
                })
            }
            NodeKind::Field => {
                let base = self.check_value(child(children, 0, "field")?)?;
                let field = identifier(child(children, 1, "field")?, "field")?;
                let ty = field_type(&base.ty, field)?;
                Ok(Expr {
                    kind: ExprKind::Field {
                        base: Box::new(base),
                        field: field.to_string(),
                    },
                    ty,
                })
            }
            NodeKind::Index => {
                let base = self.check_value(child(children, 0, "index")?)?;
                let index = self.check_value(child(children, 1, "index")?)?;
                let Type::Array(element) = &base.ty else {
                    return Err(TypeError::invalid(
                        "index",
                        format!("cannot index into {}", base.ty),
                    ));
                };
                expect_type(&Type::Int, &index.ty, "array index")?;
                Ok(Expr {
                    ty: (**element).clone(),
                    kind: ExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(index),
                    },
                })
            }
            NodeKind::Apply => {
                let callee = self.check_expr(child(children, 0, "apply")?)?;
                let arg = self.check_value(child(children, 1, "apply")?)?;
                let (callee, signature) =
                    select_signature(callee, std::slice::from_ref(&arg.ty), "apply")?;
                Ok(Expr {
                    ty: Type::Function(vec![signature.drop_params(1)]),
                    kind: ExprKind::Apply {
                        callee: Box::new(callee),
                        arg: Box::new(arg),
                    },
                })
            }
            NodeKind::TupleApply => {
                let callee = self.check_expr(child(children, 0, "tuple apply")?)?;
                let args = self.check_value(child(children, 1, "tuple apply")?)?;
                let Type::Tuple(items) = &args.ty else {
                    return Err(TypeError::invalid(
                        "tuple apply",
                        format!("needs a tuple of arguments, found {}", args.ty),
                    ));
                };
                let (callee, signature) = select_signature(callee, items, "tuple apply")?;
                Ok(Expr {
                    ty: Type::Function(vec![signature.drop_params(items.len())]),
                    kind: ExprKind::TupleApply {
                        callee: Box::new(callee),
                        args: Box::new(args),
                    },
                })
            }
            NodeKind::Call => {
                let callee = self.check_value(child(children, 0, "call")?)?;
                let Some(signature) = callee.ty.signature() else {
                    return Err(TypeError::NotAFunction {
                        construct: describe(&callee),
                        found: callee.ty.clone(),
                    });
                };
                if !signature.params.is_empty() {
                    return Err(TypeError::MissingArguments {
                        construct: describe(&callee),
                        remaining: signature.params.len(),
                        ty: callee.ty.clone(),
                    });
                }
                Ok(Expr {
                    ty: (*signature.result).clone(),
                    kind: ExprKind::Call(Box::new(callee)),
                })
            }
            other => Err(TypeError::invalid(
                "expression",
                format!("{other} is not an expression"),
            )),
        }
    }

    fn check_leaf(&mut self, token: &Token) -> Result<Expr, TypeError> {
        match token.category {
            Category::Constant => constant(&token.text, false),
            Category::Identifier => self.check_reference(&token.text),
            _ => Err(TypeError::invalid(
                "expression",
                format!("unexpected `{}`", token.text),
            )),
        }
    }

    fn check_reference(&mut self, name: &str) -> Result<Expr, TypeError> {
        match self.scope.lookup(name) {
            None => Err(TypeError::Unbound {
                name: name.to_string(),
            }),
            Some(Resolution::Builtin(ty)) => {
                let kind = ty
                    .signature()
                    .and_then(|signature| builtins::resolve(name, signature));
                Ok(match kind {
                    Some(kind) => Expr {
                        kind: ExprKind::Builtin(kind),
                        ty,
                    },
                    // Overloaded: resolved when applied.
                    None => Expr {
                        kind: ExprKind::Variable(name.to_string()),
                        ty,
                    },
                })
            }
            Some(Resolution::Local { ty, frame }) => {
                self.record_capture(name, frame);
                Ok(Expr {
                    kind: ExprKind::Variable(name.to_string()),
                    ty,
                })
            }
            Some(Resolution::Defining(defining)) => {
                let Some(ty) = defining.ty else {
                    return Err(TypeError::UndeclaredRecursion {
                        name: name.to_string(),
                    });
                };
                self.record_capture(name, defining.frame);
                if let Some(function) = self
                    .functions
                    .iter_mut()
                    .find(|function| function.frame == defining.frame)
                {
                    function.recursive = true;
                }
                Ok(Expr {
                    kind: ExprKind::Variable(name.to_string()),
                    ty,
                })
            }
        }
    }

    /// Every function literal opened above `frame` captures `name`.
    fn record_capture(&mut self, name: &str, frame: usize) {
        for function in &mut self.functions {
            if function.frame > frame {
                function.captures.insert(name.to_string());
            }
        }
    }

    fn check_params(&self, raw: Option<&RawNode>) -> Result<Vec<(String, Type)>, TypeError> {
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        let mut params: Vec<(String, Type)> = Vec::new();
        for param in raw.children() {
            let (name, ty) = match param {
                RawNode::Leaf(token) => {
                    let ty = Sigil::of(&token.text)
                        .and_then(|sigil| sigil.primitive_type())
                        .ok_or_else(|| {
                            TypeError::invalid(
                                format!("parameter {}", token.text),
                                "needs a type annotation",
                            )
                        })?;
                    (token.text.clone(), ty)
                }
                RawNode::Branch(NodeKind::Annotated, parts) => {
                    let name = identifier(child(parts, 0, "parameter")?, "parameter")?;
                    let ty = self.check_annotation(child(parts, 1, "parameter")?)?;
                    if !Sigil::of(name).is_some_and(|sigil| sigil.admits(&ty)) {
                        return Err(TypeError::Sigil {
                            name: name.to_string(),
                            found: ty,
                        });
                    }
                    (name.to_string(), ty)
                }
                RawNode::Branch(kind, _) => {
                    return Err(TypeError::invalid(
                        "parameter",
                        format!("{kind} cannot be a parameter"),
                    ));
                }
            };
            if params.iter().any(|(existing, _)| *existing == name) {
                return Err(TypeError::invalid(
                    format!("parameter {name}"),
                    "appears more than once",
                ));
            }
            params.push((name, ty));
        }
        Ok(params)
    }

    fn check_function_literal(&mut self, children: &[RawNode]) -> Result<Expr, TypeError> {
        let (params_raw, body_raw) = match children {
            [params, body] if params.kind() == Some(NodeKind::Params) => (Some(params), body),
            [body] => (None, body),
            _ => return Err(TypeError::invalid("function", "malformed function literal")),
        };
        let params = self.check_params(params_raw)?;

        // The body is typed in a child of a snapshot of the defining scope.
        let outer = self.scope.clone();
        let frame = self.scope.push_function(&params);
        let self_name = self
            .scope
            .defining()
            .filter(|defining| defining.frame == frame)
            .map(|defining| defining.name.clone());
        self.functions.push(FunctionContext {
            frame,
            captures: BTreeSet::new(),
            recursive: false,
            returns: Vec::new(),
            outer_loops: self.loops,
        });
        self.loops = 0;

        let body = match body_raw.kind() {
            Some(NodeKind::Block) => FunctionBody::Block(self.check_block(body_raw)?),
            _ => FunctionBody::Expr(self.check_value(body_raw)?),
        };

        let context = self
            .functions
            .pop()
            .ok_or_else(|| TypeError::invalid("function", "lost track of the function body"))?;
        self.loops = context.outer_loops;
        self.scope = outer;

        let result = match &body {
            FunctionBody::Expr(expr) => expr.ty.clone(),
            FunctionBody::Block(_) => context.returns.first().cloned().ok_or_else(|| {
                TypeError::invalid("function", "a block body needs at least one return")
            })?,
        };
        let def = FunctionDef {
            params,
            body,
            result,
            captures: context.captures.into_iter().collect(),
            self_name: self_name.filter(|_| context.recursive),
        };
        Ok(Expr {
            ty: def.ty(),
            kind: ExprKind::FunctionLiteral(Rc::new(def)),
        })
    }

    fn check_struct_constructor(&mut self, children: &[RawNode]) -> Result<Expr, TypeError> {
        let Some(binding) = self.naming.take() else {
            return Err(TypeError::invalid(
                "struct constructor",
                "must be assigned directly to an o identifier",
            ));
        };
        let fields = self.check_params(children.first())?;
        let structure = StructType {
            name: struct_name(&binding),
            fields,
        };
        match self.structs.get(&structure.name) {
            Some(existing) if *existing != structure => {
                return Err(TypeError::StructRedefined {
                    name: structure.name,
                });
            }
            Some(_) => {}
            None => {
                self.structs
                    .insert(structure.name.clone(), structure.clone());
            }
        }
        let ty = Type::function(
            structure.fields.iter().map(|(_, ty)| ty.clone()).collect(),
            Type::Struct(structure.clone()),
        );
        Ok(Expr {
            kind: ExprKind::StructConstructor(structure),
            ty,
        })
    }
}

// ---------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------

fn child<'a>(children: &'a [RawNode], index: usize, construct: &str) -> Result<&'a RawNode, TypeError> {
    children
        .get(index)
        .ok_or_else(|| TypeError::invalid(construct, "missing part"))
}

fn identifier<'a>(raw: &'a RawNode, construct: &str) -> Result<&'a str, TypeError> {
    match raw.token() {
        Some(token) if token.category == Category::Identifier => Ok(&token.text),
        _ => Err(TypeError::invalid(construct, "expected an identifier")),
    }
}

fn expect_type(expected: &Type, found: &Type, construct: &str) -> Result<(), TypeError> {
    if expected.compatible(found) {
        Ok(())
    } else {
        Err(TypeError::Mismatch {
            expected: expected.clone(),
            found: found.clone(),
            construct: construct.to_string(),
        })
    }
}

fn field_type(base: &Type, field: &str) -> Result<Type, TypeError> {
    match base {
        Type::Struct(structure) => {
            structure
                .field(field)
                .cloned()
                .ok_or_else(|| TypeError::UnknownField {
                    structure: structure.name.clone(),
                    field: field.to_string(),
                })
        }
        other => Err(TypeError::NotAStruct {
            found: other.clone(),
            field: field.to_string(),
        }),
    }
}

fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Variable(name) => name.clone(),
        ExprKind::Builtin(kind) => kind.descriptor().name.to_string(),
        _ => "expression".to_string(),
    }
}

/// Pick the signature that accepts `args` as leading arguments. Overloaded
/// built-ins are narrowed to the chosen overload.
fn select_signature(
    callee: Expr,
    args: &[Type],
    construct: &str,
) -> Result<(Expr, Signature), TypeError> {
    let Type::Function(signatures) = &callee.ty else {
        return Err(TypeError::NotAFunction {
            construct: describe(&callee),
            found: callee.ty.clone(),
        });
    };

    if let [signature] = signatures.as_slice() {
        if signature.params.len() < args.len() {
            return Err(TypeError::Saturated {
                construct: format!("{construct} to {}", describe(&callee)),
                ty: callee.ty.clone(),
            });
        }
        for (param, arg) in signature.params.iter().zip(args) {
            expect_type(param, arg, &format!("argument of {}", describe(&callee)))?;
        }
        let signature = signature.clone();
        return Ok((callee, signature));
    }

    let chosen = signatures
        .iter()
        .find(|signature| {
            signature.params.len() >= args.len()
                && signature.params.iter().zip(args).all(|(p, a)| p.compatible(a))
        })
        .cloned();
    let name = describe(&callee);
    let Some(chosen) = chosen else {
        return Err(TypeError::NoOverload {
            name,
            found: match args {
                [single] => single.clone(),
                many => Type::Tuple(many.to_vec()),
            },
        });
    };
    let kind = builtins::resolve(&name, &chosen).ok_or_else(|| TypeError::NoOverload {
        name: name.clone(),
        found: Type::Function(vec![chosen.clone()]),
    })?;
    let callee = Expr {
        kind: ExprKind::Builtin(kind),
        ty: Type::Function(vec![chosen.clone()]),
    };
    Ok((callee, chosen))
}

fn binary_type(op: BinaryOp, lhs: &Type, rhs: &Type) -> Result<Type, TypeError> {
    let result = match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Type::Int, Type::Int)
            | (Type::Double, Type::Double)
            | (Type::Str, Type::Str) => Some(lhs.clone()),
            (Type::Array(left), Type::Array(right)) if left.compatible(right) => Some(lhs.clone()),
            _ => None,
        },
        BinaryOp::Sub | BinaryOp::Mul => match (lhs, rhs) {
            (Type::Int, Type::Int) | (Type::Double, Type::Double) => Some(lhs.clone()),
            _ => None,
        },
        BinaryOp::Div => {
            matches!((lhs, rhs), (Type::Double, Type::Double)).then_some(Type::Double)
        }
        BinaryOp::IntDiv | BinaryOp::Rem => {
            matches!((lhs, rhs), (Type::Int, Type::Int)).then_some(Type::Int)
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            (lhs.compatible(rhs) && lhs.is_comparable()).then_some(Type::Bool)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            (lhs.compatible(rhs) && lhs.is_ordered()).then_some(Type::Bool)
        }
        BinaryOp::And | BinaryOp::Or => {
            matches!((lhs, rhs), (Type::Bool, Type::Bool)).then_some(Type::Bool)
        }
    };
    result.ok_or_else(|| TypeError::Operator {
        verb: op.verb().to_string(),
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    })
}

fn constant(text: &str, negative: bool) -> Result<Expr, TypeError> {
    let literal = if text == "true" || text == "false" {
        Literal::Bool(text == "true")
    } else if let Some(body) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Literal::Str(unescape(body)?)
    } else if let Some(body) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        let unescaped = unescape(body)?;
        let mut chars = unescaped.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Literal::Char(c),
            _ => return Err(TypeError::invalid("constant", format!("{text} is not one character"))),
        }
    } else if text.contains('.') {
        let value: f64 = text
            .parse()
            .map_err(|_| TypeError::invalid("constant", format!("{text} is not a number")))?;
        Literal::Double(if negative { -value } else { value })
    } else {
        let digits = if negative { format!("-{text}") } else { text.to_string() };
        let value: i64 = digits.parse().map_err(|_| {
            TypeError::invalid("constant", format!("integer {digits} is out of range"))
        })?;
        Literal::Int(value)
    };

    let ty = match &literal {
        Literal::Int(_) => Type::Int,
        Literal::Double(_) => Type::Double,
        Literal::Bool(_) => Type::Bool,
        Literal::Str(_) => Type::Str,
        Literal::Char(_) => Type::Char,
    };
    if negative && !matches!(ty, Type::Int | Type::Double) {
        return Err(TypeError::invalid("negative", "only numbers can be negated"));
    }
    Ok(Expr {
        kind: ExprKind::Constant(literal),
        ty,
    })
}

fn unescape(body: &str) -> Result<String, TypeError> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            other => {
                return Err(TypeError::invalid(
                    "constant",
                    format!("unknown escape \\{}", other.map(String::from).unwrap_or_default()),
                ));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn check_all(source: &str) -> Result<Vec<Statement>, TypeError> {
        let grammar = crate::grammar::standard().expect("grammar");
        let raw = parse_source(grammar, source).expect("parse");
        let mut checker = TypeChecker::new();
        raw.iter().map(|statement| checker.convert(statement)).collect()
    }

    fn check_error(source: &str) -> TypeError {
        check_all(source).expect_err("expected a type error")
    }

    fn assignment_type(statement: &Statement) -> &Type {
        match statement {
            Statement::Assignment { value, .. } => &value.ty,
            other => panic!("not an assignment: {other:?}"),
        }
    }

    #[test]
    fn operator_mismatch_names_both_sides() {
        let err = check_error("iX = 3\niZ = iX + \"s\"");
        assert_eq!(err.to_string(), "string cannot add with type integer");
    }

    #[test]
    fn operator_table_follows_operand_types() {
        let ok = check_all(
            "dA = 1.0 / 2.0\niB = 7 // 2\niC = 7 % 2\nsD = \"a\" + \"b\"\naE = [1] + [2, 3]\nbF = 'a' < 'b'",
        )
        .unwrap();
        assert_eq!(assignment_type(&ok[0]), &Type::Double);
        assert_eq!(
            assignment_type(&ok[4]),
            &Type::Array(Box::new(Type::Int))
        );
        assert!(matches!(check_error("iX = 1 / 2"), TypeError::Operator { .. }));
        assert!(matches!(check_error("dX = 1.0 // 2.0"), TypeError::Operator { .. }));
        assert!(matches!(check_error("bX = true < false"), TypeError::Operator { .. }));
    }

    #[test]
    fn application_consumes_parameters_one_at_a_time() {
        let statements = check_all("fX = iA iB -> iA + iB\nfY = fX : 3\niC = fY : 4 ;").unwrap();
        assert_eq!(
            assignment_type(&statements[1]),
            &Type::function(vec![Type::Int], Type::Int)
        );
        assert_eq!(assignment_type(&statements[2]), &Type::Int);
    }

    #[test]
    fn tuple_apply_consumes_a_prefix() {
        let statements =
            check_all("fX = iA iB iC -> iA + iB + iC\nfY = fX :: (1, 2)\niZ = fY : 3 ;").unwrap();
        assert_eq!(
            assignment_type(&statements[1]),
            &Type::function(vec![Type::Int], Type::Int)
        );
    }

    #[test]
    fn saturated_and_incomplete_calls_are_rejected() {
        assert!(matches!(
            check_error("fX = iA -> iA\nfY = fX : 1 : 2"),
            TypeError::Saturated { .. }
        ));
        assert!(matches!(
            check_error("fX = iA iB -> iA\niY = fX : 1 ;"),
            TypeError::MissingArguments { remaining: 1, .. }
        ));
        assert!(matches!(
            check_error("fX = iA -> iA\niY = fX : \"s\" ;"),
            TypeError::Mismatch { .. }
        ));
    }

    #[test]
    fn sigils_constrain_new_bindings() {
        assert!(matches!(check_error("iX = \"text\""), TypeError::Sigil { .. }));
        assert!(matches!(check_error("fiX = iA -> 1.5"), TypeError::Sigil { .. }));
        assert!(check_all("fX = iA -> 1.5\nfdY = iA -> 1.5").is_ok());
        assert!(matches!(
            check_error("iX = 1\niX = 2.5"),
            TypeError::Mismatch { .. }
        ));
    }

    #[test]
    fn recursion_needs_a_declared_type() {
        let statements =
            check_all("fiFact = iN -> if iN < 2 then 1 else iN * (fiFact : (iN - 1) ;)").unwrap();
        let Statement::Assignment { value, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        let ExprKind::FunctionLiteral(def) = &value.kind else {
            panic!("expected function literal");
        };
        assert_eq!(def.self_name.as_deref(), Some("fiFact"));
        assert!(def.captures.is_empty());

        assert_eq!(
            check_error("fX = iN -> fX : iN ;"),
            TypeError::UndeclaredRecursion { name: "fX".into() }
        );
        assert!(check_all("fX{(int -> int)} = iN -> fX : iN ;").is_ok());
    }

    #[test]
    fn char_constants_hold_exactly_one_character() {
        let newline = constant("'\\n'", false).unwrap();
        assert_eq!(newline.kind, ExprKind::Constant(Literal::Char('\n')));
        assert_eq!(newline.ty, Type::Char);
        assert!(constant("'ab'", false).is_err());
        assert!(constant("''", false).is_err());
    }

    #[test]
    fn bare_recursion_takes_its_type_from_the_base_case() {
        let statements =
            check_all("fFact = iN -> if iN < 2 then 1 else iN * (fFact : (iN - 1) ;)").unwrap();
        assert_eq!(
            assignment_type(&statements[0]),
            &Type::function(vec![Type::Int], Type::Int)
        );
        let Statement::Assignment { value, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        let ExprKind::FunctionLiteral(def) = &value.kind else {
            panic!("expected function literal");
        };
        assert_eq!(def.self_name.as_deref(), Some("fFact"));

        assert_eq!(
            check_error("fX = iN -> if iN < 2 then (fX : 1 ;) else (fX : iN ;)"),
            TypeError::UndeclaredRecursion { name: "fX".into() }
        );
    }

    #[test]
    fn reassignment_reads_the_previous_function() {
        let statements = check_all("fiF = iN -> iN + 1\nfiF = iN -> (fiF : iN ;) * 2").unwrap();
        let Statement::Assignment { value, declares, .. } = &statements[1] else {
            panic!("expected assignment");
        };
        assert!(!declares);
        let ExprKind::FunctionLiteral(def) = &value.kind else {
            panic!("expected function literal");
        };
        assert_eq!(def.self_name, None);
        assert_eq!(def.captures, vec!["fiF".to_string()]);
    }

    #[test]
    fn parameters_shadow_the_function_being_defined() {
        let statements = check_all("fiG = fiG{(int -> int)} -> fiG : 1 ;").unwrap();
        let Statement::Assignment { value, .. } = &statements[0] else {
            panic!("expected assignment");
        };
        let ExprKind::FunctionLiteral(def) = &value.kind else {
            panic!("expected function literal");
        };
        assert_eq!(def.self_name, None);
        assert!(def.captures.is_empty());
        assert_eq!(def.result, Type::Int);
    }

    #[test]
    fn defining_slot_is_cleared_after_the_right_hand_side() {
        // `fiG` referring to `fiF` after `fiF` is bound is an ordinary capture.
        let statements = check_all("fiF = iN -> iN\nfiG = iN -> fiF : iN ;").unwrap();
        let Statement::Assignment { value, .. } = &statements[1] else {
            panic!("expected assignment");
        };
        let ExprKind::FunctionLiteral(def) = &value.kind else {
            panic!("expected function literal");
        };
        assert_eq!(def.captures, vec!["fiF".to_string()]);
        assert_eq!(def.self_name, None);
    }

    #[test]
    fn structs_register_field_types() {
        let statements =
            check_all("oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\niX2 = oP.iX").unwrap();
        assert_eq!(assignment_type(&statements[2]), &Type::Int);
        assert!(matches!(
            check_error("oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\niZ = oP.iZ"),
            TypeError::UnknownField { .. }
        ));
        assert!(matches!(
            check_error("oPoint = iX -> struct\noPoint = dX -> struct"),
            TypeError::StructRedefined { .. }
        ));
    }

    #[test]
    fn field_receivers_need_an_existing_struct() {
        assert!(check_all("oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\noP.iX = 5").is_ok());
        assert!(matches!(
            check_error("oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\noP.iX = 1.5"),
            TypeError::Mismatch { .. }
        ));
        assert!(matches!(check_error("oQ.iX = 1"), TypeError::Unbound { .. }));
    }

    #[test]
    fn conditional_receivers_need_matching_bindings() {
        assert!(check_all("iA = 1\niB = 2\n(if true then iA else iB) = 3").is_ok());
        assert!(check_error("iA = 1\n(if true then iA else iB) = 3")
            .to_string()
            .contains("already be bound"));
        assert!(matches!(
            check_error("iA = 1\ndB = 2.0\n(if true then iA else dB) = 3"),
            TypeError::Mismatch { .. }
        ));
    }

    #[test]
    fn captured_names_cannot_be_assigned() {
        let err = check_error("iX = 1\nfY = iA -> do\n  iX = iA\n  return iA\nenddo");
        assert_eq!(err, TypeError::CapturedAssignment { name: "iX".into() });
    }

    #[test]
    fn block_bodies_need_agreeing_returns() {
        assert!(check_all("fX = iA -> do\n  return iA\nenddo").is_ok());
        assert!(check_error("fX = iA -> do\n  iB = iA\nenddo")
            .to_string()
            .contains("at least one return"));
        assert!(matches!(
            check_error("fX = iA -> do\n  if iA > 0 then\n    return 1\n  endif\n  return 1.5\nenddo"),
            TypeError::Mismatch { .. }
        ));
    }

    #[test]
    fn overloaded_builtins_must_be_applied() {
        let statements = check_all("sX = fsShow : 4 ;\nsY = fsShow : 'c' ;").unwrap();
        let Statement::Assignment { value, .. } = &statements[1] else {
            panic!("expected assignment");
        };
        let ExprKind::Call(apply) = &value.kind else {
            panic!("expected call");
        };
        let ExprKind::Apply { callee, .. } = &apply.kind else {
            panic!("expected apply");
        };
        assert_eq!(callee.kind, ExprKind::Builtin(builtins::BuiltinKind::ShowChar));
        assert!(matches!(check_error("fX = fsShow"), TypeError::Overloaded { .. }));
        assert!(matches!(
            check_error("sX = fsShow : (1, 2) ;"),
            TypeError::NoOverload { .. }
        ));
    }

    #[test]
    fn loops_and_blocks_scope_their_bindings() {
        assert!(matches!(
            check_error("do\n  iX = 1\nenddo\niY = iX"),
            TypeError::Unbound { .. }
        ));
        assert!(check_all("iS = 0\nfor iI = 1 to 3 do\n  iS = iS + iI\nendfor").is_ok());
        assert!(check_all("iS = 0\nfor iV in [1, 2] do\n  iS = iS + iV\nendfor").is_ok());
        assert!(check_error("break").to_string().contains("not inside a loop"));
        assert!(check_error("return 1").to_string().contains("not inside a function"));
    }

    #[test]
    fn failed_statements_leave_the_scope_untouched() {
        let grammar = crate::grammar::standard().unwrap();
        let raw = parse_source(grammar, "iX = 1\niY = iX + \"s\"\niY = 2.5").unwrap();
        let mut checker = TypeChecker::new();
        checker.convert(&raw[0]).unwrap();
        assert!(checker.convert(&raw[1]).is_err());
        assert_eq!(checker.binding("iY"), None);
        assert!(matches!(checker.convert(&raw[2]), Err(TypeError::Sigil { .. })));
    }

    #[test]
    fn integer_constants_must_fit() {
        assert!(check_all("iX = -9223372036854775808").is_ok());
        assert!(check_error("iX = 9223372036854775808")
            .to_string()
            .contains("out of range"));
    }
}
