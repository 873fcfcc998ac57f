//! Tree-walking executor over typed statements.
//!
//! The executor keeps one mutable root environment per program run: a stack
//! of persistent frames, innermost last. Calling a closure swaps the stack
//! for the closure's captured snapshot plus a parameter frame and restores
//! it afterwards, so a call can never touch the caller's bindings.

use std::cmp::Ordering;
use std::rc::Rc;

use tracing::trace;

use crate::ast::{BinaryOp, Expr, ExprKind, FunctionBody, Literal, Receiver, Statement};
use crate::error::RuntimeError;
use crate::value::{Closure, Env, StructValue, Value};

/// How control leaves a statement.
/// Calls allowed in progress at once before the run is aborted.
pub const MAX_CALL_DEPTH: usize = 2_000;

/// Stack size for threads that execute Glyph programs. Enough for
/// [`MAX_CALL_DEPTH`] nested calls with room to spare.
pub const STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[derive(Debug)]
pub struct Executor {
    frames: Vec<Env>,
    /// Number of function calls in progress. Output is only produced at 0.
    depth: usize,
    output: Vec<String>,
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Executor {
            frames: vec![Env::new()],
            depth: 0,
            output: Vec::new(),
        }
    }

    /// Execute one top-level statement and return the lines it printed.
    ///
    /// When an error is returned, the lines printed before it are still
    /// available from [`Executor::take_output`].
    pub fn run(&mut self, statement: &Statement) -> Result<Vec<String>, RuntimeError> {
        let flow = self.execute(statement)?;
        match flow {
            Flow::Normal => Ok(self.take_output()),
            Flow::Break => Err(stray("break")),
            Flow::Continue => Err(stray("continue")),
            Flow::Return(_) => Err(stray("return")),
        }
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Current value of a binding, innermost frame first.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    fn print(&mut self, line: String) {
        if self.depth == 0 {
            self.output.push(line);
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn execute(&mut self, statement: &Statement) -> Result<Flow, RuntimeError> {
        match statement {
            Statement::Assignment {
                target,
                value,
                declares,
            } => {
                let value = self.eval(value)?;
                let shown = self.assign(target, value.clone(), *declares)?;
                self.print(format!("{shown} = {value}"));
                Ok(Flow::Normal)
            }
            Statement::Return(value) => Ok(Flow::Return(self.eval(value)?)),
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Expression(expr) => {
                let value = self.eval(expr)?;
                self.print(value.to_string());
                Ok(Flow::Normal)
            }
            Statement::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    if self.eval_bool(condition)? {
                        return self.execute_block(body, None);
                    }
                }
                match otherwise {
                    Some(body) => self.execute_block(body, None),
                    None => Ok(Flow::Normal),
                }
            }
            Statement::While { condition, body } => {
                while self.eval_bool(condition)? {
                    match self.execute_block(body, None)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::DoWhile { body, condition } => {
                loop {
                    match self.execute_block(body, None)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if !self.eval_bool(condition)? {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::For {
                var,
                from,
                to,
                body,
            } => {
                let from = self.eval_int(from)?;
                let to = self.eval_int(to)?;
                let mut current = from;
                while current <= to {
                    match self.execute_block(body, Some((var, Value::Int(current))))? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    // Stepping past i64::MAX would overflow.
                    if current == to {
                        break;
                    }
                    current += 1;
                }
                Ok(Flow::Normal)
            }
            Statement::ForIn {
                var,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable)? {
                    Value::Array(items) => items,
                    other => return Err(mismatch("array", &other)),
                };
                for item in items {
                    match self.execute_block(body, Some((var, item)))? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::Do(body) => self.execute_block(body, None),
        }
    }

    /// Run `body` in a fresh frame, optionally seeded with a loop variable.
    fn execute_block(
        &mut self,
        body: &[Statement],
        seed: Option<(&String, Value)>,
    ) -> Result<Flow, RuntimeError> {
        let mut frame = Env::new();
        if let Some((name, value)) = seed {
            frame.insert(name.clone(), value);
        }
        self.frames.push(frame);
        let result = self.execute_statements(body);
        self.frames.pop();
        result
    }

    fn execute_statements(&mut self, body: &[Statement]) -> Result<Flow, RuntimeError> {
        for statement in body {
            match self.execute(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    /// Store `value` through `target`. Returns the receiver that was written.
    fn assign(
        &mut self,
        target: &Receiver,
        value: Value,
        declares: bool,
    ) -> Result<String, RuntimeError> {
        match target {
            Receiver::Variable(name) => {
                if declares {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.insert(name.clone(), value);
                    }
                } else {
                    self.rebind(name, value)?;
                }
                Ok(name.clone())
            }
            Receiver::Field { base, path } => {
                let current = self
                    .value(base)
                    .cloned()
                    .ok_or_else(|| RuntimeError::Unbound { name: base.clone() })?;
                let updated = replace_field(current, path, value)?;
                self.rebind(base, updated)?;
                Ok(target.to_string())
            }
            Receiver::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let chosen = if self.eval_bool(condition)? {
                    then
                } else {
                    otherwise
                };
                self.assign(chosen, value, false)
            }
        }
    }

    /// Overwrite an existing binding in the frame that holds it.
    fn rebind(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.contains_key(name))
            .ok_or_else(|| RuntimeError::Unbound {
                name: name.to_string(),
            })?;
        frame.insert(name.to_string(), value);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Constant(literal) => Ok(match literal {
                Literal::Int(n) => Value::Int(*n),
                Literal::Double(d) => Value::Double(*d),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Char(c) => Value::Char(*c),
            }),
            ExprKind::Variable(name) => {
                self.value(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::Unbound { name: name.clone() })
            }
            ExprKind::Builtin(kind) => Ok(Value::Builtin(*kind, Vec::new())),
            ExprKind::Field { base, field } => match self.eval(base)? {
                Value::Struct(record) => {
                    record
                        .field(field)
                        .cloned()
                        .ok_or_else(|| RuntimeError::UnknownField {
                            field: field.clone(),
                        })
                }
                other => Err(mismatch("struct", &other)),
            },
            ExprKind::Index { base, index } => {
                let items = match self.eval(base)? {
                    Value::Array(items) => items,
                    other => return Err(mismatch("array", &other)),
                };
                let index = self.eval_int(index)?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or(RuntimeError::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval_bool(condition)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::FunctionLiteral(def) => {
                let env = def
                    .captures
                    .iter()
                    .filter_map(|name| self.value(name).map(|value| (name.clone(), value.clone())))
                    .collect();
                Ok(Value::Function(Closure {
                    def: Rc::clone(def),
                    applied: Vec::new(),
                    env,
                }))
            }
            ExprKind::StructConstructor(structure) => {
                Ok(Value::Constructor(Rc::new(structure.clone()), Vec::new()))
            }
            ExprKind::BinaryOp { op, lhs, rhs } => match op {
                BinaryOp::And => Ok(Value::Bool(self.eval_bool(lhs)? && self.eval_bool(rhs)?)),
                BinaryOp::Or => Ok(Value::Bool(self.eval_bool(lhs)? || self.eval_bool(rhs)?)),
                _ => {
                    let lhs = self.eval(lhs)?;
                    let rhs = self.eval(rhs)?;
                    binary(*op, lhs, rhs)
                }
            },
            ExprKind::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            ExprKind::Array(items) => Ok(Value::Array(self.eval_all(items)?)),
            ExprKind::Apply { callee, arg } => {
                let callee = self.eval(callee)?;
                let arg = self.eval(arg)?;
                apply(callee, vec![arg])
            }
            ExprKind::TupleApply { callee, args } => {
                let callee = self.eval(callee)?;
                match self.eval(args)? {
                    Value::Tuple(items) => apply(callee, items),
                    other => Err(mismatch("tuple", &other)),
                }
            }
            ExprKind::Call(callee) => {
                let callee = self.eval(callee)?;
                self.call(callee)
            }
        }
    }

    fn eval_all(&mut self, items: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    fn eval_bool(&mut self, expr: &Expr) -> Result<bool, RuntimeError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }

    fn eval_int(&mut self, expr: &Expr) -> Result<i64, RuntimeError> {
        match self.eval(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch("integer", &other)),
        }
    }

    /// Run a function value whose arguments are all bound.
    fn call(&mut self, callee: Value) -> Result<Value, RuntimeError> {
        match callee {
            Value::Builtin(kind, applied) => kind.invoke(&applied),
            Value::Constructor(structure, applied) => {
                if applied.len() != structure.fields.len() {
                    return Err(RuntimeError::Arity {
                        expected: structure.fields.len(),
                        applied: applied.len(),
                    });
                }
                let fields = structure
                    .fields
                    .iter()
                    .map(|(name, _)| name.clone())
                    .zip(applied)
                    .collect();
                Ok(Value::Struct(StructValue {
                    name: structure.name.clone(),
                    fields,
                }))
            }
            Value::Function(closure) => self.call_closure(closure),
            other => Err(mismatch("function", &other)),
        }
    }

    fn call_closure(&mut self, closure: Closure) -> Result<Value, RuntimeError> {
        let Closure { def, applied, env } = closure;
        if applied.len() != def.params.len() {
            return Err(RuntimeError::Arity {
                expected: def.params.len(),
                applied: applied.len(),
            });
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit {
                limit: MAX_CALL_DEPTH,
            });
        }

        let mut outer = env.clone();
        if let Some(name) = &def.self_name {
            let this = Closure {
                def: Rc::clone(&def),
                applied: Vec::new(),
                env,
            };
            outer.insert(name.clone(), Value::Function(this));
        }
        let params: Env = def
            .params
            .iter()
            .map(|(name, _)| name.clone())
            .zip(applied)
            .collect();

        trace!(depth = self.depth, "entering closure");
        let caller = std::mem::replace(&mut self.frames, vec![outer, params]);
        self.depth += 1;
        let result = match &def.body {
            FunctionBody::Expr(expr) => self.eval(expr),
            FunctionBody::Block(body) => match self.execute_block(body, None) {
                Ok(Flow::Return(value)) => Ok(value),
                Ok(Flow::Normal) => Err(RuntimeError::MissingReturn),
                Ok(Flow::Break) => Err(stray("break")),
                Ok(Flow::Continue) => Err(stray("continue")),
                Err(error) => Err(error),
            },
        };
        self.depth -= 1;
        self.frames = caller;
        result
    }
}

/// Bind more leading arguments to a function value.
fn apply(callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Function(mut closure) => {
            closure.applied.extend(args);
            Ok(Value::Function(closure))
        }
        Value::Builtin(kind, mut applied) => {
            applied.extend(args);
            Ok(Value::Builtin(kind, applied))
        }
        Value::Constructor(structure, mut applied) => {
            applied.extend(args);
            Ok(Value::Constructor(structure, applied))
        }
        other => Err(mismatch("function", &other)),
    }
}

/// A copy of `record` with the field at `path` replaced.
fn replace_field(record: Value, path: &[String], value: Value) -> Result<Value, RuntimeError> {
    let Some((field, rest)) = path.split_first() else {
        return Ok(value);
    };
    let Value::Struct(record) = record else {
        return Err(mismatch("struct", &record));
    };
    let unknown = || RuntimeError::UnknownField {
        field: field.clone(),
    };
    let inner = record.field(field).cloned().ok_or_else(unknown)?;
    let updated = replace_field(inner, rest, value)?;
    record
        .with_field(field, updated)
        .map(Value::Struct)
        .ok_or_else(unknown)
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    use Value::{Array, Bool, Double, Int, Str};

    let overflow = |operation: &str| RuntimeError::Overflow {
        operation: operation.to_string(),
    };
    let value = match (op, lhs, rhs) {
        (BinaryOp::Add, Int(a), Int(b)) => Int(a.checked_add(b).ok_or_else(|| overflow("addition"))?),
        (BinaryOp::Add, Double(a), Double(b)) => Double(a + b),
        (BinaryOp::Add, Str(a), Str(b)) => Str(a + &b),
        (BinaryOp::Add, Array(mut a), Array(b)) => {
            a.extend(b);
            Array(a)
        }
        (BinaryOp::Sub, Int(a), Int(b)) => {
            Int(a.checked_sub(b).ok_or_else(|| overflow("subtraction"))?)
        }
        (BinaryOp::Sub, Double(a), Double(b)) => Double(a - b),
        (BinaryOp::Mul, Int(a), Int(b)) => {
            Int(a.checked_mul(b).ok_or_else(|| overflow("multiplication"))?)
        }
        (BinaryOp::Mul, Double(a), Double(b)) => Double(a * b),
        (BinaryOp::Div, Double(_), Double(b)) if b == 0.0 => {
            return Err(RuntimeError::DivisionByZero);
        }
        (BinaryOp::Div, Double(a), Double(b)) => Double(a / b),
        (BinaryOp::IntDiv | BinaryOp::Rem, Int(_), Int(0)) => {
            return Err(RuntimeError::DivisionByZero);
        }
        (BinaryOp::IntDiv, Int(a), Int(b)) => {
            Int(a.checked_div(b).ok_or_else(|| overflow("division"))?)
        }
        (BinaryOp::Rem, Int(a), Int(b)) => {
            Int(a.checked_rem(b).ok_or_else(|| overflow("remainder"))?)
        }
        (BinaryOp::Eq, a, b) => Bool(a.equals(&b)),
        (BinaryOp::Ne, a, b) => Bool(!a.equals(&b)),
        (BinaryOp::And, Bool(a), Bool(b)) => Bool(a && b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(a || b),
        (op @ (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge), a, b) => {
            let ordering = a
                .compare(&b)
                .ok_or_else(|| mismatch("ordered values", &a))?;
            Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        (op, a, _) => return Err(mismatch(&format!("operands for {}", op.symbol()), &a)),
    };
    Ok(value)
}

fn mismatch(expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::Mismatch {
        expected: expected.to_string(),
        found: found.kind_name().to_string(),
    }
}

fn stray(construct: &str) -> RuntimeError {
    RuntimeError::StrayControl {
        construct: construct.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar;
    use crate::parser::parse_source;
    use crate::typecheck::TypeChecker;

    fn run(source: &str) -> Result<Vec<String>, RuntimeError> {
        let grammar = grammar::standard().unwrap();
        let raw = parse_source(grammar, source).unwrap();
        let mut checker = TypeChecker::new();
        let mut executor = Executor::new();
        let mut output = Vec::new();
        for statement in &raw {
            let typed = checker.convert(statement).unwrap();
            output.extend(executor.run(&typed)?);
        }
        Ok(output)
    }

    fn lines(source: &str) -> Vec<String> {
        run(source).unwrap()
    }

    #[test]
    fn assignments_echo_their_values() {
        assert_eq!(lines("iX = 3\niY = iX + 2"), ["iX = 3", "iY = 5"]);
        assert_eq!(
            lines("sX = \"a\" + \"b\"\ntP = (1, 2.0)\naX = [1] + [2]"),
            [r#"sX = "ab""#, "tP = (1, 2.0)", "aX = [1, 2]"]
        );
    }

    #[test]
    fn curried_and_tuple_application_agree() {
        assert_eq!(lines("fX = iA iB -> iA + iB\niC = fX : 3 : 4 ;")[1], "iC = 7");
        let output = lines("fX = iA iB iC -> iA * 100 + iB * 10 + iC\nfX :: (1, 2) : 3 ;\nfX : 1 :: (2, 3) ;");
        assert_eq!(output[1..], ["123", "123"]);
    }

    #[test]
    fn recursive_functions_rebind_themselves() {
        let output = lines(
            "fiFact = iN -> if iN < 2 then 1 else iN * (fiFact : (iN - 1) ;)\nfiFact : 5 ;",
        );
        assert_eq!(output, ["fiFact = <function>", "120"]);
    }

    #[test]
    fn closures_capture_a_snapshot() {
        let output = lines("iX = 1\nfX = -> iX\niX = 2\nfX ;");
        assert_eq!(output.last().map(String::as_str), Some("1"));
    }

    #[test]
    fn struct_updates_do_not_alias() {
        let output = lines(
            "oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\noQ = oP\noP.iX = 9\noQ.iX\noP",
        );
        assert_eq!(
            output[1..],
            [
                "oP = Point { iX: 1, iY: 2 }",
                "oQ = Point { iX: 1, iY: 2 }",
                "oP.iX = 9",
                "1",
                "Point { iX: 9, iY: 2 }",
            ]
        );
    }

    #[test]
    fn loops_print_at_top_level_only() {
        assert_eq!(
            lines("iS = 0\nfor iI = 1 to 3 do\n  iS = iS + iI\nendfor")[1..],
            ["iS = 1", "iS = 3", "iS = 6"]
        );
        let output = lines(
            "fiSum = aX{[int]} -> do\n  iS = 0\n  for iV in aX do\n    iS = iS + iV\n  endfor\n  return iS\nenddo\nfiSum : [4, 5, 6] ;",
        );
        assert_eq!(output, ["fiSum = <function>", "15"]);
    }

    #[test]
    fn break_and_continue_steer_loops() {
        let output = lines(
            "iN = 0\nwhile true do\n  iN = iN + 1\n  if iN % 2 == 1 then\n    continue\n  endif\n  if iN > 4 then\n    break\n  endif\n  iN\nendwhile",
        );
        assert_eq!(
            output.iter().filter(|line| !line.starts_with("iN")).collect::<Vec<_>>(),
            ["2", "4"]
        );
    }

    #[test]
    fn do_while_runs_the_body_first() {
        let output = lines("iN = 10\ndo\n  iN = iN + 1\nwhile iN < 5");
        assert_eq!(output, ["iN = 10", "iN = 11"]);
    }

    #[test]
    fn conditional_receivers_write_the_chosen_binding() {
        let output = lines("iA = 1\niB = 2\n(if iA > iB then iA else iB) = 9\niB");
        assert_eq!(output[2..], ["iB = 9", "9"]);
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(lines("bX = false && 1 // 0 == 0"), ["bX = false"]);
        assert_eq!(lines("bX = true || 1 // 0 == 0"), ["bX = true"]);
    }

    #[test]
    fn builtins_dispatch_on_the_chosen_overload() {
        assert_eq!(
            lines("fsShow : 2.5 ;\nfsShow : 'c' ;\nfiLen : \"four\" ;"),
            [r#""2.5""#, r#""c""#, "4"]
        );
    }

    #[test]
    fn arithmetic_faults_are_runtime_errors() {
        assert_eq!(run("iX = 1 // 0"), Err(RuntimeError::DivisionByZero));
        assert_eq!(run("dX = 1.0 / 0.0"), Err(RuntimeError::DivisionByZero));
        assert!(matches!(
            run("iX = 9223372036854775807 + 1"),
            Err(RuntimeError::Overflow { .. })
        ));
        assert_eq!(
            run("aX = [1, 2]\niY = aX[5]"),
            Err(RuntimeError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(lines("iX = -7 // 2\niY = -7 % 2"), ["iX = -3", "iY = -1"]);
    }

    #[test]
    fn falling_off_a_block_body_is_an_error() {
        let source = "fiX = iA -> do\n  if iA > 0 then\n    return 1\n  endif\nenddo\nfiX : 0 ;";
        assert_eq!(run(source), Err(RuntimeError::MissingReturn));
    }

    #[test]
    fn deep_recursion_stops_at_the_call_limit() {
        let countdown = "fiDown = iN -> if iN < 1 then 0 else fiDown : (iN - 1) ;";
        let runaway = format!("{countdown}\nfiDown : 200000 ;");
        let result = std::thread::Builder::new()
            .stack_size(STACK_SIZE)
            .spawn(move || run(&runaway))
            .expect("spawn")
            .join()
            .expect("join");
        assert_eq!(
            result,
            Err(RuntimeError::RecursionLimit {
                limit: MAX_CALL_DEPTH
            })
        );

        let shallow = format!("{countdown}\nfiDown : 50 ;");
        assert_eq!(lines(&shallow), ["fiDown = <function>", "0"]);
    }

    #[test]
    fn output_before_a_failure_is_kept() {
        let grammar = grammar::standard().unwrap();
        let raw = parse_source(grammar, "iX = 0\nfor iI = 1 to 3 do\n  iX = 6 // (2 - iI)\nendfor").unwrap();
        let mut checker = TypeChecker::new();
        let mut executor = Executor::new();
        let first = checker.convert(&raw[0]).unwrap();
        executor.run(&first).unwrap();
        let looped = checker.convert(&raw[1]).unwrap();
        assert_eq!(executor.run(&looped), Err(RuntimeError::DivisionByZero));
        assert_eq!(executor.take_output(), ["iX = 6"]);
    }
}
