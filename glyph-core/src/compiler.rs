//! Compiler from typed statements to one Rust program.
//!
//! Translation is syntax directed. Every read of a binding clones it, so the
//! value semantics of Glyph carry over unchanged; functions become
//! `Rc<dyn Fn(..) -> R>` values and partial application builds a closure
//! over the remaining parameters. Each line of `main` is tagged with the
//! Glyph line it came from so host diagnostics can be mapped back.

use std::collections::BTreeMap;

use tracing::debug;

use crate::ast::{BinaryOp, Expr, ExprKind, FunctionBody, FunctionDef, Literal, Receiver, Statement};
use crate::builtins::BUILTINS;
use crate::types::{Signature, StructType, Type};

/// Fixed head of every generated program.
const PRELUDE: &str = r#"#![allow(unused_mut, unused_variables, unused_assignments, unused_imports, unused_parens, unused_braces, unreachable_code, dead_code, non_snake_case, non_camel_case_types)]
use std::cell::RefCell;
use std::rc::Rc;

trait Show {
    fn show(&self) -> String;
}

impl Show for i64 {
    fn show(&self) -> String { self.to_string() }
}

impl Show for f64 {
    fn show(&self) -> String { format!("{:?}", self) }
}

impl Show for bool {
    fn show(&self) -> String { self.to_string() }
}

impl Show for String {
    fn show(&self) -> String { format!("{:?}", self) }
}

impl Show for char {
    fn show(&self) -> String { format!("{:?}", self) }
}

impl<T: Show> Show for Vec<T> {
    fn show(&self) -> String {
        let parts: Vec<String> = self.iter().map(|item| item.show()).collect();
        format!("[{}]", parts.join(", "))
    }
}

impl<F: ?Sized> Show for Rc<F> {
    fn show(&self) -> String { String::from("<function>") }
}

macro_rules! show_tuple {
    ($($t:ident $v:ident),+) => {
        impl<$($t: Show),+> Show for ($($t,)+) {
            fn show(&self) -> String {
                let ($($v,)+) = self;
                let parts: Vec<String> = vec![$($v.show()),+];
                format!("({})", parts.join(", "))
            }
        }
    };
}

show_tuple!(A a, B b);
show_tuple!(A a, B b, C c);
show_tuple!(A a, B b, C c, D d);
show_tuple!(A a, B b, C c, D d, E e);
show_tuple!(A a, B b, C c, D d, E e, F f);
show_tuple!(A a, B b, C c, D d, E e, F f, G g);
show_tuple!(A a, B b, C c, D d, E e, F f, G g, H h);
show_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i);
show_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j);
show_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k);
show_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l);

fn int_add(a: i64, b: i64) -> i64 {
    a.checked_add(b).unwrap_or_else(|| panic!("integer overflow in addition"))
}

fn int_sub(a: i64, b: i64) -> i64 {
    a.checked_sub(b).unwrap_or_else(|| panic!("integer overflow in subtraction"))
}

fn int_mul(a: i64, b: i64) -> i64 {
    a.checked_mul(b).unwrap_or_else(|| panic!("integer overflow in multiplication"))
}

fn int_div(a: i64, b: i64) -> i64 {
    if b == 0 {
        panic!("division by zero");
    }
    a.checked_div(b).unwrap_or_else(|| panic!("integer overflow in division"))
}

fn int_rem(a: i64, b: i64) -> i64 {
    if b == 0 {
        panic!("division by zero");
    }
    a.checked_rem(b).unwrap_or_else(|| panic!("integer overflow in remainder"))
}

fn float_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        panic!("division by zero");
    }
    a / b
}

fn str_concat(a: String, b: String) -> String {
    a + &b
}

fn array_concat<T>(mut a: Vec<T>, b: Vec<T>) -> Vec<T> {
    a.extend(b);
    a
}

fn glyph_index<T: Clone>(items: &[T], index: i64) -> T {
    if index < 0 || index as usize >= items.len() {
        panic!("index {} is out of range for an array of length {}", index, items.len());
    }
    items[index as usize].clone()
}
"#;

/// Maps generated lines (1-based) back to Glyph source lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    lines: Vec<Option<usize>>,
}

impl LineMap {
    pub fn from_lines(lines: Vec<Option<usize>>) -> Self {
        LineMap { lines }
    }

    pub fn source_line(&self, generated: usize) -> Option<usize> {
        generated
            .checked_sub(1)
            .and_then(|index| self.lines.get(index).copied().flatten())
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }
}

/// A complete Rust program ready for the host compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RustProgram {
    pub source: String,
    pub line_map: LineMap,
}

#[derive(Debug, Default)]
struct ProgramWriter {
    source: String,
    line_map: LineMap,
}

impl ProgramWriter {
    fn line(&mut self, text: &str, source_line: Option<usize>) {
        self.source.push_str(text);
        self.source.push('\n');
        self.line_map.lines.push(source_line);
    }

    fn finish(self) -> RustProgram {
        RustProgram {
            source: self.source,
            line_map: self.line_map,
        }
    }
}

#[derive(Debug, Default)]
pub struct Compiler {
    structs: BTreeMap<String, StructType>,
    main: Vec<(String, usize)>,
    /// Nesting of function literals around the code being generated.
    functions: usize,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler::default()
    }

    /// Append one top-level statement to `main`.
    pub fn compile(&mut self, statement: &Statement, source_line: usize) {
        let mut lines = Vec::new();
        self.statement(statement, 1, &mut lines);
        debug!(source_line, generated = lines.len(), "compiled statement");
        self.main
            .extend(lines.into_iter().map(|line| (line, source_line)));
    }

    pub fn finish(self) -> RustProgram {
        let mut writer = ProgramWriter::default();
        for line in PRELUDE.lines() {
            writer.line(line, None);
        }
        writer.line("", None);
        for descriptor in BUILTINS {
            writer.line(descriptor.host_source, None);
        }
        for structure in self.structs.values() {
            writer.line("", None);
            for line in struct_definition(structure) {
                writer.line(&line, None);
            }
        }
        writer.line("", None);
        writer.line("fn main() {", None);
        for (line, source_line) in &self.main {
            writer.line(line, Some(*source_line));
        }
        writer.line("}", None);
        writer.finish()
    }

    fn top_level(&self) -> bool {
        self.functions == 0
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn statement(&mut self, statement: &Statement, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        match statement {
            Statement::Assignment {
                target,
                value,
                declares,
            } => {
                let code = self.expr(value);
                match target {
                    Receiver::Variable(name) if *declares => {
                        out.push(format!("{pad}let mut {name}: {} = {code};", rust_type(&value.ty)));
                        self.print_place(name, indent, out);
                    }
                    Receiver::Conditional { .. } => {
                        out.push(format!("{pad}{{"));
                        out.push(format!("{pad}    let __v = {code};"));
                        self.store(target, "__v", indent + 1, out);
                        out.push(format!("{pad}}}"));
                    }
                    _ => self.store(target, &code, indent, out),
                }
            }
            Statement::Return(value) => {
                let code = self.expr(value);
                out.push(format!("{pad}return {code};"));
            }
            Statement::Break => out.push(format!("{pad}break;")),
            Statement::Continue => out.push(format!("{pad}continue;")),
            Statement::Expression(expr) => {
                let code = self.expr(expr);
                if self.top_level() {
                    out.push(format!("{pad}println!(\"{{}}\", Show::show(&{code}));"));
                } else {
                    out.push(format!("{pad}let _ = {code};"));
                }
            }
            Statement::If {
                branches,
                otherwise,
            } => {
                for (index, (condition, body)) in branches.iter().enumerate() {
                    let condition = self.expr(condition);
                    if index == 0 {
                        out.push(format!("{pad}if {condition} {{"));
                    } else {
                        out.push(format!("{pad}}} else if {condition} {{"));
                    }
                    self.block(body, indent + 1, out);
                }
                if let Some(body) = otherwise {
                    out.push(format!("{pad}}} else {{"));
                    self.block(body, indent + 1, out);
                }
                out.push(format!("{pad}}}"));
            }
            Statement::While { condition, body } => {
                let condition = self.expr(condition);
                out.push(format!("{pad}while {condition} {{"));
                self.block(body, indent + 1, out);
                out.push(format!("{pad}}}"));
            }
            Statement::DoWhile { body, condition } => {
                // `continue` must still reach the condition.
                let condition = self.expr(condition);
                out.push(format!("{pad}{{"));
                out.push(format!("{pad}    let mut __first = true;"));
                out.push(format!("{pad}    while __first || {condition} {{"));
                out.push(format!("{pad}        __first = false;"));
                self.block(body, indent + 2, out);
                out.push(format!("{pad}    }}"));
                out.push(format!("{pad}}}"));
            }
            Statement::For {
                var,
                from,
                to,
                body,
            } => {
                let from = self.expr(from);
                let to = self.expr(to);
                out.push(format!("{pad}for mut {var} in ({from})..=({to}) {{"));
                self.block(body, indent + 1, out);
                out.push(format!("{pad}}}"));
            }
            Statement::ForIn {
                var,
                iterable,
                body,
            } => {
                let iterable = self.expr(iterable);
                out.push(format!("{pad}for mut {var} in ({iterable}) {{"));
                self.block(body, indent + 1, out);
                out.push(format!("{pad}}}"));
            }
            Statement::Do(body) => {
                out.push(format!("{pad}{{"));
                self.block(body, indent + 1, out);
                out.push(format!("{pad}}}"));
            }
        }
    }

    fn block(&mut self, body: &[Statement], indent: usize, out: &mut Vec<String>) {
        for statement in body {
            self.statement(statement, indent, out);
        }
    }

    /// Assign `code` through an existing receiver.
    fn store(&mut self, target: &Receiver, code: &str, indent: usize, out: &mut Vec<String>) {
        let pad = "    ".repeat(indent);
        match target {
            Receiver::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(condition);
                out.push(format!("{pad}if {condition} {{"));
                self.store(then, code, indent + 1, out);
                out.push(format!("{pad}}} else {{"));
                self.store(otherwise, code, indent + 1, out);
                out.push(format!("{pad}}}"));
            }
            place => {
                let place = place.to_string();
                out.push(format!("{pad}{place} = {code};"));
                self.print_place(&place, indent, out);
            }
        }
    }

    fn print_place(&self, place: &str, indent: usize, out: &mut Vec<String>) {
        if self.top_level() {
            let pad = "    ".repeat(indent);
            out.push(format!(
                "{pad}println!(\"{place} = {{}}\", Show::show(&{place}));"
            ));
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Constant(literal) => constant(literal),
            ExprKind::Variable(name) => format!("{name}.clone()"),
            ExprKind::Builtin(kind) => {
                let signature = signature(&expr.ty);
                format!(
                    "(Rc::new({}) as {})",
                    kind.descriptor().host_name,
                    function_type(&signature.params, &signature.result)
                )
            }
            ExprKind::Field { base, field } => format!("({}).{field}", self.expr(base)),
            ExprKind::Index { base, index } => {
                let base = self.expr(base);
                let index = self.expr(index);
                format!("glyph_index(&{base}, {index})")
            }
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(condition);
                let then = self.expr(then);
                let otherwise = self.expr(otherwise);
                format!("(if {condition} {{ {then} }} else {{ {otherwise} }})")
            }
            ExprKind::FunctionLiteral(def) => self.function_literal(def),
            ExprKind::StructConstructor(structure) => {
                self.structs
                    .entry(structure.name.clone())
                    .or_insert_with(|| structure.clone());
                let ident = struct_ident(&structure.name);
                let params = structure
                    .fields
                    .iter()
                    .map(|(name, ty)| format!("{name}: {}", rust_type(ty)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let names = structure
                    .fields
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let types: Vec<Type> = structure.fields.iter().map(|(_, ty)| ty.clone()).collect();
                format!(
                    "(Rc::new(|{params}| -> {ident} {{ {ident} {{ {names} }} }}) as {})",
                    function_type(&types, &Type::Struct(structure.clone()))
                )
            }
            ExprKind::BinaryOp { op, lhs, rhs } => {
                let operand_type = lhs.ty.clone();
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                binary(*op, &operand_type, &lhs, &rhs)
            }
            ExprKind::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|item| self.expr(item)).collect();
                format!("({})", items.join(", "))
            }
            ExprKind::Array(items) => {
                let items: Vec<String> = items.iter().map(|item| self.expr(item)).collect();
                format!("vec![{}]", items.join(", "))
            }
            ExprKind::Apply { callee, arg } => {
                let signature = signature(&callee.ty);
                let callee = self.expr(callee);
                let arg = self.expr(arg);
                partial_application(
                    &format!("let __f = {callee}; let __a = {arg};"),
                    vec!["__a.clone()".to_string()],
                    &signature,
                )
            }
            ExprKind::TupleApply { callee, args } => {
                let signature = signature(&callee.ty);
                let arity = match &args.ty {
                    Type::Tuple(items) => items.len(),
                    _ => 0,
                };
                let callee = self.expr(callee);
                let args = self.expr(args);
                partial_application(
                    &format!("let __f = {callee}; let __t = {args};"),
                    (0..arity).map(|i| format!("__t.{i}.clone()")).collect(),
                    &signature,
                )
            }
            ExprKind::Call(callee) => format!("({})()", self.expr(callee)),
        }
    }

    fn function_literal(&mut self, def: &FunctionDef) -> String {
        let param_types: Vec<Type> = def.params.iter().map(|(_, ty)| ty.clone()).collect();
        let fn_type = function_type(&param_types, &def.result);
        let params = def
            .params
            .iter()
            .map(|(name, ty)| format!("mut {name}: {}", rust_type(ty)))
            .collect::<Vec<_>>()
            .join(", ");

        self.functions += 1;
        let body = match &def.body {
            FunctionBody::Expr(expr) => self.expr(expr),
            FunctionBody::Block(statements) => {
                let mut lines = Vec::new();
                self.block(statements, 0, &mut lines);
                lines.push("panic!(\"function ended without returning a value\")".to_string());
                lines
                    .iter()
                    .map(|line| line.trim())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };
        self.functions -= 1;

        let mut code = String::from("{ ");
        for capture in &def.captures {
            code.push_str(&format!("let {capture} = {capture}.clone(); "));
        }
        let head = format!("move |{params}| -> {}", rust_type(&def.result));
        match &def.self_name {
            None => code.push_str(&format!("(Rc::new({head} {{ {body} }}) as {fn_type})")),
            Some(name) => code.push_str(&format!(
                "let __slot: Rc<RefCell<Option<{fn_type}>>> = Rc::new(RefCell::new(None)); \
                 let __slot_inner = __slot.clone(); \
                 let __function: {fn_type} = Rc::new({head} {{ \
                 let {name}: {fn_type} = __slot_inner.borrow().clone().unwrap(); {body} }}); \
                 *__slot.borrow_mut() = Some(__function.clone()); __function"
            )),
        }
        code.push_str(" }");
        code
    }
}

/// A closure that forwards the bound `leading` arguments and takes the
/// remaining parameters of `signature`.
fn partial_application(bindings: &str, leading: Vec<String>, signature: &Signature) -> String {
    let rest = &signature.params[leading.len().min(signature.params.len())..];
    let names: Vec<String> = (1..=rest.len()).map(|i| format!("__p{i}")).collect();
    let params = names
        .iter()
        .zip(rest)
        .map(|(name, ty)| format!("{name}: {}", rust_type(ty)))
        .collect::<Vec<_>>()
        .join(", ");
    let args = leading.into_iter().chain(names).collect::<Vec<_>>().join(", ");
    format!(
        "{{ {bindings} (Rc::new(move |{params}| -> {} {{ __f({args}) }}) as {}) }}",
        rust_type(&signature.result),
        function_type(rest, &signature.result)
    )
}

fn binary(op: BinaryOp, operands: &Type, lhs: &str, rhs: &str) -> String {
    let helper = match (op, operands) {
        (BinaryOp::Add, Type::Int) => Some("int_add"),
        (BinaryOp::Add, Type::Str) => Some("str_concat"),
        (BinaryOp::Add, Type::Array(_)) => Some("array_concat"),
        (BinaryOp::Sub, Type::Int) => Some("int_sub"),
        (BinaryOp::Mul, Type::Int) => Some("int_mul"),
        (BinaryOp::Div, _) => Some("float_div"),
        (BinaryOp::IntDiv, _) => Some("int_div"),
        (BinaryOp::Rem, _) => Some("int_rem"),
        _ => None,
    };
    match helper {
        Some(helper) => format!("{helper}({lhs}, {rhs})"),
        None => format!("({lhs} {} {rhs})", op.symbol()),
    }
}

fn constant(literal: &Literal) -> String {
    match literal {
        Literal::Int(i64::MIN) => "i64::MIN".to_string(),
        Literal::Int(n) if *n < 0 => format!("({n}i64)"),
        Literal::Int(n) => format!("{n}i64"),
        Literal::Double(d) if d.is_sign_negative() => format!("({d:?}f64)"),
        Literal::Double(d) => format!("{d:?}f64"),
        Literal::Bool(b) => b.to_string(),
        Literal::Str(s) => format!("String::from({s:?})"),
        Literal::Char(c) => format!("{c:?}"),
    }
}

fn signature(ty: &Type) -> Signature {
    ty.signature()
        .cloned()
        .unwrap_or_else(|| Signature::new(Vec::new(), ty.clone()))
}

fn struct_ident(name: &str) -> String {
    format!("St{name}")
}

fn rust_type(ty: &Type) -> String {
    match ty {
        Type::Int => "i64".to_string(),
        Type::Double => "f64".to_string(),
        Type::Bool => "bool".to_string(),
        Type::Str => "String".to_string(),
        Type::Char => "char".to_string(),
        Type::Tuple(items) => format!(
            "({})",
            items.iter().map(rust_type).collect::<Vec<_>>().join(", ")
        ),
        Type::Array(element) => format!("Vec<{}>", rust_type(element)),
        Type::Function(_) => {
            let signature = signature(ty);
            function_type(&signature.params, &signature.result)
        }
        Type::Struct(structure) => struct_ident(&structure.name),
    }
}

fn function_type(params: &[Type], result: &Type) -> String {
    format!(
        "Rc<dyn Fn({}) -> {}>",
        params.iter().map(rust_type).collect::<Vec<_>>().join(", "),
        rust_type(result)
    )
}

fn struct_definition(structure: &StructType) -> Vec<String> {
    let ident = struct_ident(&structure.name);
    let comparable = Type::Struct(structure.clone()).is_comparable();
    let mut lines = vec![
        if comparable {
            "#[derive(Clone, PartialEq)]".to_string()
        } else {
            "#[derive(Clone)]".to_string()
        },
        format!("struct {ident} {{"),
    ];
    for (name, ty) in &structure.fields {
        lines.push(format!("    {name}: {},", rust_type(ty)));
    }
    lines.push("}".to_string());

    let shown = if structure.fields.is_empty() {
        format!("String::from(\"{} {{}}\")", structure.name)
    } else {
        let pattern = structure
            .fields
            .iter()
            .map(|(name, _)| format!("{name}: {{}}"))
            .collect::<Vec<_>>()
            .join(", ");
        let args = structure
            .fields
            .iter()
            .map(|(name, _)| format!("self.{name}.show()"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("format!(\"{} {{{{ {pattern} }}}}\", {args})", structure.name)
    };
    lines.push(format!("impl Show for {ident} {{"));
    lines.push(format!("    fn show(&self) -> String {{ {shown} }}"));
    lines.push("}".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar;
    use crate::parser::parse_source;
    use crate::typecheck::TypeChecker;

    fn compile(source: &str) -> RustProgram {
        let grammar = grammar::standard().unwrap();
        let raw = parse_source(grammar, source).unwrap();
        let mut checker = TypeChecker::new();
        let mut compiler = Compiler::new();
        for statement in &raw {
            let line = statement.position().map_or(0, |position| position.line);
            compiler.compile(&checker.convert(statement).unwrap(), line);
        }
        compiler.finish()
    }

    fn generated_line(program: &RustProgram, needle: &str) -> usize {
        program
            .source
            .lines()
            .position(|line| line.contains(needle))
            .map(|index| index + 1)
            .unwrap_or_else(|| panic!("`{needle}` not generated:\n{}", program.source))
    }

    #[test]
    fn assignments_declare_and_print() {
        let program = compile("iX = 3\niX = iX + 2");
        assert!(program.source.contains("    let mut iX: i64 = 3i64;"));
        assert!(program.source.contains("    iX = int_add(iX.clone(), 2i64);"));
        assert!(program.source.contains("println!(\"iX = {}\", Show::show(&iX));"));
        assert!(program.source.starts_with("#![allow("));
    }

    #[test]
    fn line_map_points_back_to_glyph_lines() {
        let program = compile("iX = 3\n\n# comment\niY = iX * 2");
        let declared = generated_line(&program, "let mut iY");
        assert_eq!(program.line_map.source_line(declared), Some(4));
        assert_eq!(program.line_map.source_line(1), None);
        assert_eq!(program.line_map.len(), program.source.lines().count());
    }

    #[test]
    fn structs_become_rust_structs() {
        let program = compile("oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\noP.iX = 5");
        assert!(program.source.contains("#[derive(Clone, PartialEq)]\nstruct StPoint {"));
        assert!(program
            .source
            .contains("format!(\"Point {{ iX: {}, iY: {} }}\", self.iX.show(), self.iY.show())"));
        assert!(program.source.contains("    oP.iX = 5i64;"));
        assert!(program.source.contains("StPoint { iX, iY }"));
    }

    #[test]
    fn closures_clone_their_captures() {
        let program = compile("iX = 1\nfX = iA -> iA + iX");
        assert!(program.source.contains("{ let iX = iX.clone(); (Rc::new(move |mut iA: i64| -> i64"));
        assert!(program.source.contains("as Rc<dyn Fn(i64) -> i64>)"));
    }

    #[test]
    fn recursive_literals_use_a_self_slot() {
        let program =
            compile("fiFact = iN -> if iN < 2 then 1 else iN * (fiFact : (iN - 1) ;)");
        assert!(program.source.contains("let __slot: Rc<RefCell<Option<Rc<dyn Fn(i64) -> i64>>>>"));
        assert!(program
            .source
            .contains("let fiFact: Rc<dyn Fn(i64) -> i64> = __slot_inner.borrow().clone().unwrap();"));
    }

    #[test]
    fn partial_application_leaves_the_rest_open() {
        let program = compile("fX = iA iB iC -> iA + iB + iC\nfY = fX :: (1, 2)\nfZ = fX : 1");
        assert!(program.source.contains("__f(__t.0.clone(), __t.1.clone(), __p1)"));
        assert!(program.source.contains("__f(__a.clone(), __p1, __p2)"));
        assert!(program.source.contains("let mut fY: Rc<dyn Fn(i64) -> i64>"));
    }

    #[test]
    fn do_while_checks_the_condition_after_continue() {
        let program = compile("iN = 0\ndo\n  iN = iN + 1\nwhile iN < 3");
        assert!(program.source.contains("while __first || (iN.clone() < 3i64) {"));
    }

    #[test]
    fn builtins_are_emitted_into_the_prelude() {
        let program = compile("fsShow : 1 ;");
        for descriptor in BUILTINS {
            assert!(program.source.contains(descriptor.host_source));
        }
        assert!(program.source.contains("(Rc::new(show_int) as Rc<dyn Fn(i64) -> String>)"));
    }
}
