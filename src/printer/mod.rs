//! A minimal reference implementation of the AST-to-text collaborator
//! named (but not specified) by §1/§6. Its only job is to make a
//! decompiled fragment's output checkable in tests and through the demo
//! binary — it is deliberately not a production formatter (no comment
//! preservation, no configurable brace style beyond what's below).

use std::fmt::Write as _;

use crate::ir::ast::{
    AssignOp, BinaryOp, Expr, Fragment, IncDecKind, LogicalOp, Stmt, UnaryOp, VariableExpr,
};
use crate::ir::instruction::{InstanceType, Value};

/// Printer-only knobs (§6: "printer-only options... do not affect the
/// core"). Kept deliberately small.
#[derive(Debug, Clone)]
pub struct PrinterOptions {
    pub indent_width: usize,
    /// Blank line before/after `if`/loop/`switch`/`try` statements.
    pub empty_line_around_branch_statements: bool,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        Self {
            indent_width: 4,
            empty_line_around_branch_statements: false,
        }
    }
}

pub fn print_fragment(fragment: &Fragment, options: &PrinterOptions) -> String {
    let mut out = String::new();
    let mut printer = Printer { options, out: &mut out, depth: 0 };
    printer.print_stmts(&fragment.body);
    out
}

struct Printer<'a> {
    options: &'a PrinterOptions,
    out: &'a mut String,
    depth: usize,
}

impl Printer<'_> {
    fn indent(&mut self) {
        for _ in 0..self.depth * self.options.indent_width {
            self.out.push(' ');
        }
    }

    fn line(&mut self, text: &str) {
        self.indent();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn print_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.print_stmt(stmt);
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.line("{");
        self.depth += 1;
        self.print_stmts(stmts);
        self.depth -= 1;
        self.line("}");
    }

    fn maybe_blank(&mut self) {
        if self.options.empty_line_around_branch_statements {
            self.out.push('\n');
        }
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(e) => {
                let text = format!("{};", print_expr(e));
                self.line(&text);
            }
            Stmt::Assign(a) => {
                let text = format!(
                    "{} {} {};",
                    print_variable(&a.target),
                    assign_op_text(a.op),
                    print_expr(&a.value)
                );
                self.line(&text);
            }
            Stmt::If(i) => {
                self.maybe_blank();
                let text = format!("if ({})", print_expr(&i.condition));
                self.line(&text);
                self.block(&i.then_branch);
                if let Some(else_branch) = &i.else_branch {
                    self.line("else");
                    self.block(else_branch);
                }
                self.maybe_blank();
            }
            Stmt::While(w) => {
                self.maybe_blank();
                let text = format!("while ({})", print_expr(&w.condition));
                self.line(&text);
                self.block(&w.body);
                self.maybe_blank();
            }
            Stmt::DoUntil(d) => {
                self.maybe_blank();
                self.line("do");
                self.block(&d.body);
                let text = format!("until ({});", print_expr(&d.condition));
                self.line(&text);
                self.maybe_blank();
            }
            Stmt::Repeat(r) => {
                self.maybe_blank();
                let text = format!("repeat ({})", print_expr(&r.count));
                self.line(&text);
                self.block(&r.body);
                self.maybe_blank();
            }
            Stmt::With(w) => {
                self.maybe_blank();
                let text = format!("with ({})", print_expr(&w.target));
                self.line(&text);
                self.block(&w.body);
                self.maybe_blank();
            }
            Stmt::Switch(s) => {
                self.maybe_blank();
                let text = format!("switch ({})", print_expr(&s.discriminant));
                self.line(&text);
                self.line("{");
                self.depth += 1;
                for case in &s.cases {
                    for value in &case.values {
                        let text = format!("case {}:", print_value(value));
                        self.line(&text);
                    }
                    self.depth += 1;
                    self.print_stmts(&case.body);
                    self.depth -= 1;
                }
                if let Some(default) = &s.default {
                    self.line("default:");
                    self.depth += 1;
                    self.print_stmts(default);
                    self.depth -= 1;
                }
                self.depth -= 1;
                self.line("}");
                self.maybe_blank();
            }
            Stmt::Try(t) => {
                self.maybe_blank();
                self.line("try");
                self.block(&t.try_body);
                if let Some(catch_body) = &t.catch_body {
                    self.line("catch");
                    self.block(catch_body);
                }
                self.line("finally");
                self.block(&t.finally_body);
                self.maybe_blank();
            }
            Stmt::Return(Some(e)) => {
                let text = format!("return {};", print_expr(e));
                self.line(&text);
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Exit => self.line("exit;"),
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
        }
    }
}

fn assign_op_text(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Assign => "=",
        AssignOp::AddAssign => "+=",
        AssignOp::SubAssign => "-=",
        AssignOp::MulAssign => "*=",
        AssignOp::DivAssign => "/=",
        AssignOp::ModAssign => "%=",
        AssignOp::AndAssign => "&=",
        AssignOp::OrAssign => "|=",
        AssignOp::XorAssign => "^=",
    }
}

fn print_variable(v: &VariableExpr) -> String {
    let mut s = String::new();
    match v.left.as_deref() {
        // `self` is the implicit default owner; printing it would make
        // every plain local read look like a qualified access.
        None | Some(Expr::InstanceConstant(InstanceType::Zelf)) => {}
        Some(left) => {
            let _ = write!(s, "{}.", print_expr(left));
        }
    }
    s.push_str(&sanitize_name(&v.name));
    for index in &v.indices {
        let _ = write!(s, "[{}]", print_expr(index));
    }
    s
}

/// Bytecode string tables can hold names that aren't valid bare
/// identifiers (stripped symbols, mangled exports). Pass those through
/// `heck` rather than print them verbatim, the same way the teacher turns
/// an arbitrary WASM import module name into a printable Rust identifier.
fn sanitize_name(name: &str) -> std::borrow::Cow<'_, str> {
    use heck::ToSnekCase;
    if is_plain_identifier(name) {
        std::borrow::Cow::Borrowed(name)
    } else {
        std::borrow::Cow::Owned(name.to_snek_case())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn instance_type_text(inst: InstanceType) -> String {
    match inst {
        InstanceType::Zelf => "self".to_string(),
        InstanceType::Other => "other".to_string(),
        InstanceType::Global => "global".to_string(),
        InstanceType::Local => "local".to_string(),
        InstanceType::Builtin => "builtin".to_string(),
        InstanceType::StackTop => "stacktop".to_string(),
        InstanceType::Object(id) => id.to_string(),
    }
}

fn print_value(v: &Value) -> String {
    match v {
        Value::None => "undefined".to_string(),
        Value::Short(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Long(n) => n.to_string(),
        Value::Double(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => format!("{s:?}"),
    }
}

fn binary_op_text(op: BinaryOp) -> &'static str {
    use crate::ir::instruction::ComparisonKind;
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Rem => "div",
        BinaryOp::And => "&",
        BinaryOp::Or => "|",
        BinaryOp::Xor => "^",
        BinaryOp::Shl => "<<",
        BinaryOp::Shr => ">>",
        BinaryOp::Compare(ComparisonKind::Lt) => "<",
        BinaryOp::Compare(ComparisonKind::Le) => "<=",
        BinaryOp::Compare(ComparisonKind::Eq) => "==",
        BinaryOp::Compare(ComparisonKind::Ne) => "!=",
        BinaryOp::Compare(ComparisonKind::Ge) => ">=",
        BinaryOp::Compare(ComparisonKind::Gt) => ">",
    }
}

pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(v) => print_value(v),
        Expr::Variable(v) => print_variable(v),
        Expr::InstanceConstant(inst) => instance_type_text(*inst),
        Expr::Binary { op, left, right } => {
            format!("({} {} {})", print_expr(left), binary_op_text(*op), print_expr(right))
        }
        Expr::Unary { op, operand } => {
            let symbol = if *op == UnaryOp::Not { "!" } else { "-" };
            format!("{symbol}{}", print_expr(operand))
        }
        Expr::Logical { op, operands } => {
            let joiner = if *op == LogicalOp::And { " && " } else { " || " };
            let parts: Vec<String> = operands.iter().map(print_expr).collect();
            format!("({})", parts.join(joiner))
        }
        Expr::Call { name, arguments } => {
            let args: Vec<String> = arguments.iter().map(print_expr).collect();
            format!("{}({})", sanitize_name(name), args.join(", "))
        }
        Expr::NewObject { name, arguments } => {
            let args: Vec<String> = arguments.iter().map(print_expr).collect();
            format!("new {}({})", sanitize_name(name), args.join(", "))
        }
        Expr::FunctionLiteral(fragment) => {
            format!("function {}(...) {{ ... }}", sanitize_name(&fragment.name))
        }
        Expr::IncDec { kind, target } => {
            let t = print_variable(target);
            match kind {
                IncDecKind::PreIncrement => format!("++{t}"),
                IncDecKind::PreDecrement => format!("--{t}"),
                IncDecKind::PostIncrement => format!("{t}++"),
                IncDecKind::PostDecrement => format!("{t}--"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ast::AssignStmt;

    #[test]
    fn prints_a_simple_assignment() {
        let fragment = Fragment {
            name: "root".to_string(),
            argument_count: 0,
            local_count: 0,
            body: vec![Stmt::Assign(AssignStmt {
                op: AssignOp::Assign,
                target: VariableExpr {
                    name: "x".to_string(),
                    instance_type: crate::ir::instruction::InstanceType::Zelf,
                    indices: vec![],
                    left: None,
                },
                value: Expr::Literal(Value::Int(1)),
            })],
        };
        let text = print_fragment(&fragment, &PrinterOptions::default());
        assert_eq!(text, "x = 1;\n");
    }
}
