//! The block simulator (§4.3): walks the recovered hierarchy in address
//! order, driving one expression stack per fragment and turning each
//! instruction into a stack push/pop or, for assignments, calls, and
//! control terminals, a statement. Composite nodes (`If`, loops,
//! `Switch`, `TryCatchFinally`, `ShortCircuit`, `Fragment`) are handled
//! by `super::composites`; this module owns the leaf-block instruction
//! rules and the stack itself.

use crate::ir::ast::{
    AssignOp, AssignStmt, Expr, Stmt,
};
use crate::ir::context::{DecompileError, Warning};
use crate::ir::instruction::{DataType, ExtendedOpcode, InstanceType, Opcode, ReferenceVarType, Value};
use crate::ir::node::{BlockData, Cfg, NodeId, NodeKind};
use crate::ir::DecompileOptions;

use super::prefix_postfix::{self, Action};
use super::translate;

pub struct Simulator<'a> {
    pub cfg: &'a Cfg,
    pub options: &'a DecompileOptions,
    pub entry_name: &'a str,
    pub warnings: Vec<Warning>,
    pub stack: Vec<Expr>,
    /// Parallel to `stack`: whether the expression at that position came
    /// from a `Duplicate` rather than being freshly computed (§4.3's
    /// `PopDelete` "marked duplicated" rule).
    duplicated: Vec<bool>,
}

impl<'a> Simulator<'a> {
    pub fn new(cfg: &'a Cfg, options: &'a DecompileOptions, entry_name: &'a str) -> Self {
        Self {
            cfg,
            options,
            entry_name,
            warnings: Vec::new(),
            stack: Vec::new(),
            duplicated: Vec::new(),
        }
    }

    /// Simulate a list of same-level nodes in address order, concatenating
    /// the statements each one produces.
    pub fn run_sequence(&mut self, mut ids: Vec<NodeId>) -> anyhow::Result<Vec<Stmt>> {
        ids.sort_by_key(|id| self.cfg.get(*id).header.start_addr);
        let mut out = Vec::new();
        for id in ids {
            out.extend(self.simulate_node(id)?);
        }
        Ok(out)
    }

    pub fn simulate_node(&mut self, id: NodeId) -> anyhow::Result<Vec<Stmt>> {
        let node = self.cfg.get(id);
        match &node.kind {
            NodeKind::Block(block) => self.simulate_block(block),
            NodeKind::Empty => Ok(Vec::new()),
            NodeKind::Fragment(f) => {
                let mut stmts = Vec::new();
                for (idx, instr) in f.host_instructions.iter().enumerate() {
                    if idx == f.push_index {
                        self.push(Expr::FunctionLiteral(Box::new(f.ast.clone())));
                    } else if let Some(stmt) = self.simulate_instruction(instr)? {
                        stmts.push(stmt);
                    }
                }
                Ok(stmts)
            }
            NodeKind::ShortCircuit(_)
            | NodeKind::Loop(_)
            | NodeKind::If(_)
            | NodeKind::Switch(_)
            | NodeKind::TryCatchFinally(_) => super::composites::simulate_composite(self, id),
        }
    }

    /// Push a freshly computed expression (not a `Duplicate` copy).
    fn push(&mut self, expr: Expr) {
        self.stack.push(expr);
        self.duplicated.push(false);
    }

    /// Push a copy produced by `Duplicate`, marked so a later `PopDelete`
    /// knows it's redundant rather than a value to emit.
    fn push_duplicated(&mut self, expr: Expr) {
        self.stack.push(expr);
        self.duplicated.push(true);
    }

    pub fn pop(&mut self, address: u32) -> anyhow::Result<Expr> {
        let expr = self
            .stack
            .pop()
            .ok_or(DecompileError::PopOnEmptyStack { address })?;
        self.duplicated.pop();
        Ok(expr)
    }

    /// Like `pop`, but also returns whether the popped value was a
    /// `Duplicate` copy. Used where that distinction needs to survive a
    /// pop (pop-swap reordering, `PopDelete`).
    fn pop_with_mark(&mut self, address: u32) -> anyhow::Result<(Expr, bool)> {
        let expr = self
            .stack
            .pop()
            .ok_or(DecompileError::PopOnEmptyStack { address })?;
        let dup = self.duplicated.pop().unwrap_or(false);
        Ok((expr, dup))
    }

    fn simulate_block(&mut self, block: &BlockData) -> anyhow::Result<Vec<Stmt>> {
        self.simulate_instructions(&block.instructions)
    }

    /// Simulate a raw instruction slice directly, bypassing node lookup.
    /// Used by composite handlers (e.g. `Switch`'s discriminant) that need
    /// to run only a prefix of a block's instructions.
    pub fn simulate_instructions(
        &mut self,
        instructions: &[crate::ir::Instruction],
    ) -> anyhow::Result<Vec<Stmt>> {
        let actions = prefix_postfix::fold(instructions);
        let mut stmts = Vec::new();
        for action in actions {
            match action {
                Action::Folded(folded) => {
                    stmts.push(Stmt::Expression(Expr::IncDec {
                        kind: folded.kind,
                        target: Box::new(translate::variable_expr(
                            &folded.variable,
                            Vec::new(),
                            None,
                            self.options,
                        )),
                    }));
                }
                Action::Raw(instr) => {
                    if let Some(stmt) = self.simulate_instruction(instr)? {
                        stmts.push(stmt);
                    }
                }
            }
        }
        Ok(stmts)
    }

    fn simulate_instruction(
        &mut self,
        instr: &crate::ir::Instruction,
    ) -> anyhow::Result<Option<Stmt>> {
        match instr.opcode {
            Opcode::Branch
            | Opcode::BranchTrue
            | Opcode::BranchFalse
            | Opcode::PushWithContext
            | Opcode::PopWithContext => Ok(None),

            Opcode::Push | Opcode::PushImmediate | Opcode::PushLocal | Opcode::PushGlobal
            | Opcode::PushBuiltin => {
                if let Some(var) = &instr.variable {
                    let indices = self.pop_indices(instr)?;
                    let left = self.resolve_left(instr)?;
                    let var_expr = translate::variable_expr(var, indices, left, self.options);
                    self.push(Expr::Variable(var_expr));
                } else {
                    self.push(Expr::Literal(instr.value.clone()));
                }
                Ok(None)
            }

            Opcode::Pop => self.simulate_pop(instr),

            Opcode::PopDelete => {
                let Some(value) = self.stack.pop() else {
                    return Ok(None);
                };
                let duplicated = self.duplicated.pop().unwrap_or(false);
                if duplicated || matches!(value, Expr::Variable(_)) {
                    return Ok(None);
                }
                Ok(Some(Stmt::Expression(value)))
            }

            Opcode::Call => {
                let argc = instr.argument_count().max(0) as usize;
                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(self.pop(instr.address)?);
                }
                args.reverse();
                let name = instr
                    .function
                    .as_ref()
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                let expr = if name == self.options.new_object_function {
                    Expr::NewObject {
                        name,
                        arguments: args,
                    }
                } else {
                    Expr::Call {
                        name,
                        arguments: args,
                    }
                };
                self.push(expr);
                Ok(None)
            }

            Opcode::Return => {
                let value = self.stack.pop();
                self.duplicated.pop();
                Ok(Some(Stmt::Return(value)))
            }

            Opcode::Exit => Ok(Some(Stmt::Exit)),

            Opcode::Convert => {
                let Some(top) = self.stack.last().cloned() else {
                    return Ok(None);
                };
                let coerces_to_bool = instr.type1 == DataType::Int32 && instr.type2 == DataType::Boolean
                    || instr.type1 == DataType::Boolean;
                if coerces_to_bool {
                    if let Expr::Literal(Value::Short(s)) = &top {
                        if *s == 0 || *s == 1 {
                            *self.stack.last_mut().unwrap() = Expr::Literal(Value::Bool(*s == 1));
                        }
                    }
                }
                // Otherwise the target type is only tracked for downstream
                // typing (§4.3); `Expr` carries no type tag to update, so
                // there's nothing further to do here.
                Ok(None)
            }

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Rem
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Compare => {
                let right = self.pop(instr.address)?;
                let left = self.pop(instr.address)?;
                let op = translate::binary_op(instr)
                    .expect("opcode matched in this arm always has a BinaryOp mapping");
                self.push(Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
                Ok(None)
            }

            Opcode::Not | Opcode::Negate => {
                let operand = self.pop(instr.address)?;
                let op = if instr.opcode == Opcode::Not {
                    crate::ir::ast::UnaryOp::Not
                } else {
                    crate::ir::ast::UnaryOp::Negate
                };
                Ok(Some(Stmt::Expression(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })))
            }

            Opcode::Duplicate => {
                let count = instr.value.as_int().unwrap_or(1).max(1) as usize;
                if let Some(top) = self.stack.last().cloned() {
                    for _ in 0..count {
                        self.push_duplicated(top.clone());
                    }
                }
                Ok(None)
            }

            Opcode::Extended => {
                match instr.extended_opcode {
                    Some(ExtendedOpcode::SetArrayOwner) => Ok(None),
                    Some(ExtendedOpcode::PushReference) => {
                        self.warnings.push(Warning::UnsupportedPushReference {
                            code_entry_name: self.entry_name.to_string(),
                            address: instr.address,
                        });
                        self.push(Expr::Literal(Value::None));
                        Ok(None)
                    }
                    Some(ExtendedOpcode::Other(code)) => {
                        self.warnings.push(Warning::UnsupportedExtendedOpcode {
                            code_entry_name: self.entry_name.to_string(),
                            address: instr.address,
                            extended_opcode: code,
                        });
                        Ok(None)
                    }
                    None => {
                        self.warnings.push(Warning::UnknownOpcode {
                            code_entry_name: self.entry_name.to_string(),
                            address: instr.address,
                        });
                        Ok(None)
                    }
                }
            }
        }
    }

    fn simulate_pop(&mut self, instr: &crate::ir::Instruction) -> anyhow::Result<Option<Stmt>> {
        let Some(var) = &instr.variable else {
            // Pop-swap (§4.3): pop e1, pop e2, discard `value - 4`
            // additional items, then push e2 then e1. A pure stack
            // reorder; it never produces a statement.
            let (e1, d1) = self.pop_with_mark(instr.address)?;
            let (e2, d2) = self.pop_with_mark(instr.address)?;
            let extra = (instr.pop_swap_size() - 4).max(0) as usize;
            for _ in 0..extra {
                self.pop(instr.address)?;
            }
            if d2 {
                self.push_duplicated(e2);
            } else {
                self.push(e2);
            }
            if d1 {
                self.push_duplicated(e1);
            } else {
                self.push(e1);
            }
            return Ok(None);
        };

        // Step 2: instance-type `Local` registration. `VariableExpr`
        // already carries the name and instance type the printer needs;
        // there's no separate fragment-local symbol table to register it
        // on.

        // Step 3: pop order depends on Type1.
        let mut value = if instr.type1 == DataType::Int32 {
            Some(self.pop(instr.address)?)
        } else {
            None
        };

        // Step 4: resolve the left side.
        let indices = self.pop_indices(instr)?;
        let left = self.resolve_left(instr)?;

        // Step 5: pop the value now if it wasn't popped in step 3.
        let value = match value.take() {
            Some(v) => v,
            None => self.pop(instr.address)?,
        };

        // Step 6: Type2 == Boolean coerces an Int16 0/1 value.
        let value = coerce_bool(value, instr.type2);

        let target = translate::variable_expr(var, indices, left, self.options);

        let op = match &value {
            Expr::Binary { op, left, .. } if matches!(left.as_ref(), Expr::Variable(v) if *v == target) => {
                compound_op(*op).unwrap_or(AssignOp::Assign)
            }
            _ => AssignOp::Assign,
        };
        let value = match (&op, value) {
            (AssignOp::Assign, v) => v,
            (_, Expr::Binary { right, .. }) => *right,
            (_, v) => v,
        };

        Ok(Some(Stmt::Assign(AssignStmt { op, target, value })))
    }

    fn pop_indices(&mut self, instr: &crate::ir::Instruction) -> anyhow::Result<Vec<Expr>> {
        match instr.reference_var_type {
            Some(ReferenceVarType::Array) => Ok(vec![self.pop(instr.address)?]),
            _ => Ok(Vec::new()),
        }
    }

    /// Resolve a variable's left-hand owner (§4.3's `Pop`/`Push` left-side
    /// rule, shared by both opcodes): a popped stack-top base, a popped
    /// array base (after `pop_indices` has already taken the index), the
    /// literal instance-type constant otherwise, or — if the instruction's
    /// own instance type is `StackTop` — one further pop resolving a
    /// chained struct/object access.
    fn resolve_left(&mut self, instr: &crate::ir::Instruction) -> anyhow::Result<Option<Expr>> {
        let mut left = match instr.reference_var_type {
            Some(ReferenceVarType::StackTop) => Some(self.pop(instr.address)?),
            Some(ReferenceVarType::Array) => Some(self.pop(instr.address)?),
            _ => Some(Expr::InstanceConstant(instr.instance_type)),
        };
        if instr.instance_type == InstanceType::StackTop {
            left = Some(self.pop(instr.address)?);
        }
        Ok(left)
    }
}

fn coerce_bool(value: Expr, type2: DataType) -> Expr {
    if type2 == DataType::Boolean {
        if let Expr::Literal(Value::Short(s)) = &value {
            if *s == 0 || *s == 1 {
                return Expr::Literal(Value::Bool(*s == 1));
            }
        }
    }
    value
}

fn compound_op(op: crate::ir::ast::BinaryOp) -> Option<AssignOp> {
    use crate::ir::ast::BinaryOp;
    Some(match op {
        BinaryOp::Add => AssignOp::AddAssign,
        BinaryOp::Sub => AssignOp::SubAssign,
        BinaryOp::Mul => AssignOp::MulAssign,
        BinaryOp::Div => AssignOp::DivAssign,
        BinaryOp::Mod => AssignOp::ModAssign,
        BinaryOp::And => AssignOp::AndAssign,
        BinaryOp::Or => AssignOp::OrAssign,
        BinaryOp::Xor => AssignOp::XorAssign,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::Instruction;

    fn plain(opcode: Opcode, value: Value) -> Instruction {
        Instruction {
            address: 0,
            opcode,
            extended_opcode: None,
            comparison: None,
            type1: DataType::Int32,
            type2: DataType::Int32,
            instance_type: InstanceType::Zelf,
            variable: None,
            function: None,
            reference_var_type: None,
            value,
        }
    }

    fn pop_swap(extra: i32) -> Instruction {
        plain(Opcode::Pop, Value::Int(4 + extra))
    }

    #[test]
    fn pop_swap_with_no_extra_reorders_top_two() {
        let cfg = Cfg::new();
        let options = DecompileOptions::default();
        let mut sim = Simulator::new(&cfg, &options, "root");
        sim.push(Expr::Literal(Value::Int(1)));
        sim.push(Expr::Literal(Value::Int(2)));

        let stmt = sim.simulate_pop(&pop_swap(0)).unwrap();
        assert!(stmt.is_none());
        assert_eq!(
            sim.stack,
            vec![Expr::Literal(Value::Int(1)), Expr::Literal(Value::Int(2))]
        );
    }

    #[test]
    fn pop_swap_with_two_extra_discards_them() {
        let cfg = Cfg::new();
        let options = DecompileOptions::default();
        let mut sim = Simulator::new(&cfg, &options, "root");
        sim.push(Expr::Literal(Value::Int(10)));
        sim.push(Expr::Literal(Value::Int(20)));
        sim.push(Expr::Literal(Value::Int(2)));
        sim.push(Expr::Literal(Value::Int(1)));

        let stmt = sim.simulate_pop(&pop_swap(2)).unwrap();
        assert!(stmt.is_none());
        assert_eq!(
            sim.stack,
            vec![Expr::Literal(Value::Int(2)), Expr::Literal(Value::Int(1))]
        );
    }

    #[test]
    fn pop_swap_with_three_extra_discards_them() {
        let cfg = Cfg::new();
        let options = DecompileOptions::default();
        let mut sim = Simulator::new(&cfg, &options, "root");
        sim.push(Expr::Literal(Value::Int(0)));
        sim.push(Expr::Literal(Value::Int(10)));
        sim.push(Expr::Literal(Value::Int(20)));
        sim.push(Expr::Literal(Value::Int(2)));
        sim.push(Expr::Literal(Value::Int(1)));

        let stmt = sim.simulate_pop(&pop_swap(3)).unwrap();
        assert!(stmt.is_none());
        assert_eq!(
            sim.stack,
            vec![Expr::Literal(Value::Int(2)), Expr::Literal(Value::Int(1))]
        );
    }

    #[test]
    fn duplicated_value_is_discarded_by_pop_delete() {
        let cfg = Cfg::new();
        let options = DecompileOptions::default();
        let mut sim = Simulator::new(&cfg, &options, "root");
        sim.push_duplicated(Expr::Call { name: "f".to_string(), arguments: vec![] });

        let stmt = sim.simulate_instruction(&plain(Opcode::PopDelete, Value::None)).unwrap();
        assert!(stmt.is_none());
    }

    #[test]
    fn non_duplicated_call_is_emitted_by_pop_delete() {
        let cfg = Cfg::new();
        let options = DecompileOptions::default();
        let mut sim = Simulator::new(&cfg, &options, "root");
        sim.push(Expr::Call { name: "f".to_string(), arguments: vec![] });

        let stmt = sim.simulate_instruction(&plain(Opcode::PopDelete, Value::None)).unwrap();
        assert!(matches!(stmt, Some(Stmt::Expression(Expr::Call { .. }))));
    }
}
