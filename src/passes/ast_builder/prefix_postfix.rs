//! Prefix/postfix recovery (§9's `Duplicate` supplement).
//!
//! `i++`, `++i`, and their array/field-qualified forms all compile to a
//! `Push` of the target, a `Duplicate`, an add/sub of `1`, and a `Pop`
//! back into the same target — the only difference between pre- and
//! post-increment is whether the duplicate happens before or after the
//! add. This pass recognizes exactly those two five-instruction shapes
//! in a block's instruction list and folds each into one [`Folded`]
//! action; anything else passes through untouched as [`Action::Raw`], to
//! be simulated as a literal duplicate-then-mutate sequence.

use crate::ir::instruction::{Instruction, Opcode, Value, VariableRef};

pub enum Action<'a> {
    Raw(&'a Instruction),
    Folded(FoldedIncDec),
}

pub struct FoldedIncDec {
    pub kind: crate::ir::ast::IncDecKind,
    pub variable: VariableRef,
}

/// Fold recognized increment/decrement triads in `instructions`, returning
/// the resulting action list in original order.
pub fn fold(instructions: &[Instruction]) -> Vec<Action<'_>> {
    let mut actions = Vec::with_capacity(instructions.len());
    let mut i = 0;
    while i < instructions.len() {
        if let Some((kind, var, consumed)) = match_postfix(&instructions[i..]) {
            actions.push(Action::Folded(FoldedIncDec { kind, variable: var }));
            i += consumed;
            continue;
        }
        if let Some((kind, var, consumed)) = match_prefix(&instructions[i..]) {
            actions.push(Action::Folded(FoldedIncDec { kind, variable: var }));
            i += consumed;
            continue;
        }
        actions.push(Action::Raw(&instructions[i]));
        i += 1;
    }
    actions
}

/// `push var; duplicate; push 1; add|sub; pop var` (same variable).
fn match_postfix(
    window: &[Instruction],
) -> Option<(crate::ir::ast::IncDecKind, VariableRef, usize)> {
    let w = window.get(0..5)?;
    let var = same_push_pop_variable(&w[0], &w[4])?;
    if w[1].opcode != Opcode::Duplicate {
        return None;
    }
    if !is_one(&w[2]) {
        return None;
    }
    let kind = match w[3].opcode {
        Opcode::Add => crate::ir::ast::IncDecKind::PostIncrement,
        Opcode::Sub => crate::ir::ast::IncDecKind::PostDecrement,
        _ => return None,
    };
    Some((kind, var, 5))
}

/// `push var; push 1; add|sub; duplicate; pop var` (same variable).
fn match_prefix(
    window: &[Instruction],
) -> Option<(crate::ir::ast::IncDecKind, VariableRef, usize)> {
    let w = window.get(0..5)?;
    let var = same_push_pop_variable(&w[0], &w[4])?;
    if !is_one(&w[1]) {
        return None;
    }
    let kind = match w[2].opcode {
        Opcode::Add => crate::ir::ast::IncDecKind::PreIncrement,
        Opcode::Sub => crate::ir::ast::IncDecKind::PreDecrement,
        _ => return None,
    };
    if w[3].opcode != Opcode::Duplicate {
        return None;
    }
    Some((kind, var, 5))
}

fn same_push_pop_variable(push: &Instruction, pop: &Instruction) -> Option<VariableRef> {
    if push.opcode != Opcode::Push || pop.opcode != Opcode::Pop {
        return None;
    }
    let pv = push.variable.as_ref()?;
    let qv = pop.variable.as_ref()?;
    if pv == qv {
        Some(pv.clone())
    } else {
        None
    }
}

fn is_one(instr: &Instruction) -> bool {
    matches!(&instr.value, Value::Int(1) | Value::Short(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::{DataType, InstanceType};

    fn push_var(name: &str) -> Instruction {
        Instruction {
            address: 0,
            opcode: Opcode::Push,
            extended_opcode: None,
            comparison: None,
            type1: DataType::Variable,
            type2: DataType::Variable,
            instance_type: InstanceType::Zelf,
            variable: Some(VariableRef {
                name: name.to_string(),
                instance_type: InstanceType::Zelf,
            }),
            function: None,
            reference_var_type: None,
            value: Value::None,
        }
    }

    fn pop_var(name: &str) -> Instruction {
        let mut i = push_var(name);
        i.opcode = Opcode::Pop;
        i
    }

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

    #[test]
    fn folds_postfix_increment() {
        let instrs = vec![
            push_var("i"),
            plain(Opcode::Duplicate, Value::Int(1)),
            plain(Opcode::Push, Value::Int(1)),
            plain(Opcode::Add, Value::None),
            pop_var("i"),
        ];
        let actions = fold(&instrs);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Folded(_)));
    }

    #[test]
    fn leaves_unrelated_instructions_alone() {
        let instrs = vec![plain(Opcode::Push, Value::Int(5)), plain(Opcode::Return, Value::None)];
        let actions = fold(&instrs);
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| matches!(a, Action::Raw(_))));
    }
}
