//! Instruction-to-`Expr` translation helpers shared by the simulator:
//! variable reference construction (including the legacy 2D array index
//! decomposition, §4.3/§9) and operator mapping.

use crate::ir::ast::{BinaryOp, Expr, VariableExpr};
use crate::ir::instruction::{ComparisonKind, Instruction, Opcode, VariableRef};
use crate::ir::DecompileOptions;

pub fn binary_op(instr: &Instruction) -> Option<BinaryOp> {
    Some(match instr.opcode {
        Opcode::Add => BinaryOp::Add,
        Opcode::Sub => BinaryOp::Sub,
        Opcode::Mul => BinaryOp::Mul,
        Opcode::Div => BinaryOp::Div,
        Opcode::Mod => BinaryOp::Mod,
        Opcode::Rem => BinaryOp::Rem,
        Opcode::And => BinaryOp::And,
        Opcode::Or => BinaryOp::Or,
        Opcode::Xor => BinaryOp::Xor,
        Opcode::Shl => BinaryOp::Shl,
        Opcode::Shr => BinaryOp::Shr,
        Opcode::Compare => BinaryOp::Compare(instr.comparison.unwrap_or(ComparisonKind::Eq)),
        _ => return None,
    })
}

/// Build the `VariableExpr` for a `Push`/`Pop` of `var`, consuming
/// whatever index expression(s) array access requires from `indices` (in
/// the order they were popped: nearest-to-top first), plus the resolved
/// left-hand owner (§4.3's left-side rule).
pub fn variable_expr(
    var: &VariableRef,
    indices: Vec<Expr>,
    left: Option<Expr>,
    options: &DecompileOptions,
) -> VariableExpr {
    let resolved = if options.legacy_arrays {
        decompose_legacy_indices(indices, options.old_array_limit)
    } else {
        indices
    };
    VariableExpr {
        name: var.name.clone(),
        instance_type: var.instance_type,
        indices: resolved,
        left: left.map(Box::new),
    }
}

/// Pre-GMLv2 bytecode packs a 2D array access `a[x, y]` into a single
/// index `x * OldArrayLimit + y` at compile time (§9). Given one packed
/// index expression, recover `[x, y]` when it matches that exact shape;
/// otherwise leave it as the single index it is (not every legacy array
/// access is 2D).
fn decompose_legacy_indices(mut indices: Vec<Expr>, old_array_limit: i32) -> Vec<Expr> {
    if indices.len() != 1 {
        return indices;
    }
    let packed = indices.pop().unwrap();
    if let Expr::Binary {
        op: BinaryOp::Add,
        left,
        right,
    } = &packed
    {
        if let Expr::Binary {
            op: BinaryOp::Mul,
            left: outer,
            right: limit,
        } = left.as_ref()
        {
            if is_literal_limit(limit, old_array_limit) {
                return vec![(**outer).clone(), (**right).clone()];
            }
        }
    }
    vec![packed]
}

fn is_literal_limit(expr: &Expr, old_array_limit: i32) -> bool {
    matches!(expr, Expr::Literal(v) if v.as_int() == Some(old_array_limit))
}
