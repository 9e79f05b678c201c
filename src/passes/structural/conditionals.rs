//! `If`/`Else` recovery (§4.2.3).
//!
//! Two compiled shapes are recognized, processed innermost (highest
//! address) first so a nested `if` inside a branch resolves before its
//! enclosing one:
//!
//! - **with an else**: the condition block branches false to the else
//!   branch and falls through to the then branch; the then branch ends
//!   with an unconditional branch to the merge point, and the else
//!   branch falls through to the same merge point.
//! - **without an else**: the condition block branches false straight to
//!   the merge point and falls through to the then branch, which itself
//!   falls through to the merge point.

use crate::ir::instruction::Opcode;
use crate::ir::node::{Cfg, IfData, NodeId, NodeKind};

use super::util::insert_structure;

pub fn recover_conditionals(cfg: &mut Cfg) {
    loop {
        if !recover_one(cfg) {
            break;
        }
    }
}

fn recover_one(cfg: &mut Cfg) -> bool {
    let mut candidates: Vec<NodeId> = cfg
        .iter()
        .filter(|(_, n)| {
            n.header.parent.is_none()
                && matches!(&n.kind, NodeKind::Block(b) if ends_with_conditional_branch(b))
        })
        .map(|(id, _)| id)
        .collect();
    candidates.sort_by_key(|id| std::cmp::Reverse(cfg.get(*id).header.start_addr));

    for cond in candidates {
        if try_recover(cfg, cond) {
            return true;
        }
    }
    false
}

fn ends_with_conditional_branch(b: &crate::ir::node::BlockData) -> bool {
    matches!(
        b.instructions.last().map(|i| i.opcode),
        Some(Opcode::BranchFalse) | Some(Opcode::BranchTrue)
    )
}

fn try_recover(cfg: &mut Cfg, cond: NodeId) -> bool {
    let node = cfg.get(cond);
    if node.header.successors.len() != 2 {
        return false;
    }
    let NodeKind::Block(block) = &node.kind else {
        return false;
    };
    // `BranchFalse`'s target is the not-taken (else) path, fallthrough is
    // then. `BranchTrue` is the mirror image: target is then, fallthrough
    // is else (see `block_builder::wire_edges`'s successor ordering).
    let branch_true = block.instructions.last().map(|i| i.opcode) == Some(Opcode::BranchTrue);
    let (else_target, then_branch) = if branch_true {
        (node.header.successors[1], node.header.successors[0])
    } else {
        (node.header.successors[0], node.header.successors[1])
    };

    if cfg.get(then_branch).header.predecessors.len() != 1 {
        return false;
    }

    let then_tail_successors = cfg.get(then_branch).header.successors.clone();

    // With an else: then branch ends in an unconditional branch to the
    // merge point, and that merge point equals the else branch's own
    // fallthrough.
    if then_tail_successors.len() == 1 {
        let merge = then_tail_successors[0];
        let else_successors = cfg.get(else_target).header.successors.clone();
        if else_successors.first().copied() == Some(merge)
            && cfg.get(else_target).header.predecessors.len() == 1
        {
            let members = vec![cond, then_branch, else_target];
            insert_structure(
                cfg,
                &members,
                cond,
                Some(merge),
                NodeKind::If(IfData {
                    condition_source: cond,
                    then_branch,
                    else_branch: Some(else_target),
                }),
            );
            return true;
        }
    }

    // Without an else: the condition's false branch *is* the merge point,
    // and the then branch falls straight through to it.
    if then_tail_successors.first().copied() == Some(else_target) {
        let members = vec![cond, then_branch];
        insert_structure(
            cfg,
            &members,
            cond,
            Some(else_target),
            NodeKind::If(IfData {
                condition_source: cond,
                then_branch,
                else_branch: None,
            }),
        );
        return true;
    }

    false
}
