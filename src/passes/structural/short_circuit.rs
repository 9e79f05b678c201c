//! Short-circuit recovery (§4.2.1): folds a chain of condition blocks
//! that all branch to the same target into one `ShortCircuit` node.
//!
//! The compiled shape this looks for: blocks `c1, c2, ..., cN` where each
//! `ci` (`i < N`) falls through to `c[i+1]` and branches on the same
//! condition polarity to a shared target `T`; `cN` itself falls through
//! to `T` as well. All-`BranchFalse` is an `&&` cascade (any condition
//! false jumps straight to the merge with `false` already on the stack);
//! all-`BranchTrue` is `||`. Anything that doesn't fit this exact shape
//! is left as nested plain blocks for the conditional pass to pick up —
//! recovering it as a short circuit is an optimization, not a
//! requirement for correctness.

use crate::ir::instruction::Opcode;
use crate::ir::node::{Cfg, LogicKind, NodeKind, ShortCircuitData};

use super::switches::dispatch_value;
use super::util::insert_structure;

pub fn recover_short_circuits(cfg: &mut Cfg) {
    loop {
        if !recover_one(cfg) {
            break;
        }
    }
}

fn recover_one(cfg: &mut Cfg) -> bool {
    let candidates: Vec<(Vec<_>, _)> = cfg
        .iter()
        .filter(|(_, node)| node.header.parent.is_none())
        .filter_map(|(id, _)| chain_from(cfg, id).map(|(chain, target)| (chain, target)))
        .filter(|(chain, _)| chain.len() >= 2)
        .collect();

    let Some((chain, target)) = candidates.into_iter().next() else {
        return false;
    };

    let logic_kind = match branch_kind(cfg, chain[0]) {
        Some(Opcode::BranchFalse) => LogicKind::And,
        Some(Opcode::BranchTrue) => LogicKind::Or,
        _ => return false,
    };

    let entry = chain[0];
    insert_structure(
        cfg,
        &chain,
        entry,
        Some(target),
        NodeKind::ShortCircuit(ShortCircuitData {
            logic_kind,
            children: chain.clone(),
        }),
    );
    true
}

fn branch_kind(cfg: &Cfg, id: crate::ir::node::NodeId) -> Option<Opcode> {
    match &cfg.get(id).kind {
        NodeKind::Block(b) => b.instructions.last().map(|i| i.opcode),
        _ => None,
    }
}

/// Starting from `head`, walk fallthrough successors as long as they
/// share a branch target and opcode; returns the chain plus that shared
/// target if it's at least two blocks long and the chain's last block
/// falls through to the same target.
fn chain_from(
    cfg: &Cfg,
    head: crate::ir::node::NodeId,
) -> Option<(Vec<crate::ir::node::NodeId>, crate::ir::node::NodeId)> {
    let first_kind = branch_kind(cfg, head)?;
    if !matches!(first_kind, Opcode::BranchFalse | Opcode::BranchTrue) {
        return None;
    }
    // A block that re-pushes the discriminant and compares it for equality
    // against a literal is a `switch` dispatch entry (§4.2.3), not a
    // condition operand — leave it for `switches::recover_switches`.
    if dispatch_value(cfg.get(head)).is_some() {
        return None;
    }
    let node = cfg.get(head);
    if node.header.successors.len() != 2 {
        return None;
    }
    // successors[0] is the branch target per block_builder's push order,
    // successors[1] is the fallthrough.
    let target = node.header.successors[0];
    let mut chain = vec![head];
    let mut current = head;

    loop {
        let cur_node = cfg.get(current);
        if cur_node.header.successors.len() != 2 {
            break;
        }
        let fallthrough = cur_node.header.successors[1];
        let next_target = cur_node.header.successors[0];
        if next_target != target {
            break;
        }
        let next_node = cfg.get(fallthrough);
        if next_node.header.predecessors.len() != 1 {
            break;
        }
        match branch_kind(cfg, fallthrough) {
            Some(op) if op == first_kind && dispatch_value(next_node).is_none() => {
                chain.push(fallthrough);
                current = fallthrough;
            }
            _ => {
                // Last condition: must itself fall through into `target`.
                if next_node.header.successors.first().copied() == Some(target)
                    || fallthrough == target
                {
                    chain.push(fallthrough);
                }
                break;
            }
        }
    }

    if chain.len() >= 2 {
        Some((chain, target))
    } else {
        None
    }
}
