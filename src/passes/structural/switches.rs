//! `Switch` recovery (§4.2.3).
//!
//! The compiled dispatch chain this looks for: a run of blocks, each
//! re-pushing the discriminant, comparing it for equality against one
//! case literal, and branching true to that case's body; the chain ends
//! with an unconditional branch to either a `default:` body or straight
//! to the merge point if there's no default. Fall-through cases (`case
//! a: case b: ...`) are two dispatch entries pointing at the same body
//! node and collapse into one `SwitchCaseData` naturally here — the
//! printer is responsible for rendering a shared body under multiple
//! `case` labels.

use crate::ir::instruction::{ComparisonKind, Opcode, Value};
use crate::ir::node::{Cfg, NodeId, NodeKind, SwitchCaseData, SwitchData};

use super::util::insert_structure;

pub fn recover_switches(cfg: &mut Cfg) {
    loop {
        if !recover_one(cfg) {
            break;
        }
    }
}

fn recover_one(cfg: &mut Cfg) -> bool {
    let heads: Vec<NodeId> = cfg
        .iter()
        .filter(|(_, n)| n.header.parent.is_none() && dispatch_value(n).is_some())
        .map(|(id, _)| id)
        .collect();

    for head in heads {
        if try_recover(cfg, head) {
            return true;
        }
    }
    false
}

pub(super) fn dispatch_value(node: &crate::ir::node::Node) -> Option<Value> {
    let NodeKind::Block(b) = &node.kind else {
        return None;
    };
    let last = b.instructions.last()?;
    if last.opcode != Opcode::BranchTrue {
        return None;
    }
    let compare = b
        .instructions
        .iter()
        .rev()
        .find(|i| i.opcode == Opcode::Compare && i.comparison == Some(ComparisonKind::Eq))?;
    let _ = compare;
    b.instructions
        .iter()
        .rev()
        .skip(1)
        .find(|i| i.opcode == Opcode::Push)
        .map(|i| i.value.clone())
}

fn try_recover(cfg: &mut Cfg, head: NodeId) -> bool {
    let mut dispatch = Vec::new();
    let mut cases = Vec::new();
    let mut current = head;

    loop {
        let node = cfg.get(current);
        let Some(value) = dispatch_value(node) else {
            break;
        };
        if node.header.successors.len() != 2 {
            break;
        }
        let case_body = node.header.successors[0];
        let next_dispatch = node.header.successors[1];
        dispatch.push(current);
        cases.push(SwitchCaseData {
            value,
            body: case_body,
        });
        current = next_dispatch;
    }

    if dispatch.is_empty() {
        return false;
    }

    // `current` is now the tail of the dispatch chain: it must end in an
    // unconditional branch to either a default body or the merge point.
    let Some(default_or_merge) = last_unconditional_target(cfg, current) else {
        return false;
    };

    let first_case_body = cases[0].body;
    let merge = cfg
        .get(first_case_body)
        .header
        .successors
        .first()
        .copied();

    let (default, exit) = if Some(default_or_merge) == merge {
        (None, default_or_merge)
    } else {
        let default_exit = cfg
            .get(default_or_merge)
            .header
            .successors
            .first()
            .copied()
            .unwrap_or(default_or_merge);
        (Some(default_or_merge), default_exit)
    };

    let mut members: Vec<NodeId> = dispatch.clone();
    members.push(current);
    for case in &cases {
        members.push(case.body);
    }
    if let Some(d) = default {
        members.push(d);
    }
    members.dedup();

    insert_structure(
        cfg,
        &members,
        head,
        Some(exit),
        NodeKind::Switch(SwitchData {
            discriminant_source: head,
            cases,
            default,
        }),
    );
    true
}

fn last_unconditional_target(cfg: &Cfg, id: NodeId) -> Option<NodeId> {
    let NodeKind::Block(b) = &cfg.get(id).kind else {
        return None;
    };
    let last = b.instructions.last()?;
    if last.opcode != Opcode::Branch {
        return None;
    }
    cfg.get(id).header.successors.first().copied()
}
