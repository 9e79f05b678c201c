//! Loop recovery (§4.2.2): finds back-edges and folds the region they
//! close into a `While`/`DoUntil`/`Repeat`/`With` composite, innermost
//! loop first so a nested loop's own back-edge is resolved before its
//! enclosing loop is considered.
//!
//! Back-edge discovery here uses address order as a stand-in for a full
//! dominator computation: an edge `tail -> head` where `head`'s start
//! address is less than or equal to `tail`'s is treated as a back-edge.
//! That's exact for the structured, non-reducible-free bytecode this
//! pass operates on (every loop the block builder can produce closes a
//! single-entry region), and avoids pulling in a dominator-tree
//! implementation the teacher's own IR layer doesn't carry either.

use crate::ir::instruction::Opcode;
use crate::ir::node::{Cfg, LoopData, LoopKind, Node, NodeHeader, NodeId, NodeKind};

use super::util::{insert_structure, region_between};

pub fn recover_loops(cfg: &mut Cfg) {
    loop {
        let Some((tail, head)) = find_innermost_back_edge(cfg) else {
            break;
        };
        recover_one(cfg, tail, head);
    }
}

fn find_innermost_back_edge(cfg: &Cfg) -> Option<(NodeId, NodeId)> {
    let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
    for (id, node) in cfg.iter() {
        // Nodes already folded into some composite are done; revisiting
        // them would re-match the same stale edge (their `successors`
        // aren't cleared by `insert_structure`, only their `parent` is
        // set) and fold it a second time.
        if node.header.parent.is_some() {
            continue;
        }
        for &succ in &node.header.successors {
            let succ_node = cfg.get(succ);
            if succ_node.header.parent.is_some() {
                continue;
            }
            // `succ == id` is a single-block loop body branching straight
            // back to its own start; that's a valid (and common) back-edge,
            // not a degenerate one, so it's not excluded here.
            if succ_node.header.start_addr <= node.header.start_addr {
                edges.push((id, succ));
            }
        }
    }
    // Innermost first: the back-edge whose head is latest in address
    // order closes the tightest (most deeply nested) region.
    edges.sort_by_key(|(_, head)| std::cmp::Reverse(cfg.get(*head).header.start_addr));
    edges.into_iter().next()
}

fn recover_one(cfg: &mut Cfg, tail: NodeId, head: NodeId) {
    let tail_last = last_opcode(cfg, tail);
    let head_last = last_opcode(cfg, head);

    let members = region_between(cfg, head, tail);

    if tail_last == Some(Opcode::BranchFalse) || tail_last == Some(Opcode::BranchTrue) {
        // do { ... } until (cond); the tail's conditional branch targets
        // the loop head directly, and its fallthrough is the exit.
        recover_do_until(cfg, head, tail, members);
        return;
    }

    if head_last == Some(Opcode::BranchFalse) && tail_last == Some(Opcode::Branch) {
        recover_while(cfg, head, tail, members);
        return;
    }

    if has_context_push(cfg, head) {
        recover_with(cfg, head, tail, members);
        return;
    }

    recover_repeat(cfg, head, tail, members);
}

fn recover_do_until(cfg: &mut Cfg, head: NodeId, tail: NodeId, members: Vec<NodeId>) {
    let after = exit_successor(cfg, tail, head);
    let after = ensure_exit(cfg, after, head);
    insert_structure(
        cfg,
        &members,
        head,
        Some(after),
        NodeKind::Loop(LoopData {
            kind: LoopKind::DoUntil,
            head,
            tail,
            after,
            body: None,
            break_block: None,
            children: members.clone(),
        }),
    );
}

fn recover_while(cfg: &mut Cfg, head: NodeId, tail: NodeId, members: Vec<NodeId>) {
    let after = exit_successor(cfg, head, tail);
    let after = ensure_exit(cfg, after, head);
    let body = members.iter().copied().find(|&m| m != head);
    insert_structure(
        cfg,
        &members,
        head,
        Some(after),
        NodeKind::Loop(LoopData {
            kind: LoopKind::While,
            head,
            tail,
            after,
            body,
            break_block: None,
            children: members.clone(),
        }),
    );
}

/// The compiled shape for `repeat(n) { ... }` that this pass recognizes:
/// the block preceding the loop head pushes the count, the head opens
/// each iteration testing the remaining count, and the tail decrements
/// it before branching back. Anything else that forms a back-edge but
/// doesn't match `DoUntil`/`While`/`With` falls into this arm as the
/// catch-all loop kind.
fn recover_repeat(cfg: &mut Cfg, head: NodeId, tail: NodeId, members: Vec<NodeId>) {
    let after = exit_successor(cfg, head, tail);
    let after = ensure_exit(cfg, after, head);
    let body = members.iter().copied().find(|&m| m != head);
    insert_structure(
        cfg,
        &members,
        head,
        Some(after),
        NodeKind::Loop(LoopData {
            kind: LoopKind::Repeat,
            head,
            tail,
            after,
            body,
            break_block: None,
            children: members.clone(),
        }),
    );
}

fn recover_with(cfg: &mut Cfg, head: NodeId, tail: NodeId, members: Vec<NodeId>) {
    let after = exit_successor(cfg, head, tail);
    let after = ensure_exit(cfg, after, head);
    let body = members.iter().copied().find(|&m| m != head);
    insert_structure(
        cfg,
        &members,
        head,
        Some(after),
        NodeKind::Loop(LoopData {
            kind: LoopKind::With,
            head,
            tail,
            after,
            body,
            break_block: Some(tail),
            children: members.clone(),
        }),
    );
}

fn has_context_push(cfg: &Cfg, id: NodeId) -> bool {
    match &cfg.get(id).kind {
        NodeKind::Block(b) => b
            .instructions
            .iter()
            .any(|i| i.opcode == Opcode::PushWithContext),
        _ => false,
    }
}

fn last_opcode(cfg: &Cfg, id: NodeId) -> Option<Opcode> {
    match &cfg.get(id).kind {
        NodeKind::Block(b) => b.instructions.last().map(|i| i.opcode),
        _ => None,
    }
}

/// The successor of `source` that isn't `avoid` (the back-edge target) —
/// i.e. whichever outgoing edge leaves the loop.
fn exit_successor(cfg: &Cfg, source: NodeId, avoid: NodeId) -> Option<NodeId> {
    cfg.get(source)
        .header
        .successors
        .iter()
        .copied()
        .find(|&s| s != avoid)
}

/// If the loop has no natural exit successor (e.g. it's the last thing
/// in the fragment), synthesize an `Empty` anchor so every loop composite
/// has a concrete `after` node to report (§3's `Empty` node kind).
fn ensure_exit(cfg: &mut Cfg, after: Option<NodeId>, head: NodeId) -> NodeId {
    match after {
        Some(id) => id,
        None => {
            let addr = cfg.get(head).header.end_addr;
            cfg.push(Node {
                header: NodeHeader::new(addr, addr),
                kind: NodeKind::Empty,
            })
        }
    }
}
