//! `insert_structure`: the one piece of edge surgery every recovery pass
//! in this module is built from (§4.2). Detach, then attach — a subgraph
//! is never left half-rewired between the two steps.

use crate::ir::node::{Cfg, Node, NodeHeader, NodeId, NodeKind};

/// Replace the subgraph `members` with a single composite node:
///
/// 1. Any edge from a non-member into a member of `members` is repointed
///    at the new composite (predecessors only change for nodes outside
///    the set).
/// 2. Any edge from a member out to `exit` becomes an edge from the
///    composite to `exit`.
/// 3. Every member's `parent` becomes the new composite; the composite
///    inherits the parent the entry member used to have.
///
/// `entry` must be a member of `members` and is used only to source the
/// composite's former predecessors/parent.
pub fn insert_structure(
    cfg: &mut Cfg,
    members: &[NodeId],
    entry: NodeId,
    exit: Option<NodeId>,
    kind: NodeKind,
) -> NodeId {
    let start_addr = members
        .iter()
        .map(|id| cfg.get(*id).header.start_addr)
        .min()
        .unwrap_or(0);
    let end_addr = members
        .iter()
        .map(|id| cfg.get(*id).header.end_addr)
        .max()
        .unwrap_or(0);

    let parent = cfg.get(entry).header.parent;
    let predecessors: Vec<NodeId> = cfg
        .get(entry)
        .header
        .predecessors
        .iter()
        .copied()
        .filter(|p| !members.contains(p))
        .collect();

    let mut header = NodeHeader::new(start_addr, end_addr);
    header.parent = parent;
    header.predecessors = predecessors.clone();
    if let Some(exit) = exit {
        header.successors = vec![exit];
    }

    let composite = cfg.push(Node { header, kind });

    for pred in &predecessors {
        for succ in cfg.get_mut(*pred).header.successors.iter_mut() {
            if *succ == entry {
                *succ = composite;
            }
        }
    }

    if let Some(exit) = exit {
        cfg.get_mut(exit).header.predecessors.retain(|p| !members.contains(p));
        cfg.get_mut(exit).header.predecessors.push(composite);
    }

    for &member in members {
        cfg.get_mut(member).header.parent = Some(composite);
    }

    composite
}

/// Every node on some path from `from` to `to` inclusive, without
/// leaving through an edge that exits past `to` — a simple forward
/// reachability walk bounded by address range, adequate for the
/// single-entry/single-back-edge regions this pass operates on.
pub fn region_between(cfg: &Cfg, from: NodeId, to: NodeId) -> Vec<NodeId> {
    let lo = cfg.get(from).header.start_addr;
    let hi = cfg.get(to).header.end_addr;
    cfg.iter()
        .filter(|(_, n)| {
            n.header.parent == cfg.get(from).header.parent
                && n.header.start_addr >= lo
                && n.header.start_addr < hi
        })
        .map(|(id, _)| id)
        .collect()
}

/// Like [`region_between`], but bounded by a raw address rather than
/// another node's end — for regions whose far edge is a target address
/// read off an instruction, not a node we already hold.
pub fn region_until(cfg: &Cfg, from: NodeId, boundary_addr: u32) -> Vec<NodeId> {
    let lo = cfg.get(from).header.start_addr;
    cfg.iter()
        .filter(|(_, n)| {
            n.header.parent == cfg.get(from).header.parent
                && n.header.start_addr >= lo
                && n.header.start_addr < boundary_addr
        })
        .map(|(id, _)| id)
        .collect()
}
