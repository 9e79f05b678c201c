//! `Try`/`Catch`/`Finally` recovery (§4.2.4).
//!
//! Anchored on the isolated try-hook window the block builder carved out
//! (§4.1): that block's `PopDelete` edges (wired by the block builder
//! directly off the two `Push` targets it read) already point at the
//! finally block and, if present, the catch block, so this pass reads
//! the composite's shape straight off the graph rather than re-parsing
//! the window's instructions itself. The hook's ordinary fallthrough
//! successor is the real entry to the protected code — the window block
//! carries none of it — so the try body is everything reachable from
//! there up to the finally block's start address.

use crate::ir::instruction::Opcode;
use crate::ir::node::{Cfg, NodeId, NodeKind, TryData};

use super::util::{insert_structure, region_until};

pub fn recover_try_catch(cfg: &mut Cfg) {
    loop {
        if !recover_one(cfg) {
            break;
        }
    }
}

fn recover_one(cfg: &mut Cfg) -> bool {
    let hook_blocks: Vec<NodeId> = cfg
        .iter()
        .filter(|(_, n)| n.header.parent.is_none() && is_try_hook_block(n))
        .map(|(id, _)| id)
        .collect();

    for hook in hook_blocks {
        if try_recover(cfg, hook) {
            return true;
        }
    }
    false
}

/// A try-hook block always ends in `PopDelete` and, unlike an ordinary
/// `PopDelete` (one fallthrough successor), reaches at least the
/// fallthrough and the finally block.
fn is_try_hook_block(node: &crate::ir::node::Node) -> bool {
    match &node.kind {
        NodeKind::Block(b) => {
            b.instructions.last().map(|i| i.opcode) == Some(Opcode::PopDelete)
                && node.header.successors.len() >= 2
        }
        _ => false,
    }
}

fn try_recover(cfg: &mut Cfg, hook: NodeId) -> bool {
    let successors = cfg.get(hook).header.successors.clone();
    let [body_entry, finally_body, rest @ ..] = successors.as_slice() else {
        return false;
    };
    let (body_entry, finally_body) = (*body_entry, *finally_body);
    let catch_body = rest.first().copied();

    let try_body = if body_entry == finally_body {
        Vec::new()
    } else {
        region_until(cfg, body_entry, cfg.get(finally_body).header.start_addr)
    };

    let members: Vec<NodeId> = std::iter::once(hook)
        .chain(try_body.iter().copied())
        .chain(catch_body)
        .chain(std::iter::once(finally_body))
        .collect();

    let exit = cfg.get(finally_body).header.successors.first().copied();

    insert_structure(
        cfg,
        &members,
        hook,
        exit,
        NodeKind::TryCatchFinally(TryData {
            try_body,
            catch_body,
            finally_body,
        }),
    );
    true
}
