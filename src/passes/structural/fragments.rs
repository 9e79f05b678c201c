//! Fragment recovery: the first structural sub-pass (§2's pass order).
//!
//! Nested code entries are decompiled leaves-first by the top-level
//! pipeline (see `lib::decompile`), so by the time this runs, every
//! child already has a finished `ast::Fragment`. This pass's only job is
//! to find the single instruction in *this* entry's stream that
//! introduces each child — a `Push` of a function reference whose name
//! matches the child's `name()` — and swap the block hosting it for a
//! `Fragment` node carrying the child AST, so the block simulator emits
//! a function/struct literal there instead of a bare constant (§3
//! glossary: "Fragment"). The host block's other instructions (typically
//! the `Pop` that assigns the literal to a variable) are kept on the
//! node so the simulator still runs them.
//!
//! No edges are rewritten: a fragment-introducing `Push` never changes a
//! block's control flow, so the composite takes the host block's exact
//! position — same predecessors, same successors, same parent.

use crate::ir::ast;
use crate::ir::node::{Cfg, FragmentData, NodeId, NodeKind};

/// For each `(child_index, ast)` pair, find and replace the block whose
/// instructions include a `Push` naming that child, in place.
pub fn recover_fragments(cfg: &mut Cfg, children: Vec<(usize, ast::Fragment)>) {
    for (child_index, child_ast) in children {
        if let Some((host, push_index)) = find_host_block(cfg, &child_ast.name) {
            let NodeKind::Block(block) = &cfg.get(host).kind else {
                continue;
            };
            let host_instructions = block.instructions.clone();
            let node = cfg.get_mut(host);
            node.kind = NodeKind::Fragment(FragmentData {
                child_index,
                ast: child_ast,
                host_instructions,
                push_index,
            });
        }
    }
}

fn find_host_block(cfg: &Cfg, child_name: &str) -> Option<(NodeId, usize)> {
    for (id, node) in cfg.iter() {
        if let NodeKind::Block(block) = &node.kind {
            let push_index = block
                .instructions
                .iter()
                .position(|i| i.function.as_ref().is_some_and(|f| f.name == child_name));
            if let Some(push_index) = push_index {
                return Some((id, push_index));
            }
        }
    }
    None
}
