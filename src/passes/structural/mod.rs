//! Structural Recovery (§4.2): repeatedly matches control-flow patterns
//! and folds each into a composite node, in the fixed order fragments →
//! short-circuits → loops → conditionals → switches → try/catch. Loop
//! recovery itself runs innermost-first within its own pass (§4.2.2);
//! the outer pass order here is what lets, e.g., a short circuit nested
//! inside a loop condition be recognized before the loop tries to
//! interpret its own head block.

mod conditionals;
mod fragments;
mod loops;
mod short_circuit;
mod switches;
mod try_catch;
mod util;

use crate::ir::ast;
use crate::ir::node::Cfg;

pub use util::insert_structure;

/// Run every sub-pass over `cfg` in order, mutating it into its fully
/// recovered hierarchy. `children` supplies the already-decompiled AST
/// for each nested code entry, consumed by fragment recovery.
pub fn recover(cfg: &mut Cfg, children: Vec<(usize, ast::Fragment)>) {
    fragments::recover_fragments(cfg, children);
    short_circuit::recover_short_circuits(cfg);
    loops::recover_loops(cfg);
    conditionals::recover_conditionals(cfg);
    switches::recover_switches(cfg);
    try_catch::recover_try_catch(cfg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::context::DecompileOptions;
    use crate::passes::block_builder::build_blocks;

    fn build(text: &str) -> Cfg {
        let entry = crate::demo_format::parse("t", text).unwrap();
        let mut cfg = build_blocks(&entry, &DecompileOptions::default()).unwrap();
        recover(&mut cfg, Vec::new());
        cfg
    }

    #[test]
    fn if_without_else_folds_condition_and_then_branch_together() {
        let cfg = build(
            "0 push.bool true\n\
             1 branchfalse 3\n\
             2 popdelete\n\
             3 return\n",
        );
        // The `If` composite and the untouched merge block ("3 return")
        // are left as the two top-level siblings.
        let roots: Vec<_> = cfg
            .iter()
            .filter(|(_, n)| n.header.parent.is_none())
            .collect();
        assert_eq!(roots.len(), 2);
        assert!(roots
            .iter()
            .any(|(_, n)| matches!(n.kind, crate::ir::node::NodeKind::If(_))));
    }

    #[test]
    fn plain_entry_has_no_recovery_needed() {
        let cfg = build("0 return\n");
        assert_eq!(
            cfg.iter()
                .filter(|(_, n)| n.header.parent.is_none())
                .count(),
            1
        );
    }
}
