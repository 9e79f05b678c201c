//! Block Simulator / AST Builder (§4.3): the last pass in the pipeline.
//! Turns the fully recovered node hierarchy into the statement list that
//! becomes a fragment's body, plus whatever non-fatal warnings the walk
//! collected along the way.

mod composites;
mod prefix_postfix;
mod simulator;
mod translate;

use anyhow::Result;

use crate::ir::ast::Stmt;
use crate::ir::context::{DecompileError, Warning};
use crate::ir::node::{Cfg, NodeId};
use crate::ir::DecompileOptions;

use simulator::Simulator;

/// Simulate every top-level node in `cfg` (address order) and return the
/// resulting statement list plus accumulated warnings.
///
/// `allow_leftover_data_on_stack` gates whether a non-empty expression
/// stack at the end of simulation is a `DataLeftover` warning or a fatal
/// error (§7).
pub fn build(
    cfg: &Cfg,
    options: &DecompileOptions,
    entry_name: &str,
) -> Result<(Vec<Stmt>, Vec<Warning>)> {
    let roots: Vec<NodeId> = cfg
        .iter()
        .filter(|(_, n)| n.header.parent.is_none() && !n.header.unreachable)
        .map(|(id, _)| id)
        .collect();

    let mut sim = Simulator::new(cfg, options, entry_name);
    let body = sim.run_sequence(roots)?;

    if !sim.stack.is_empty() {
        if options.allow_leftover_data_on_stack {
            sim.warnings.push(Warning::DataLeftover {
                code_entry_name: entry_name.to_string(),
                number_of_elements: sim.stack.len(),
            });
        } else {
            anyhow::bail!(DecompileError::DataLeftoverNotAllowed {
                number_of_elements: sim.stack.len(),
            });
        }
    }

    Ok((body, sim.warnings))
}
