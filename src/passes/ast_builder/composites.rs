//! AST assembly for the composite node kinds (§4.3's "composite
//! overrides"): each function here simulates exactly the sub-regions a
//! composite owns, in the order its meaning requires, and returns the
//! one statement (or, for `ShortCircuit`, the one expression left on the
//! stack) that replaces it in the enclosing sequence.

use anyhow::{Context, Result};

use crate::ir::ast::{
    CaseStmt, DoUntilStmt, Expr, IfStmt, LogicalOp, RepeatStmt, Stmt, SwitchStmt, TryStmt,
    WhileStmt, WithStmt,
};
use crate::ir::node::{LoopKind, NodeId, NodeKind};

use super::simulator::Simulator;

pub fn simulate_composite(sim: &mut Simulator<'_>, id: NodeId) -> Result<Vec<Stmt>> {
    let kind = sim.cfg.get(id).kind.clone();
    match kind {
        NodeKind::ShortCircuit(s) => {
            simulate_short_circuit(sim, &s)?;
            Ok(Vec::new())
        }
        NodeKind::If(i) => Ok(vec![simulate_if(sim, &i)?]),
        NodeKind::Loop(l) => Ok(vec![simulate_loop(sim, &l)?]),
        NodeKind::Switch(s) => Ok(vec![simulate_switch(sim, &s)?]),
        NodeKind::TryCatchFinally(t) => Ok(vec![simulate_try(sim, &t)?]),
        _ => unreachable!("simulate_composite only called for composite node kinds"),
    }
}

fn simulate_short_circuit(
    sim: &mut Simulator<'_>,
    data: &crate::ir::node::ShortCircuitData,
) -> Result<()> {
    let before = sim.stack.len();
    let mut operands = Vec::with_capacity(data.children.len());
    for &child in &data.children {
        let stmts = sim.simulate_node(child)?;
        if !stmts.is_empty() {
            // Condition blocks are expression-only by construction; any
            // statement here means the pattern match was too permissive.
            for s in stmts {
                let _ = s;
            }
        }
        let addr = sim.cfg.get(child).header.start_addr;
        let delta = sim.stack.len() as i64 - before as i64;
        if delta != 1 {
            anyhow::bail!(crate::ir::context::DecompileError::ShortCircuitStackSizeChanged {
                address: addr,
                delta,
            });
        }
        operands.push(sim.pop(addr)?);
    }
    let op = match data.logic_kind {
        crate::ir::node::LogicKind::And => LogicalOp::And,
        crate::ir::node::LogicKind::Or => LogicalOp::Or,
    };
    sim.stack.push(Expr::Logical { op, operands });
    Ok(())
}

fn simulate_if(sim: &mut Simulator<'_>, data: &crate::ir::node::IfData) -> Result<Stmt> {
    let cond_stmts = sim.simulate_node(data.condition_source)?;
    debug_assert!(cond_stmts.is_empty(), "condition source produced statements");
    let condition = sim.pop(sim.cfg.get(data.condition_source).header.end_addr)?;

    let then_branch = sim.simulate_node(data.then_branch)?;
    let else_branch = match data.else_branch {
        Some(n) => Some(sim.simulate_node(n)?),
        None => None,
    };

    Ok(Stmt::If(IfStmt {
        condition,
        then_branch,
        else_branch,
    }))
}

fn simulate_loop(sim: &mut Simulator<'_>, data: &crate::ir::node::LoopData) -> Result<Stmt> {
    match data.kind {
        LoopKind::While => {
            let head_stmts = sim.simulate_node(data.head)?;
            debug_assert!(head_stmts.is_empty());
            let condition = sim.pop(sim.cfg.get(data.head).header.end_addr)?;
            let rest: Vec<NodeId> = data
                .children
                .iter()
                .copied()
                .filter(|&n| n != data.head)
                .collect();
            let body = sim.run_sequence(rest)?;
            Ok(Stmt::While(WhileStmt { condition, body }))
        }
        LoopKind::DoUntil => {
            let body = sim.run_sequence(data.children.clone())?;
            let condition = sim
                .pop(sim.cfg.get(data.tail).header.end_addr)
                .context("do-until loop left no condition value on the stack")?;
            Ok(Stmt::DoUntil(DoUntilStmt { body, condition }))
        }
        LoopKind::Repeat => {
            let head_stmts = sim.simulate_node(data.head)?;
            debug_assert!(head_stmts.is_empty());
            let count = sim.pop(sim.cfg.get(data.head).header.end_addr)?;
            let rest: Vec<NodeId> = data
                .children
                .iter()
                .copied()
                .filter(|&n| n != data.head)
                .collect();
            let body = sim.run_sequence(rest)?;
            Ok(Stmt::Repeat(RepeatStmt { count, body }))
        }
        LoopKind::With => {
            let head_stmts = sim.simulate_node(data.head)?;
            debug_assert!(head_stmts.is_empty());
            let target = sim.pop(sim.cfg.get(data.head).header.end_addr)?;
            let rest: Vec<NodeId> = data
                .children
                .iter()
                .copied()
                .filter(|&n| n != data.head)
                .collect();
            let body = sim.run_sequence(rest)?;
            Ok(Stmt::With(WithStmt { target, body }))
        }
    }
}

fn simulate_switch(sim: &mut Simulator<'_>, data: &crate::ir::node::SwitchData) -> Result<Stmt> {
    // The discriminant source is the first dispatch block, still its
    // original `Block(_)` kind (structural recovery only reparents it).
    // Its last three instructions are the per-case value comparison
    // (`push <value>; compare.eq; branchtrue`), already captured in
    // `data.cases`; only the prefix pushes the discriminant expression
    // itself, so that's all we simulate here.
    let block = match &sim.cfg.get(data.discriminant_source).kind {
        NodeKind::Block(b) => b.clone(),
        _ => unreachable!("switch discriminant source is always a plain block"),
    };
    let prefix_len = block.instructions.len().saturating_sub(3);
    let disc_stmts = sim.simulate_instructions(&block.instructions[..prefix_len])?;
    debug_assert!(disc_stmts.is_empty());
    let discriminant = sim.pop(sim.cfg.get(data.discriminant_source).header.end_addr)?;

    // Two dispatch entries sharing the same body `NodeId` are the
    // fall-through `case a: case b:` shape; group them under one label
    // set rather than simulating (and emitting) the shared body twice.
    let mut order: Vec<NodeId> = Vec::new();
    let mut values_by_body: std::collections::HashMap<NodeId, Vec<crate::ir::instruction::Value>> =
        std::collections::HashMap::new();
    for case in &data.cases {
        values_by_body
            .entry(case.body)
            .or_insert_with(|| {
                order.push(case.body);
                Vec::new()
            })
            .push(case.value.clone());
    }

    let mut cases = Vec::with_capacity(order.len());
    for body_id in order {
        let stmts = sim.simulate_node(body_id)?;
        cases.push(CaseStmt {
            values: values_by_body.remove(&body_id).unwrap_or_default(),
            body: stmts,
        });
    }

    let default = match data.default {
        Some(n) => Some(sim.simulate_node(n)?),
        None => None,
    };

    Ok(Stmt::Switch(SwitchStmt {
        discriminant,
        cases,
        default,
    }))
}

fn simulate_try(sim: &mut Simulator<'_>, data: &crate::ir::node::TryData) -> Result<Stmt> {
    let try_body = sim.run_sequence(data.try_body.clone())?;
    let catch_body = match data.catch_body {
        Some(n) => Some(sim.simulate_node(n)?),
        None => None,
    };
    let finally_body = sim.simulate_node(data.finally_body)?;

    Ok(Stmt::Try(TryStmt {
        try_body,
        catch_body,
        finally_body,
    }))
}
