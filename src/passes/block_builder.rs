//! Block Builder (§4.1): segments one code entry's flat instruction stream
//! into leader-delimited basic blocks, wires up predecessor/successor
//! edges, and marks anything unreachable from the entry address.
//!
//! This is the first pass in the pipeline; its output (a `Cfg` whose
//! arena holds nothing but `NodeKind::Block` nodes, one per address
//! window, with `root` left unset) feeds directly into structural
//! recovery.

use std::collections::{BTreeSet, HashMap};

use anyhow::{bail, Result};

use crate::ir::context::DecompileError;
use crate::ir::instruction::Opcode;
use crate::ir::node::{BlockData, Cfg, Node, NodeHeader, NodeId, NodeKind};
use crate::ir::{CodeEntry, DecompileOptions, Instruction};

/// Build the leader-delimited block graph for one code entry.
///
/// Blocks are returned address-ordered; `block_index` on each
/// `BlockData` matches that order, so later passes can use it as a dense
/// key without re-deriving it from addresses.
pub fn build_blocks(entry: &dyn CodeEntry, options: &DecompileOptions) -> Result<Cfg> {
    let instructions: Vec<&Instruction> = (0..entry.instruction_count())
        .map(|i| entry.instruction(i))
        .collect();

    let (leaders, try_windows) = find_leaders(&instructions, entry.length(), options)?;
    let mut cfg = Cfg::new();
    let node_for_leader = emit_blocks(&mut cfg, &instructions, &leaders);
    wire_edges(&mut cfg, &instructions, &leaders, &node_for_leader, &try_windows)?;
    mark_unreachable(&mut cfg);

    Ok(cfg)
}

/// The finally/catch target addresses read off one isolated try-hook
/// window, keyed by the window's (hence the hosting block's) start
/// address, so `wire_edges` can look one up by the block it's wiring.
struct TryHookWindow {
    finally_target: u32,
    catch_target: Option<u32>,
}

/// Addresses at which a new block must start: the entry point, every
/// branch target, the instruction following any block-ending opcode, and
/// the boundaries of an isolated try-hook window (§4.1).
fn find_leaders(
    instructions: &[&Instruction],
    entry_length: u32,
    options: &DecompileOptions,
) -> Result<(BTreeSet<u32>, HashMap<u32, TryHookWindow>)> {
    let mut leaders = BTreeSet::new();
    let mut try_windows = HashMap::new();
    if let Some(first) = instructions.first() {
        leaders.insert(first.address);
    }

    for (i, instr) in instructions.iter().enumerate() {
        if let Some(target) = instr.branch_target() {
            leaders.insert(target);
        }
        if instr.opcode.always_ends_block() {
            if let Some(next) = instructions.get(i + 1) {
                leaders.insert(next.address);
            }
        }
        if instr.calls(&options.try_hook_function) {
            let window = try_hook_window(instructions, i)?;
            leaders.insert(window.start_addr);
            if window.end_index < instructions.len() {
                leaders.insert(instructions[window.end_index].address);
            }
            try_windows.insert(
                window.start_addr,
                TryHookWindow {
                    finally_target: window.finally_target,
                    catch_target: window.catch_target,
                },
            );
        }
    }

    leaders.insert(entry_length);
    Ok((leaders, try_windows))
}

struct RawTryHookWindow {
    start_addr: u32,
    end_index: usize,
    finally_target: u32,
    catch_target: Option<u32>,
}

/// The try-hook `Call` sits in the middle of a fixed 6-instruction
/// window (§4.1): `{finally-push, convert, catch-push, convert, call,
/// popdelete}`. Isolating that whole window into its own block keeps it
/// intact for the try/catch/finally structural pass (§4.2.4), which
/// matches on it as a single unit rather than trying to recognize it
/// split across arbitrary block boundaries.
fn try_hook_window(instructions: &[&Instruction], call_index: usize) -> Result<RawTryHookWindow> {
    const BEFORE: usize = 4;

    if call_index < BEFORE {
        bail!(DecompileError::MalformedTryHookWindow {
            call_address: instructions[call_index].address,
            detail: format!(
                "expected {BEFORE} instruction(s) before the try-hook call, found {call_index}"
            ),
        });
    }
    for idx in [call_index - 4, call_index - 2] {
        if instructions[idx].opcode != Opcode::Push {
            bail!(DecompileError::MalformedTryHookWindow {
                call_address: instructions[call_index].address,
                detail: format!(
                    "expected Push at index {idx}, found {:?}",
                    instructions[idx].opcode
                ),
            });
        }
    }
    for idx in [call_index - 3, call_index - 1] {
        if instructions[idx].opcode != Opcode::Convert {
            bail!(DecompileError::MalformedTryHookWindow {
                call_address: instructions[call_index].address,
                detail: format!(
                    "expected Convert at index {idx}, found {:?}",
                    instructions[idx].opcode
                ),
            });
        }
    }
    if call_index + 1 >= instructions.len() || instructions[call_index + 1].opcode != Opcode::PopDelete {
        bail!(DecompileError::MalformedTryHookWindow {
            call_address: instructions[call_index].address,
            detail: "expected PopDelete immediately after the try-hook call".to_string(),
        });
    }

    let finally_target = match instructions[call_index - 4].value.as_int() {
        Some(v) => v as u32,
        None => bail!(DecompileError::MalformedTryHookWindow {
            call_address: instructions[call_index].address,
            detail: "finally-address Push carries no int payload".to_string(),
        }),
    };
    let catch_raw = match instructions[call_index - 2].value.as_int() {
        Some(v) => v,
        None => bail!(DecompileError::MalformedTryHookWindow {
            call_address: instructions[call_index].address,
            detail: "catch-address Push carries no int payload".to_string(),
        }),
    };
    let catch_target = if catch_raw == -1 { None } else { Some(catch_raw as u32) };

    Ok(RawTryHookWindow {
        start_addr: instructions[call_index - BEFORE].address,
        end_index: call_index + 2,
        finally_target,
        catch_target,
    })
}

fn emit_blocks(
    cfg: &mut Cfg,
    instructions: &[&Instruction],
    leaders: &BTreeSet<u32>,
) -> HashMap<u32, NodeId> {
    let ordered: Vec<u32> = leaders.iter().copied().collect();
    let mut node_for_leader = HashMap::new();
    let mut block_index = 0u32;

    for window in ordered.windows(2) {
        let (start, end) = (window[0], window[1]);
        let body: Vec<Instruction> = instructions
            .iter()
            .filter(|i| i.address >= start && i.address < end)
            .map(|i| (*i).clone())
            .collect();

        let node = Node {
            header: NodeHeader::new(start, end),
            kind: NodeKind::Block(BlockData {
                block_index,
                instructions: body,
            }),
        };
        let id = cfg.push(node);
        node_for_leader.insert(start, id);
        block_index += 1;
    }

    node_for_leader
}

fn wire_edges(
    cfg: &mut Cfg,
    instructions: &[&Instruction],
    leaders: &BTreeSet<u32>,
    node_for_leader: &HashMap<u32, NodeId>,
    try_windows: &HashMap<u32, TryHookWindow>,
) -> Result<()> {
    let ordered: Vec<u32> = leaders.iter().copied().collect();

    for (i, &start) in ordered.iter().enumerate() {
        let Some(&id) = node_for_leader.get(&start) else {
            continue;
        };
        let last = match block_last_instruction(instructions, start, ordered.get(i + 1).copied())
        {
            Some(instr) => instr,
            None => continue,
        };

        let mut successors = Vec::new();
        if let Some(target) = last.branch_target() {
            let target_id = *node_for_leader.get(&target).ok_or_else(|| {
                DecompileError::DanglingBranchTarget {
                    from_address: last.address,
                    target,
                }
            })?;
            successors.push(target_id);
        }
        let falls_through = match last.opcode {
            Opcode::Branch => false,
            _ if last.opcode.is_block_terminal() => false,
            _ => true,
        };
        if falls_through {
            if let Some(&next_start) = ordered.get(i + 1) {
                if let Some(&next_id) = node_for_leader.get(&next_start) {
                    successors.push(next_id);
                }
            }
        }

        // §4.1's `PopDelete` rule: a try-hook block additionally reaches
        // the finally block and, if it has one, the catch block.
        if last.opcode == Opcode::PopDelete {
            if let Some(window) = try_windows.get(&start) {
                let finally_id = *node_for_leader.get(&window.finally_target).ok_or_else(|| {
                    DecompileError::DanglingBranchTarget {
                        from_address: last.address,
                        target: window.finally_target,
                    }
                })?;
                successors.push(finally_id);
                if let Some(catch_target) = window.catch_target {
                    let catch_id = *node_for_leader.get(&catch_target).ok_or_else(|| {
                        DecompileError::DanglingBranchTarget {
                            from_address: last.address,
                            target: catch_target,
                        }
                    })?;
                    successors.push(catch_id);
                }
            }
        }

        for &succ in &successors {
            cfg.get_mut(succ).header.predecessors.push(id);
        }
        cfg.get_mut(id).header.successors = successors;
    }

    Ok(())
}

fn block_last_instruction<'a>(
    instructions: &[&'a Instruction],
    start: u32,
    next_leader: Option<u32>,
) -> Option<&'a Instruction> {
    let end = next_leader.unwrap_or(u32::MAX);
    instructions
        .iter()
        .filter(|i| i.address >= start && i.address < end)
        .last()
        .copied()
}

/// Mark every node not reachable from the first block via successor
/// edges. Structural recovery skips unreachable nodes entirely rather
/// than trying to fold them into a pattern (§4.1's failure semantics:
/// dead code from the loader is not this pass's problem to explain).
fn mark_unreachable(cfg: &mut Cfg) {
    let Some(root) = cfg.iter().next().map(|(id, _)| id) else {
        return;
    };

    let mut visited = vec![false; cfg.len()];
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if visited[id.0 as usize] {
            continue;
        }
        visited[id.0 as usize] = true;
        for &succ in &cfg.get(id).header.successors.clone() {
            if !visited[succ.0 as usize] {
                stack.push(succ);
            }
        }
    }

    for (id, reached) in visited.into_iter().enumerate() {
        if !reached {
            cfg.get_mut(NodeId(id as u32)).header.unreachable = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_format::SimpleCodeEntry;
    use crate::ir::instruction::{ComparisonKind, DataType, InstanceType, Value};

    fn instr(address: u32, opcode: Opcode) -> Instruction {
        Instruction {
            address,
            opcode,
            extended_opcode: None,
            comparison: None,
            type1: DataType::Int32,
            type2: DataType::Int32,
            instance_type: InstanceType::Zelf,
            variable: None,
            function: None,
            reference_var_type: None,
            value: Value::None,
        }
    }

    #[test]
    fn straight_line_code_is_one_block() {
        let entry = SimpleCodeEntry::new(
            "root",
            vec![instr(0, Opcode::Push), instr(1, Opcode::Return)],
        );
        let cfg = build_blocks(&entry, &DecompileOptions::default()).unwrap();
        assert_eq!(cfg.len(), 1);
    }

    #[test]
    fn branch_target_splits_blocks() {
        let mut b = instr(0, Opcode::BranchFalse);
        b.value = Value::Int(3);
        let entry = SimpleCodeEntry::new(
            "root",
            vec![b, instr(1, Opcode::Push), instr(3, Opcode::Return)],
        );
        let cfg = build_blocks(&entry, &DecompileOptions::default()).unwrap();
        assert_eq!(cfg.len(), 3);
    }

    #[test]
    fn dangling_branch_target_is_fatal() {
        let mut b = instr(0, Opcode::Branch);
        b.value = Value::Int(99);
        let entry = SimpleCodeEntry::new("root", vec![b]);
        let result = build_blocks(&entry, &DecompileOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn unreachable_block_is_marked() {
        let mut ret = instr(0, Opcode::Return);
        ret.comparison = None;
        let dead = instr(1, Opcode::Push);
        let entry = SimpleCodeEntry::new("root", vec![ret, dead, instr(2, Opcode::Return)]);
        let cfg = build_blocks(&entry, &DecompileOptions::default()).unwrap();
        assert!(cfg.iter().any(|(_, n)| n.header.unreachable));
        let _ = ComparisonKind::Eq;
    }
}
