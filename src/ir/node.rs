//! The control-flow graph: a flat arena of polymorphic nodes.
//!
//! Blocks and every structural composite (`Fragment`, `ShortCircuit`,
//! loops, `If`, `Switch`, `TryCatchFinally`, the `Empty` sentinel) live in
//! one `Vec<Node>`, addressed by stable `NodeId` indices rather than by
//! pointer or `Rc`. A node's single structural parent makes shared
//! ownership unnecessary (§9's "Design Notes"); edge surgery during
//! structural recovery just rewrites `NodeId` lists in place.
//!
//! The arena only grows: a structural-recovery pass that replaces a
//! subgraph with a composite appends the composite and repoints the
//! surrounding edges and parent pointers at it. The subgraph's original
//! nodes stay in the arena (now owned by the composite, reachable through
//! its `children()`), so no node reference is ever invalidated mid-pass.

use super::ast;
use super::instruction::Instruction;

/// Stable index into a `Cfg`'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// `LogicKind` for a `ShortCircuit` composite (§3/§4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicKind {
    And,
    Or,
}

/// Fields shared by every node variant: address range, hierarchy position,
/// and same-level edges. Edges only ever connect nodes sharing a parent
/// (§3's global invariant); structural recovery is responsible for
/// maintaining that as it re-levels the graph.
#[derive(Debug, Clone)]
pub struct NodeHeader {
    pub start_addr: u32,
    pub end_addr: u32,
    pub parent: Option<NodeId>,
    pub predecessors: Vec<NodeId>,
    pub successors: Vec<NodeId>,
    pub unreachable: bool,
}

impl NodeHeader {
    pub fn new(start_addr: u32, end_addr: u32) -> Self {
        Self {
            start_addr,
            end_addr,
            parent: None,
            predecessors: Vec::new(),
            successors: Vec::new(),
            unreachable: false,
        }
    }
}

/// A leaf basic block (§3): straight-line instructions, no internal
/// control flow. `block_index` is the dense, address-ordered index
/// assigned by the block builder (§3's block invariants refer to it).
#[derive(Debug, Clone)]
pub struct BlockData {
    pub block_index: u32,
    pub instructions: Vec<Instruction>,
}

/// A recovered `a && b` / `a || b` cascade (§4.2.1).
#[derive(Debug, Clone)]
pub struct ShortCircuitData {
    pub logic_kind: LogicKind,
    /// `[cond1_entry, cond2_entry, ..., condN_entry]`, in source order.
    pub children: Vec<NodeId>,
}

/// Shared anchor set for the four loop kinds (§3/§4.2.2). Which fields are
/// meaningful depends on `kind`:
///
/// - **While**: `head` is the condition block, `body` is the first block
///   after the condition, `tail` is the block holding the back-edge.
/// - **DoUntil**: `head` is the first body block (== loop entry), `tail`
///   is the block holding the conditional back-edge; `body` is unused
///   (the body is simply `head..tail`, simulated as one region).
/// - **Repeat**: `head` is the body's first block (the count-push itself
///   lives in the block *before* `head`, consumed via
///   `StartBlockInstructionIndex`), `tail` is the body's last block.
/// - **With**: `head` is the first body block, `tail` is the block
///   containing the closing `PopWithContext`/`PopenvDrop`; `break_block`
///   is `Some` only for With.
///
/// `after` is always the synthetic exit anchor (`Empty` node if the VM's
/// natural exit was implicit).
#[derive(Debug, Clone)]
pub struct LoopData {
    pub kind: LoopKind,
    pub head: NodeId,
    pub tail: NodeId,
    pub after: NodeId,
    pub body: Option<NodeId>,
    pub break_block: Option<NodeId>,
    /// Every node enclosed by the loop, owned by this composite.
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    DoUntil,
    Repeat,
    With,
}

/// `If`/`Else` composite (§4.2.3).
#[derive(Debug, Clone)]
pub struct IfData {
    /// The block whose tail instruction is the governing conditional
    /// branch; simulating it leaves the condition expression on the stack.
    pub condition_source: NodeId,
    pub then_branch: NodeId,
    pub else_branch: Option<NodeId>,
}

/// One labeled arm of a `Switch` (§4.2.3). Consecutive cases with no
/// intervening body share `body` — callers collapse those into one
/// `case A, B:` label group when printing.
#[derive(Debug, Clone)]
pub struct SwitchCaseData {
    pub value: super::instruction::Value,
    pub body: NodeId,
}

#[derive(Debug, Clone)]
pub struct SwitchData {
    pub discriminant_source: NodeId,
    pub cases: Vec<SwitchCaseData>,
    pub default: Option<NodeId>,
}

/// `Try`/`Catch`/`Finally` composite (§4.2.4). `try_body` is every block
/// between the hook's real body entry and the finally body, not the hook
/// window itself — the hook block carries none of the user's guarded
/// code, only the plumbing that sets up the finally/catch addresses.
#[derive(Debug, Clone)]
pub struct TryData {
    pub try_body: Vec<NodeId>,
    pub catch_body: Option<NodeId>,
    pub finally_body: NodeId,
}

/// A nested code entry (function/struct body) embedded at this point
/// (§3 glossary: "Fragment"). `ast` is the already-built AST for the
/// child entry — fragments are recovered leaves-first (§2), so by the
/// time the enclosing entry's structural recovery runs, every nested
/// fragment it references has already been fully decompiled.
///
/// The host block's other instructions are kept verbatim: the typical
/// `var f = function(){...}` pattern compiles to a `Push` of the
/// function reference followed by a `Pop` assigning it in the *same*
/// block, and that `Pop` has to survive this node replacing the block.
#[derive(Debug, Clone)]
pub struct FragmentData {
    pub child_index: usize,
    pub ast: ast::Fragment,
    pub host_instructions: Vec<Instruction>,
    /// Index into `host_instructions` of the `Push` this fragment stands
    /// in for.
    pub push_index: usize,
}

/// The capability-set variants from §3. `Block`/`Fragment` are leaves (no
/// `children()`); every other variant is a composite that owns its
/// children exclusively.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Block(BlockData),
    Fragment(FragmentData),
    ShortCircuit(ShortCircuitData),
    Loop(LoopData),
    If(IfData),
    Switch(SwitchData),
    TryCatchFinally(TryData),
    /// Sentinel "after" anchor synthesized for a loop with no natural
    /// fall-through exit.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub header: NodeHeader,
    pub kind: NodeKind,
}

impl Node {
    pub fn children(&self) -> Option<Vec<NodeId>> {
        match &self.kind {
            NodeKind::Block(_) | NodeKind::Fragment(_) | NodeKind::Empty => None,
            NodeKind::ShortCircuit(s) => Some(s.children.clone()),
            NodeKind::Loop(l) => Some(l.children.clone()),
            NodeKind::If(i) => {
                let mut v = vec![i.then_branch];
                if let Some(e) = i.else_branch {
                    v.push(e);
                }
                Some(v)
            }
            NodeKind::Switch(s) => {
                let mut v: Vec<NodeId> = s.cases.iter().map(|c| c.body).collect();
                if let Some(d) = s.default {
                    v.push(d);
                }
                Some(v)
            }
            NodeKind::TryCatchFinally(t) => {
                let mut v = t.try_body.clone();
                if let Some(c) = t.catch_body {
                    v.push(c);
                }
                v.push(t.finally_body);
                Some(v)
            }
        }
    }
}

/// The flat node arena plus the root of the (eventually) fully recovered
/// hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Cfg {
    nodes: Vec<Node>,
    /// Block-index → NodeId, valid for the lifetime of the arena (block
    /// nodes are never removed, only reparented).
    pub root: Option<NodeId>,
}

impl Cfg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Detach every predecessor edge pointing at `old`, repointing it at
    /// `new` — used by `InsertStructure` (§4.2) to move edges onto a
    /// freshly inserted composite.
    pub fn retarget_predecessors(&mut self, old: NodeId, new: NodeId) {
        let ids: Vec<NodeId> = (0..self.nodes.len()).map(|i| NodeId(i as u32)).collect();
        for id in ids {
            for succ in self.nodes[id.0 as usize].header.successors.iter_mut() {
                if *succ == old {
                    *succ = new;
                }
            }
        }
    }

    /// Detach every successor edge originating from `old`, repointing it
    /// to originate from `new`.
    pub fn retarget_successors(&mut self, old: NodeId, new: NodeId) {
        let ids: Vec<NodeId> = (0..self.nodes.len()).map(|i| NodeId(i as u32)).collect();
        for id in ids {
            for pred in self.nodes[id.0 as usize].header.predecessors.iter_mut() {
                if *pred == old {
                    *pred = new;
                }
            }
        }
    }
}
