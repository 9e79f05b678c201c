//! Decompile context: configuration, VM constants, and the warning sink.
//!
//! Mirrors `herkos::TranspileOptions` — a small, `Default`-able options
//! struct threaded through the pipeline by reference, rather than globals.

use std::fmt;

/// Configuration recognized by the core (§6). Printer-only options live on
/// `crate::printer::PrinterOptions` instead — they don't affect the core.
#[derive(Debug, Clone)]
pub struct DecompileOptions {
    /// If `false`, leftover data on a fragment's expression stack at the end
    /// of simulation is a fatal error rather than a warning.
    pub allow_leftover_data_on_stack: bool,

    /// Array-indexing mode (§4.3's "version switches" note, §9): `true` for
    /// pre-GMLv2 bytecode, where 2D array accesses are packed into one
    /// index; `false` for modern bytecode, where arrays are already 1D.
    pub legacy_arrays: bool,

    /// The 2D-array multiplier used to decompose a packed legacy index
    /// (`OldArrayLimit` in §6). Only consulted when `legacy_arrays` is set.
    pub old_array_limit: i32,

    /// Name of the VM's try-hook intrinsic (`TryHookFunction` in §6),
    /// matched against `Call` instructions during block building.
    pub try_hook_function: String,

    /// Name of the VM's new-object intrinsic (`NewObjectFunction` in §6),
    /// matched against `Call` instructions during AST building.
    pub new_object_function: String,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            allow_leftover_data_on_stack: true,
            legacy_arrays: false,
            old_array_limit: 32000,
            try_hook_function: "@@try_hook@@".to_string(),
            new_object_function: "@@new@@".to_string(),
        }
    }
}

/// One entry in the warning stream (§6/§7). Warnings never abort an entry;
/// they accumulate and are always surfaced alongside whatever AST was
/// produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Expression stack was non-empty at the end of fragment simulation.
    DataLeftover {
        code_entry_name: String,
        number_of_elements: usize,
    },
    /// An opcode the simulator has no rule for.
    UnknownOpcode {
        code_entry_name: String,
        address: u32,
    },
    /// An `Extended` opcode the simulator has no rule for (distinct from
    /// `UnknownOpcode` so a host can tell "bad record" from "newer VM
    /// feature we haven't modeled").
    UnsupportedExtendedOpcode {
        code_entry_name: String,
        address: u32,
        extended_opcode: i32,
    },
    /// `PushReference` was encountered; §9 marks it out-of-core-scope.
    UnsupportedPushReference {
        code_entry_name: String,
        address: u32,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DataLeftover {
                code_entry_name,
                number_of_elements,
            } => write!(
                f,
                "{code_entry_name}: {number_of_elements} value(s) left on the expression stack"
            ),
            Warning::UnknownOpcode {
                code_entry_name,
                address,
            } => write!(f, "{code_entry_name}: unknown opcode at {address:#x}"),
            Warning::UnsupportedExtendedOpcode {
                code_entry_name,
                address,
                extended_opcode,
            } => write!(
                f,
                "{code_entry_name}: unsupported extended opcode {extended_opcode} at {address:#x}"
            ),
            Warning::UnsupportedPushReference {
                code_entry_name,
                address,
            } => write!(
                f,
                "{code_entry_name}: PushReference at {address:#x} is not yet supported"
            ),
        }
    }
}

/// Fatal errors (§7's "structural" and "stack-invariant" taxonomy). These
/// abort the entry: the host discards any partial output.
#[derive(Debug, Clone, PartialEq)]
pub enum DecompileError {
    /// The instruction window around a try-hook `Call` didn't match the
    /// fixed 6-instruction shape the block builder requires (§4.1).
    MalformedTryHookWindow { call_address: u32, detail: String },
    /// A branch offset points somewhere that isn't a block leader.
    DanglingBranchTarget { from_address: u32, target: u32 },
    /// A structural-recovery pass found a block with an unexpected number
    /// of predecessors for the pattern it's matching.
    UnexpectedPredecessorCount {
        address: u32,
        expected: usize,
        actual: usize,
    },
    /// A short-circuit child changed the stack depth by something other
    /// than +1.
    ShortCircuitStackSizeChanged { address: u32, delta: i64 },
    /// The simulator tried to pop from an empty expression stack outside
    /// the one context that allows it (`PopDelete`).
    PopOnEmptyStack { address: u32 },
    /// Internal control-stack bookkeeping underflowed; indicates a
    /// malformed hierarchy produced by structural recovery.
    ControlStackUnderflow,
    /// Expression stack was non-empty at the end of simulation and
    /// `allow_leftover_data_on_stack` is `false` (§7).
    DataLeftoverNotAllowed { number_of_elements: usize },
}

impl fmt::Display for DecompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompileError::MalformedTryHookWindow {
                call_address,
                detail,
            } => write!(
                f,
                "malformed try-hook instruction window at {call_address:#x}: {detail}"
            ),
            DecompileError::DanglingBranchTarget {
                from_address,
                target,
            } => write!(
                f,
                "branch at {from_address:#x} targets {target:#x}, which is not a block leader"
            ),
            DecompileError::UnexpectedPredecessorCount {
                address,
                expected,
                actual,
            } => write!(
                f,
                "block at {address:#x} has {actual} predecessor(s), expected {expected}"
            ),
            DecompileError::ShortCircuitStackSizeChanged { address, delta } => write!(
                f,
                "short circuit condition at {address:#x} changed stack size by {delta}"
            ),
            DecompileError::PopOnEmptyStack { address } => {
                write!(f, "pop on empty expression stack at {address:#x}")
            }
            DecompileError::ControlStackUnderflow => write!(f, "control stack underflow"),
            DecompileError::DataLeftoverNotAllowed { number_of_elements } => write!(
                f,
                "{number_of_elements} value(s) left on the expression stack and leftover data is not allowed"
            ),
        }
    }
}

impl std::error::Error for DecompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_spec_constants() {
        let opts = DecompileOptions::default();
        assert!(opts.allow_leftover_data_on_stack);
        assert!(!opts.legacy_arrays);
        assert_eq!(opts.old_array_limit, 32000);
    }

    #[test]
    fn warning_display_includes_entry_name() {
        let w = Warning::DataLeftover {
            code_entry_name: "root".to_string(),
            number_of_elements: 1,
        };
        assert!(w.to_string().contains("root"));
        assert!(w.to_string().contains('1'));
    }
}
