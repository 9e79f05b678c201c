//! Decompiles stack-machine bytecode into a structured, high-level
//! statement tree.
//!
//! The pipeline is three passes over one code entry: [`passes::block_builder`]
//! segments its instructions into a leader-delimited control-flow graph,
//! [`passes::structural`] repeatedly folds recognizable control-flow
//! patterns into composite nodes, and [`passes::ast_builder`] simulates
//! the result to produce a [`ir::ast::Fragment`]. Nested code entries
//! (function/struct bodies) are decompiled leaves-first so their ASTs are
//! ready by the time their parent's fragment-recovery sub-pass runs.

pub mod demo_format;
pub mod ir;
pub mod passes;
pub mod printer;

use anyhow::{Context, Result};

pub use ir::ast::{DecompileOutput, Fragment};
pub use ir::context::{DecompileError, DecompileOptions, Warning};
pub use ir::CodeEntry;

/// Decompile one code entry, recursively decompiling its children first.
///
/// On success, every warning collected anywhere in the tree (this entry
/// and all its descendants) is returned alongside the top entry's AST;
/// child fragments are embedded in the AST as
/// [`ir::ast::Expr::FunctionLiteral`] nodes rather than returned
/// separately, matching how they appear in source.
pub fn decompile(entry: &dyn CodeEntry, options: &DecompileOptions) -> Result<DecompileOutput> {
    let mut warnings = Vec::new();
    let ast = decompile_entry(entry, options, &mut warnings)?;
    Ok(DecompileOutput { ast, warnings })
}

fn decompile_entry(
    entry: &dyn CodeEntry,
    options: &DecompileOptions,
    warnings: &mut Vec<Warning>,
) -> Result<Fragment> {
    let mut children = Vec::with_capacity(entry.child_count());
    for index in 0..entry.child_count() {
        let child_ast = decompile_entry(entry.child(index), options, warnings)
            .with_context(|| format!("decompiling nested entry #{index} of {}", entry.name()))?;
        children.push((index, child_ast));
    }

    let mut cfg = passes::block_builder::build_blocks(entry, options)
        .with_context(|| format!("building blocks for {}", entry.name()))?;

    passes::structural::recover(&mut cfg, children);

    let (body, mut entry_warnings) = passes::ast_builder::build(&cfg, options, entry.name())
        .with_context(|| format!("simulating {}", entry.name()))?;
    warnings.append(&mut entry_warnings);

    Ok(Fragment {
        name: entry.name().to_string(),
        argument_count: entry.argument_count(),
        local_count: entry.local_count(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_format::parse;

    #[test]
    fn decompiles_a_trivial_return() {
        let entry = parse("root", "0 push.int 1\n1 return\n").unwrap();
        let output = decompile(&entry, &DecompileOptions::default()).unwrap();
        assert_eq!(output.ast.body.len(), 1);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn leftover_stack_value_is_a_warning_by_default() {
        let entry = parse("root", "0 push.int 1\n").unwrap();
        let output = decompile(&entry, &DecompileOptions::default()).unwrap();
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn leftover_stack_value_is_fatal_when_disallowed() {
        let entry = parse("root", "0 push.int 1\n").unwrap();
        let mut options = DecompileOptions::default();
        options.allow_leftover_data_on_stack = false;
        assert!(decompile(&entry, &options).is_err());
    }
}
