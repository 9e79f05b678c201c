//! End-to-end scenarios: a textual instruction listing in, printed
//! pseudo-source out. Mirrors the teacher's `tests/e2e.rs` shape — a
//! small helper plus one `#[test]` per case.

use vmdecompile::demo_format::parse;
use vmdecompile::printer::{print_fragment, PrinterOptions};
use vmdecompile::{decompile, DecompileOptions};

fn run(name: &str, listing: &str) -> (String, vmdecompile::DecompileOutput) {
    let entry = parse(name, listing).expect("listing should parse");
    let output = decompile(&entry, &DecompileOptions::default()).expect("should decompile");
    let text = print_fragment(&output.ast, &PrinterOptions::default());
    (text, output)
}

/// S1: `if (a) { b(); } else { c(); }`
#[test]
fn s1_if_else() {
    let (text, output) = run(
        "s1",
        "0  push.bool true\n\
         1  branchfalse 5\n\
         2  call b 0\n\
         3  popdelete\n\
         4  branch 7\n\
         5  call c 0\n\
         6  popdelete\n\
         7  return\n",
    );
    assert!(output.warnings.is_empty());
    assert!(text.contains("if (true)"));
    assert!(text.contains("else"));
    assert!(text.contains("b();"));
    assert!(text.contains("c();"));
}

/// S2: two sequential `while` loops at the same nesting level.
#[test]
fn s2_sequential_while_loops() {
    let (text, output) = run(
        "s2",
        "0  push.bool true\n\
         1  branchfalse 5\n\
         2  call step_a 0\n\
         3  popdelete\n\
         4  branch 0\n\
         5  push.bool true\n\
         6  branchfalse 10\n\
         7  call step_b 0\n\
         8  popdelete\n\
         9  branch 5\n\
         10 return\n",
    );
    assert!(output.warnings.is_empty());
    assert_eq!(text.matches("while (true)").count(), 2);
    assert!(text.contains("step_a();"));
    assert!(text.contains("step_b();"));
}

/// S3: `repeat (5) { tick(); }`. The count is pushed by the block ahead of
/// the loop; the loop head itself is a no-op dispatch (`branch` to the
/// body) so the pushed count is still on top of the stack when the loop
/// is entered.
#[test]
fn s3_repeat_n() {
    let (text, output) = run(
        "s3",
        "0  push.int 5\n\
         1  branch 2\n\
         2  call tick 0\n\
         3  popdelete\n\
         4  branch 1\n\
         5  return\n",
    );
    assert!(output.warnings.is_empty());
    assert!(text.contains("repeat (5)"));
    assert!(text.contains("tick();"));
}

/// S4: a `do...until` nested inside another `do...until`.
#[test]
fn s4_nested_do_until() {
    let (text, output) = run(
        "s4",
        "0  call inner 0\n\
         1  popdelete\n\
         2  push.bool true\n\
         3  branchfalse 0\n\
         4  call outer 0\n\
         5  popdelete\n\
         6  push.bool true\n\
         7  branchfalse 0\n\
         8  return\n",
    );
    assert!(output.warnings.is_empty());
    assert_eq!(text.matches("do").count(), 2);
    assert_eq!(text.matches("until (true);").count(), 2);
    assert!(text.contains("inner();"));
    assert!(text.contains("outer();"));
}

/// S5: `switch (x) { case 1: case 2: body(); break; default: other(); }`
#[test]
fn s5_switch_fallthrough_and_default() {
    let (text, output) = run(
        "s5",
        "0  push.var x\n\
         1  push.int 1\n\
         2  compare.eq\n\
         3  branchtrue 9\n\
         4  push.var x\n\
         5  push.int 2\n\
         6  compare.eq\n\
         7  branchtrue 9\n\
         8  branch 12\n\
         9  call body 0\n\
         10 popdelete\n\
         11 branch 14\n\
         12 call other 0\n\
         13 popdelete\n\
         14 return\n",
    );
    assert!(output.warnings.is_empty());
    assert!(text.contains("switch (x)"));
    assert!(text.contains("case 1:"));
    assert!(text.contains("case 2:"));
    assert!(text.contains("default:"));
    assert!(text.contains("body();"));
    assert!(text.contains("other();"));
}

/// S6: leftover data on the expression stack at the end of a fragment
/// surfaces as a warning, never a hard error, when
/// `allow_leftover_data_on_stack` is left at its default of `true`.
#[test]
fn s6_leftover_stack_is_a_warning() {
    let entry = parse("s6", "0 push.int 1\n1 push.int 2\n").unwrap();
    let output = decompile(&entry, &DecompileOptions::default()).unwrap();
    assert_eq!(output.warnings.len(), 1);
    assert!(matches!(
        output.warnings[0],
        vmdecompile::Warning::DataLeftover { .. }
    ));
}
