//! A tiny in-memory `CodeEntry` plus a line-oriented textual instruction
//! format, used by the demo binary and by tests so callers don't have to
//! hand-write `Instruction` struct literals for every case. This is not
//! the VM's own bytecode format — loading that is out of scope (§1) — it
//! exists purely to make this crate's core independently exercisable.
//!
//! Format, one instruction per line:
//!
//! ```text
//! <address> <opcode> [arg]
//! ```
//!
//! `arg` is opcode-dependent: an absolute target *address* (not a raw
//! byte offset — converted to `Instruction::value`'s relative offset at
//! parse time, for readability) for `branch`/`branchtrue`/`branchfalse`/
//! `pushwithcontext`/`popwithcontext`, an argument count for
//! `call <name> <count>`, a variable name for `push.var`/`pop.var`, or a
//! literal for `push.int`/`push.double`/`push.bool`/`push.string`.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};

use crate::ir::instruction::{
    ComparisonKind, DataType, ExtendedOpcode, FunctionRef, InstanceType, Opcode, ReferenceVarType,
    Value, VariableRef,
};
use crate::ir::{CodeEntry, Instruction};

/// A complete, self-contained code entry: its own instructions plus any
/// nested entries (function/struct literals) by index.
#[derive(Debug, Clone)]
pub struct SimpleCodeEntry {
    name: String,
    instructions: Vec<Instruction>,
    children: Vec<SimpleCodeEntry>,
    start_offset: u32,
    argument_count: usize,
    local_count: usize,
}

impl SimpleCodeEntry {
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            instructions,
            children: Vec::new(),
            start_offset: 0,
            argument_count: 0,
            local_count: 0,
        }
    }

    pub fn with_children(mut self, children: Vec<SimpleCodeEntry>) -> Self {
        self.children = children;
        self
    }

    pub fn with_argument_count(mut self, count: usize) -> Self {
        self.argument_count = count;
        self
    }

    pub fn with_local_count(mut self, count: usize) -> Self {
        self.local_count = count;
        self
    }

    pub fn with_start_offset(mut self, offset: u32) -> Self {
        self.start_offset = offset;
        self
    }
}

impl CodeEntry for SimpleCodeEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    fn instruction(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }

    fn length(&self) -> u32 {
        self.instructions
            .last()
            .map(|i| i.address + 1)
            .unwrap_or(0)
    }

    fn child_count(&self) -> usize {
        self.children.len()
    }

    fn child(&self, index: usize) -> &dyn CodeEntry {
        &self.children[index]
    }

    fn start_offset(&self) -> u32 {
        self.start_offset
    }

    fn argument_count(&self) -> usize {
        self.argument_count
    }

    fn local_count(&self) -> usize {
        self.local_count
    }
}

/// Parse the textual format described above into a root `SimpleCodeEntry`
/// named `name`. Nested entries are not expressible in this minimal
/// format — build them with [`SimpleCodeEntry::with_children`] instead.
pub fn parse(name: &str, text: &str) -> Result<SimpleCodeEntry> {
    let mut instructions = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let instr = parse_line(line)
            .with_context(|| format!("{name}: malformed instruction on line {}", line_no + 1))?;
        instructions.push(instr);
    }
    Ok(SimpleCodeEntry::new(name, instructions))
}

fn parse_line(line: &str) -> Result<Instruction> {
    let mut parts = line.split_whitespace();
    let address: u32 = parts
        .next()
        .ok_or_else(|| anyhow!("missing address"))?
        .parse()?;
    let mnemonic = parts.next().ok_or_else(|| anyhow!("missing opcode"))?;
    let rest: Vec<&str> = parts.collect();

    let base = |opcode: Opcode| Instruction {
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
    };

    let instr = match mnemonic {
        "branch" => with_offset(base(Opcode::Branch), &rest)?,
        "branchtrue" => with_offset(base(Opcode::BranchTrue), &rest)?,
        "branchfalse" => with_offset(base(Opcode::BranchFalse), &rest)?,
        "pushwithcontext" => with_offset(base(Opcode::PushWithContext), &rest)?,
        "popwithcontext" => with_offset(base(Opcode::PopWithContext), &rest)?,
        "push.int" => with_value(base(Opcode::Push), &rest, |s| Ok(Value::Int(s.parse()?)))?,
        "push.double" => with_value(base(Opcode::Push), &rest, |s| {
            Ok(Value::Double(s.parse()?))
        })?,
        "push.bool" => with_value(base(Opcode::Push), &rest, |s| Ok(Value::Bool(s.parse()?)))?,
        "push.string" => with_value(base(Opcode::Push), &rest, |s| Ok(Value::Str(s.to_string())))?,
        "push.var" => with_variable(base(Opcode::Push), &rest)?,
        "pop.var" => with_variable(base(Opcode::Pop), &rest)?,
        "pop.swap" => with_value(base(Opcode::Pop), &rest, |s| Ok(Value::Int(s.parse()?)))?,
        "call" => with_call(base(Opcode::Call), &rest)?,
        "return" => base(Opcode::Return),
        "exit" => base(Opcode::Exit),
        "popdelete" => base(Opcode::PopDelete),
        "convert" => base(Opcode::Convert),
        "add" => base(Opcode::Add),
        "sub" => base(Opcode::Sub),
        "mul" => base(Opcode::Mul),
        "div" => base(Opcode::Div),
        "mod" => base(Opcode::Mod),
        "rem" => base(Opcode::Rem),
        "and" => base(Opcode::And),
        "or" => base(Opcode::Or),
        "xor" => base(Opcode::Xor),
        "shl" => base(Opcode::Shl),
        "shr" => base(Opcode::Shr),
        "not" => base(Opcode::Not),
        "negate" => base(Opcode::Negate),
        "duplicate" => with_value(base(Opcode::Duplicate), &rest, |s| {
            Ok(Value::Int(s.parse()?))
        })?,
        "compare.lt" => with_comparison(base(Opcode::Compare), ComparisonKind::Lt),
        "compare.le" => with_comparison(base(Opcode::Compare), ComparisonKind::Le),
        "compare.eq" => with_comparison(base(Opcode::Compare), ComparisonKind::Eq),
        "compare.ne" => with_comparison(base(Opcode::Compare), ComparisonKind::Ne),
        "compare.ge" => with_comparison(base(Opcode::Compare), ComparisonKind::Ge),
        "compare.gt" => with_comparison(base(Opcode::Compare), ComparisonKind::Gt),
        "extended.setarrayowner" => {
            let mut i = base(Opcode::Extended);
            i.extended_opcode = Some(ExtendedOpcode::SetArrayOwner);
            i
        }
        "extended.pushreference" => {
            let mut i = base(Opcode::Extended);
            i.extended_opcode = Some(ExtendedOpcode::PushReference);
            i
        }
        other => bail!("unrecognized opcode mnemonic {other:?}"),
    };
    Ok(instr)
}

fn with_offset(mut instr: Instruction, rest: &[&str]) -> Result<Instruction> {
    let target: i64 = rest
        .first()
        .ok_or_else(|| anyhow!("missing branch target address"))?
        .parse()?;
    let offset = target - instr.address as i64;
    instr.value = Value::Int(offset as i32);
    Ok(instr)
}

fn with_value(
    mut instr: Instruction,
    rest: &[&str],
    parse: impl Fn(&str) -> Result<Value>,
) -> Result<Instruction> {
    let raw = rest.first().ok_or_else(|| anyhow!("missing value"))?;
    instr.value = parse(raw)?;
    Ok(instr)
}

fn with_comparison(mut instr: Instruction, kind: ComparisonKind) -> Instruction {
    instr.comparison = Some(kind);
    instr
}

fn with_variable(mut instr: Instruction, rest: &[&str]) -> Result<Instruction> {
    let name = rest
        .first()
        .ok_or_else(|| anyhow!("missing variable name"))?
        .to_string();
    let instance_type = rest
        .get(1)
        .map(|s| parse_instance_type(s))
        .transpose()?
        .unwrap_or(InstanceType::Zelf);
    instr.instance_type = instance_type;
    instr.reference_var_type = Some(ReferenceVarType::Normal);
    instr.variable = Some(VariableRef {
        name,
        instance_type,
    });
    Ok(instr)
}

fn parse_instance_type(s: &str) -> Result<InstanceType> {
    Ok(match s {
        "self" => InstanceType::Zelf,
        "other" => InstanceType::Other,
        "global" => InstanceType::Global,
        "local" => InstanceType::Local,
        "builtin" => InstanceType::Builtin,
        "stacktop" => InstanceType::StackTop,
        n => InstanceType::Object(n.parse()?),
    })
}

fn with_call(mut instr: Instruction, rest: &[&str]) -> Result<Instruction> {
    let name = rest
        .first()
        .ok_or_else(|| anyhow!("missing call target"))?
        .to_string();
    let argc: i32 = rest.get(1).unwrap_or(&"0").parse()?;
    instr.function = Some(FunctionRef { name });
    instr.value = Value::Int(argc);
    Ok(instr)
}

/// Look up a code entry's descendants by dotted path (`"outer.inner"`),
/// used by the demo CLI to report which fragment a warning belongs to.
pub fn collect_names(entry: &dyn CodeEntry) -> HashMap<String, ()> {
    let mut names = HashMap::new();
    names.insert(entry.name().to_string(), ());
    for i in 0..entry.child_count() {
        names.extend(collect_names(entry.child(i)));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_listing() {
        let entry = parse(
            "root",
            "0 push.int 1\n1 push.int 2\n2 add\n3 return\n",
        )
        .unwrap();
        assert_eq!(entry.instruction_count(), 4);
        assert_eq!(entry.instruction(2).opcode, Opcode::Add);
    }

    #[test]
    fn rejects_unknown_mnemonic() {
        assert!(parse("root", "0 frobnicate\n").is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let entry = parse("root", "# a comment\n\n0 return\n").unwrap();
        assert_eq!(entry.instruction_count(), 1);
    }
}
