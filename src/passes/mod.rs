//! The three-pass pipeline: block building, structural recovery, and AST
//! building. Each pass is a free function taking the previous pass's
//! output by value/reference and returning the next representation,
//! mirroring the teacher's `ir::builder` → `optimizer` → `codegen` chain.

pub mod ast_builder;
pub mod block_builder;
pub mod structural;
