//! Types are checked here while the AST is rewritten by the optimizer and
//! then lowered and flattened to LIR.

pub mod context;
pub mod error;
pub mod lir;
pub mod optimization;
pub mod ty;
pub mod type_check;
