//! macchiato is a minimal JVM: it parses a single class file and
//! interprets the integer subset of the bytecode instruction set
//! (arithmetic, control flow, static calls and int arrays).
pub mod bytecode;
pub mod heap;
pub mod jvm;
pub mod program;
pub mod runtime;
