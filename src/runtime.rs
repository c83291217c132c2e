//! JVM runtime module responsible for creating a new runtime
//! environment and running programs.
//!
//! The runtime owns an explicit stack of call frames; `invokestatic`
//! pushes a frame and the return instructions pop one, so interpreted
//! call depth never consumes host stack. Every malformed-bytecode
//! condition (stack overflow or underflow, bad indices, division by
//! zero, out-of-range shift amounts, unknown opcodes) is checked and
//! reported as a `RuntimeError` instead of being left undefined.
use std::fmt;
use std::io::Write;

use log::{debug, trace};

use crate::bytecode::OPCode;
use crate::heap::Heap;
use crate::program::{Program, MAIN_METHOD};

type Result<T> = std::result::Result<T, RuntimeError>;

/// `RuntimeErrorKind` represents the possible errors that can occur
/// during runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    StackOverflow,
    StackUnderflow,
    InvalidLocalIndex(usize),
    InvalidConstantIndex(u16),
    InvalidBranchTarget(i64),
    TruncatedInstruction,
    DivisionByZero,
    ShiftOutOfRange(i32),
    UnknownOpcode(u8),
    UnresolvedMethod(u16),
    InvalidReference(i32),
    ArrayIndexOutOfBounds { index: i32, length: i32 },
    NegativeArraySize(i32),
    MissingEntryPoint,
    EntryPointReturnedValue,
    Io(String),
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::StackOverflow => {
                write!(f, "operand stack grew past max_stack")
            }
            Self::StackUnderflow => write!(f, "operand stack underflow"),
            Self::InvalidLocalIndex(index) => {
                write!(f, "locals index {index} is out of range")
            }
            Self::InvalidConstantIndex(index) => {
                write!(f, "constant pool index {index} is not an integer literal")
            }
            Self::InvalidBranchTarget(target) => {
                write!(f, "branch target {target} is outside the method body")
            }
            Self::TruncatedInstruction => {
                write!(f, "instruction operands run past the end of the bytecode")
            }
            Self::DivisionByZero => {
                write!(f, "integer division or remainder by zero")
            }
            Self::ShiftOutOfRange(amount) => {
                write!(f, "shift amount {amount} is outside 0..=31")
            }
            Self::UnknownOpcode(opcode) => {
                write!(f, "unknown opcode 0x{opcode:02x}")
            }
            Self::UnresolvedMethod(index) => {
                write!(f, "method reference {index} does not resolve to a static method")
            }
            Self::InvalidReference(reference) => {
                write!(f, "invalid array reference {reference}")
            }
            Self::ArrayIndexOutOfBounds { index, length } => {
                write!(f, "array index {index} out of bounds for length {length}")
            }
            Self::NegativeArraySize(length) => {
                write!(f, "negative array length {length}")
            }
            Self::MissingEntryPoint => {
                write!(f, "class has no static main(String[]) method")
            }
            Self::EntryPointReturnedValue => {
                write!(f, "main() should return void")
            }
            Self::Io(message) => write!(f, "output error: {message}"),
        }
    }
}

/// `RuntimeError` is a custom type used to handle and represent
/// possible execution failures, annotated with the method and program
/// counter where the failure surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    kind: RuntimeErrorKind,
    method: String,
    pc: usize,
}

impl RuntimeError {
    pub fn kind(&self) -> &RuntimeErrorKind {
        &self.kind
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.kind == RuntimeErrorKind::MissingEntryPoint {
            return write!(f, "{}", self.kind);
        }
        write!(f, "{} (in `{}` at pc {})", self.kind, self.method, self.pc)
    }
}

/// Execution state for one method activation: its operand stack, its
/// locals and a program counter into the method's bytecode. Created on
/// invocation, destroyed on return.
#[derive(Debug, Clone)]
struct Frame {
    method_index: usize,
    pc: usize,
    stack: Vec<i32>,
    locals: Vec<i32>,
    max_stack: usize,
}

impl Frame {
    fn new(method_index: usize, max_stack: usize, locals: Vec<i32>) -> Self {
        Self {
            method_index,
            pc: 0,
            stack: Vec::with_capacity(max_stack),
            locals,
            max_stack,
        }
    }

    fn push(&mut self, value: i32) -> std::result::Result<(), RuntimeErrorKind> {
        if self.stack.len() >= self.max_stack {
            return Err(RuntimeErrorKind::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> std::result::Result<i32, RuntimeErrorKind> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn local(&self, index: usize) -> std::result::Result<i32, RuntimeErrorKind> {
        self.locals
            .get(index)
            .copied()
            .ok_or(RuntimeErrorKind::InvalidLocalIndex(index))
    }

    fn set_local(
        &mut self,
        index: usize,
        value: i32,
    ) -> std::result::Result<(), RuntimeErrorKind> {
        match self.locals.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeErrorKind::InvalidLocalIndex(index)),
        }
    }
}

/// Effect of one dispatched instruction on the frame stack.
enum Action {
    Continue,
    PushFrame(Frame),
    PopFrame(Option<i32>),
}

/// `Runtime` represents an execution context for a parsed class: it owns
/// the program, the array heap and the stack of live call frames, and
/// interprets bytecode until the entry frame terminates.
pub struct Runtime {
    program: Program,
    heap: Heap,
    frames: Vec<Frame>,
}

impl Runtime {
    /// Creates a runtime with the entry frame for `main` already pushed.
    /// Locals slot 0 of that frame is reserved for the `String[]`
    /// argument, which the supported subset leaves as zero.
    pub fn new(program: Program) -> Result<Self> {
        let Some(entry_index) = program.entry_point() else {
            return Err(RuntimeError {
                kind: RuntimeErrorKind::MissingEntryPoint,
                method: MAIN_METHOD.to_string(),
                pc: 0,
            });
        };
        let main = &program.methods[entry_index];
        let entry_frame = Frame::new(
            entry_index,
            main.max_stack as usize,
            vec![0; main.max_locals as usize],
        );
        Ok(Self {
            program,
            heap: Heap::new(),
            frames: vec![entry_frame],
        })
    }

    /// Runs the program to completion, writing print-shortcut output to
    /// `out`. Returns when the entry frame terminates.
    pub fn run(&mut self, out: &mut impl Write) -> Result<()> {
        while !self.frames.is_empty() {
            self.step(out)?;
        }
        Ok(())
    }

    /// Fetches, decodes and executes a single instruction of the top
    /// frame, or pops the frame if its bytecode is exhausted (implicit
    /// void fallthrough).
    fn step(&mut self, out: &mut impl Write) -> Result<()> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        let method_index = frame.method_index;
        let method = &self.program.methods[method_index];
        let pc = frame.pc;

        if pc >= method.code.len() {
            debug!("`{}` fell off its bytecode, implicit void return", method.name);
            self.frames.pop();
            return Ok(());
        }

        let opcode = OPCode::from(method.code[pc]);
        trace!("`{}` pc {pc}: {opcode:?}", method.name);

        let err = |kind: RuntimeErrorKind| RuntimeError {
            kind,
            method: method.name.clone(),
            pc,
        };
        let u8_operand = |offset: usize| {
            method
                .code
                .get(pc + offset)
                .copied()
                .ok_or(RuntimeErrorKind::TruncatedInstruction)
        };
        let i16_operand = || -> std::result::Result<i16, RuntimeErrorKind> {
            Ok((i16::from(u8_operand(1)?) << 8) | i16::from(u8_operand(2)?))
        };

        let action = match opcode {
            OPCode::Nop => {
                frame.pc = pc + 1;
                Action::Continue
            }
            // The constant is encoded in the opcode itself.
            OPCode::IconstM1
            | OPCode::Iconst0
            | OPCode::Iconst1
            | OPCode::Iconst2
            | OPCode::Iconst3
            | OPCode::Iconst4
            | OPCode::Iconst5 => {
                let value = i32::from(method.code[pc]) - 0x03;
                frame.push(value).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::BiPush => {
                let value = i32::from(u8_operand(1).map_err(err)? as i8);
                frame.push(value).map_err(err)?;
                frame.pc = pc + 2;
                Action::Continue
            }
            OPCode::SiPush => {
                let value = i32::from(i16_operand().map_err(err)?);
                frame.push(value).map_err(err)?;
                frame.pc = pc + 3;
                Action::Continue
            }
            OPCode::Ldc => {
                let index = u16::from(u8_operand(1).map_err(err)?);
                let value = self
                    .program
                    .integer_constant(index)
                    .ok_or_else(|| err(RuntimeErrorKind::InvalidConstantIndex(index)))?;
                frame.push(value).map_err(err)?;
                frame.pc = pc + 2;
                Action::Continue
            }
            OPCode::IAdd
            | OPCode::ISub
            | OPCode::IMul
            | OPCode::IDiv
            | OPCode::IRem
            | OPCode::IShl
            | OPCode::IShr
            | OPCode::IUShr
            | OPCode::IAnd
            | OPCode::IOr
            | OPCode::IXor => {
                let rhs = frame.pop().map_err(err)?;
                let lhs = frame.pop().map_err(err)?;
                let result = match opcode {
                    OPCode::IAdd => lhs.wrapping_add(rhs),
                    OPCode::ISub => lhs.wrapping_sub(rhs),
                    OPCode::IMul => lhs.wrapping_mul(rhs),
                    OPCode::IDiv => {
                        if rhs == 0 {
                            return Err(err(RuntimeErrorKind::DivisionByZero));
                        }
                        // Truncates toward zero; i32::MIN / -1 wraps.
                        lhs.wrapping_div(rhs)
                    }
                    OPCode::IRem => {
                        if rhs == 0 {
                            return Err(err(RuntimeErrorKind::DivisionByZero));
                        }
                        lhs.wrapping_rem(rhs)
                    }
                    // Shift amounts are taken unmasked; anything outside
                    // the type width is reported instead of being UB.
                    OPCode::IShl | OPCode::IShr | OPCode::IUShr => {
                        if !(0..=31).contains(&rhs) {
                            return Err(err(RuntimeErrorKind::ShiftOutOfRange(rhs)));
                        }
                        match opcode {
                            OPCode::IShl => lhs << rhs,
                            OPCode::IShr => lhs >> rhs,
                            _ => ((lhs as u32) >> rhs) as i32,
                        }
                    }
                    OPCode::IAnd => lhs & rhs,
                    OPCode::IOr => lhs | rhs,
                    _ => lhs ^ rhs,
                };
                frame.push(result).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::INeg => {
                let value = frame.pop().map_err(err)?;
                frame.push(value.wrapping_neg()).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::ILoad | OPCode::ALoad => {
                let index = usize::from(u8_operand(1).map_err(err)?);
                let value = frame.local(index).map_err(err)?;
                frame.push(value).map_err(err)?;
                frame.pc = pc + 2;
                Action::Continue
            }
            OPCode::IStore | OPCode::AStore => {
                let index = usize::from(u8_operand(1).map_err(err)?);
                let value = frame.pop().map_err(err)?;
                frame.set_local(index, value).map_err(err)?;
                frame.pc = pc + 2;
                Action::Continue
            }
            OPCode::ILoad0
            | OPCode::ILoad1
            | OPCode::ILoad2
            | OPCode::ILoad3
            | OPCode::ALoad0
            | OPCode::ALoad1
            | OPCode::ALoad2
            | OPCode::ALoad3 => {
                let slot = match opcode {
                    OPCode::ILoad0 | OPCode::ALoad0 => 0,
                    OPCode::ILoad1 | OPCode::ALoad1 => 1,
                    OPCode::ILoad2 | OPCode::ALoad2 => 2,
                    _ => 3,
                };
                let value = frame.local(slot).map_err(err)?;
                frame.push(value).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::IStore0
            | OPCode::IStore1
            | OPCode::IStore2
            | OPCode::IStore3
            | OPCode::AStore0
            | OPCode::AStore1
            | OPCode::AStore2
            | OPCode::AStore3 => {
                let slot = match opcode {
                    OPCode::IStore0 | OPCode::AStore0 => 0,
                    OPCode::IStore1 | OPCode::AStore1 => 1,
                    OPCode::IStore2 | OPCode::AStore2 => 2,
                    _ => 3,
                };
                let value = frame.pop().map_err(err)?;
                frame.set_local(slot, value).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::IInc => {
                let index = usize::from(u8_operand(1).map_err(err)?);
                let delta = i32::from(u8_operand(2).map_err(err)? as i8);
                let value = frame.local(index).map_err(err)?;
                frame
                    .set_local(index, value.wrapping_add(delta))
                    .map_err(err)?;
                frame.pc = pc + 3;
                Action::Continue
            }
            OPCode::IfEq
            | OPCode::IfNe
            | OPCode::IfLt
            | OPCode::IfGe
            | OPCode::IfGt
            | OPCode::IfLe => {
                let offset = i16_operand().map_err(err)?;
                let value = frame.pop().map_err(err)?;
                let taken = match opcode {
                    OPCode::IfEq => value == 0,
                    OPCode::IfNe => value != 0,
                    OPCode::IfLt => value < 0,
                    OPCode::IfGe => value >= 0,
                    OPCode::IfGt => value > 0,
                    _ => value <= 0,
                };
                frame.pc = if taken {
                    branch_target(pc, offset, method.code.len()).map_err(err)?
                } else {
                    pc + 3
                };
                Action::Continue
            }
            OPCode::IfICmpEq
            | OPCode::IfICmpNe
            | OPCode::IfICmpLt
            | OPCode::IfICmpGe
            | OPCode::IfICmpGt
            | OPCode::IfICmpLe => {
                let offset = i16_operand().map_err(err)?;
                let rhs = frame.pop().map_err(err)?;
                let lhs = frame.pop().map_err(err)?;
                let taken = match opcode {
                    OPCode::IfICmpEq => lhs == rhs,
                    OPCode::IfICmpNe => lhs != rhs,
                    OPCode::IfICmpLt => lhs < rhs,
                    OPCode::IfICmpGe => lhs >= rhs,
                    OPCode::IfICmpGt => lhs > rhs,
                    _ => lhs <= rhs,
                };
                frame.pc = if taken {
                    branch_target(pc, offset, method.code.len()).map_err(err)?
                } else {
                    pc + 3
                };
                Action::Continue
            }
            OPCode::Goto => {
                let offset = i16_operand().map_err(err)?;
                // Offsets are relative to the branch opcode itself.
                frame.pc =
                    branch_target(pc, offset, method.code.len()).map_err(err)?;
                Action::Continue
            }
            OPCode::Dup => {
                let top = *frame
                    .stack
                    .last()
                    .ok_or_else(|| err(RuntimeErrorKind::StackUnderflow))?;
                frame.push(top).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            // Placeholder that exists solely to precede the print
            // shortcut; skip the 2-byte field reference.
            OPCode::GetStatic => {
                frame.pc = pc + 3;
                Action::Continue
            }
            // Stand-in for `PrintStream.println(int)`: pops the top of
            // stack and prints it as a decimal line, no real dispatch.
            OPCode::InvokeVirtual => {
                let value = frame.pop().map_err(err)?;
                writeln!(out, "{value}")
                    .map_err(|e| err(RuntimeErrorKind::Io(e.to_string())))?;
                frame.pc = pc + 3;
                Action::Continue
            }
            OPCode::InvokeStatic => {
                let method_ref = (u16::from(u8_operand(1).map_err(err)?) << 8)
                    | u16::from(u8_operand(2).map_err(err)?);
                let target_index = self
                    .program
                    .find_method(method_ref)
                    .ok_or_else(|| err(RuntimeErrorKind::UnresolvedMethod(method_ref)))?;
                let target = &self.program.methods[target_index];
                let num_args = target.num_args();
                // Zero-initialized callee locals; arguments are popped in
                // reverse so they land at 0..num_args in declaration
                // order. Sizing by num_args too guards a malformed
                // max_locals smaller than the parameter count.
                let mut locals =
                    vec![0i32; (target.max_locals as usize).max(num_args)];
                for slot in (0..num_args).rev() {
                    locals[slot] = frame.pop().map_err(err)?;
                }
                frame.pc = pc + 3;
                debug!("invokestatic `{}` ({} args)", target.name, num_args);
                Action::PushFrame(Frame::new(
                    target_index,
                    target.max_stack as usize,
                    locals,
                ))
            }
            OPCode::Return => Action::PopFrame(None),
            OPCode::IReturn | OPCode::AReturn => {
                Action::PopFrame(Some(frame.pop().map_err(err)?))
            }
            OPCode::NewArray => {
                let length = frame.pop().map_err(err)?;
                if length < 0 {
                    return Err(err(RuntimeErrorKind::NegativeArraySize(length)));
                }
                let reference = self.heap.allocate(length as usize);
                frame.push(reference).map_err(err)?;
                // Skip the atype operand byte, all arrays hold ints here.
                frame.pc = pc + 2;
                Action::Continue
            }
            OPCode::ArrayLength => {
                let reference = frame.pop().map_err(err)?;
                let array = self
                    .heap
                    .array(reference)
                    .ok_or_else(|| err(RuntimeErrorKind::InvalidReference(reference)))?;
                frame.push(array[0]).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::IAStore => {
                let value = frame.pop().map_err(err)?;
                let index = frame.pop().map_err(err)?;
                let reference = frame.pop().map_err(err)?;
                let array = self
                    .heap
                    .array_mut(reference)
                    .ok_or_else(|| err(RuntimeErrorKind::InvalidReference(reference)))?;
                let length = array[0];
                if index < 0 || index >= length {
                    return Err(err(RuntimeErrorKind::ArrayIndexOutOfBounds {
                        index,
                        length,
                    }));
                }
                // Slot 0 holds the length, elements start at slot 1.
                array[(index + 1) as usize] = value;
                frame.pc = pc + 1;
                Action::Continue
            }
            OPCode::IALoad => {
                let index = frame.pop().map_err(err)?;
                let reference = frame.pop().map_err(err)?;
                let array = self
                    .heap
                    .array(reference)
                    .ok_or_else(|| err(RuntimeErrorKind::InvalidReference(reference)))?;
                let length = array[0];
                if index < 0 || index >= length {
                    return Err(err(RuntimeErrorKind::ArrayIndexOutOfBounds {
                        index,
                        length,
                    }));
                }
                let value = array[(index + 1) as usize];
                frame.push(value).map_err(err)?;
                frame.pc = pc + 1;
                Action::Continue
            }
            // The original interpreter skipped unrecognized opcodes
            // without advancing the program counter; here they are a
            // reported error.
            OPCode::Unknown(byte) => {
                return Err(err(RuntimeErrorKind::UnknownOpcode(byte)))
            }
        };

        match action {
            Action::Continue => {}
            Action::PushFrame(callee) => self.frames.push(callee),
            Action::PopFrame(value) => {
                self.frames.pop();
                if let Some(value) = value {
                    match self.frames.last_mut() {
                        Some(caller) => caller.push(value).map_err(err)?,
                        None => {
                            return Err(err(
                                RuntimeErrorKind::EntryPointReturnedValue,
                            ))
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Resolves a signed 16-bit branch offset relative to the address of the
/// branch opcode. A target exactly at `code_len` terminates the frame
/// through the implicit-void path.
fn branch_target(
    pc: usize,
    offset: i16,
    code_len: usize,
) -> std::result::Result<usize, RuntimeErrorKind> {
    let target = pc as i64 + i64::from(offset);
    if target < 0 || target > code_len as i64 {
        return Err(RuntimeErrorKind::InvalidBranchTarget(target));
    }
    Ok(target as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::jvm::CPInfo;
    use crate::program::{Method, Program, MAIN_DESCRIPTOR};

    fn method(
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) -> Method {
        let (arg_types, return_type) =
            crate::program::parse_method_types(descriptor).unwrap();
        Method {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            arg_types,
            return_type,
            max_stack,
            max_locals,
            code,
        }
    }

    fn main_method(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Method {
        method("main", MAIN_DESCRIPTOR, max_stack, max_locals, code)
    }

    // Pool with one Methodref (at index 4) pointing at `name`/`descriptor`.
    fn pool_with_methodref(name: &str, descriptor: &str) -> Vec<CPInfo> {
        vec![
            CPInfo::Unsupported { tag: 0 },
            CPInfo::ConstantUtf8 {
                bytes: name.to_string(),
            },
            CPInfo::ConstantUtf8 {
                bytes: descriptor.to_string(),
            },
            CPInfo::ConstantNameAndType {
                name_index: 1,
                descriptor_index: 2,
            },
            CPInfo::ConstantMethodRef {
                class_index: 0,
                name_and_type_index: 3,
            },
        ]
    }

    fn run(program: Program) -> Result<String> {
        let mut out = Vec::new();
        Runtime::new(program)?.run(&mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn run_main(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Result<String> {
        run(Program {
            constant_pool: Vec::new(),
            methods: vec![main_method(max_stack, max_locals, code)],
        })
    }

    #[test]
    fn prints_two_plus_three() {
        // iconst_2, iconst_3, iadd, getstatic, invokevirtual, return.
        let output = run_main(
            2,
            1,
            vec![0x05, 0x06, 0x60, 0xb2, 0x00, 0x00, 0xb6, 0x00, 0x00, 0xb1],
        )
        .unwrap();
        assert_eq!(output, "5\n");
    }

    #[test]
    fn iadd_wraps_around() {
        // ldc MAX, iconst_1, iadd, print.
        let program = Program {
            constant_pool: vec![
                CPInfo::Unsupported { tag: 0 },
                CPInfo::ConstantInteger { bytes: i32::MAX },
            ],
            methods: vec![main_method(
                2,
                1,
                vec![0x12, 0x01, 0x04, 0x60, 0xb6, 0x00, 0x00, 0xb1],
            )],
        };
        assert_eq!(run(program).unwrap(), "-2147483648\n");
    }

    #[test]
    fn idiv_truncates_toward_zero() {
        // bipush -7, iconst_2, idiv, print.
        let output =
            run_main(2, 1, vec![0x10, 0xf9, 0x05, 0x6c, 0xb6, 0x00, 0x00, 0xb1])
                .unwrap();
        assert_eq!(output, "-3\n");
    }

    #[test]
    fn irem_follows_dividend_sign() {
        // bipush -7, iconst_2, irem, print.
        let output =
            run_main(2, 1, vec![0x10, 0xf9, 0x05, 0x70, 0xb6, 0x00, 0x00, 0xb1])
                .unwrap();
        assert_eq!(output, "-1\n");
    }

    #[test]
    fn iushr_treats_value_as_unsigned() {
        // iconst_m1, iconst_1, iushr, print.
        let output =
            run_main(2, 1, vec![0x02, 0x04, 0x7c, 0xb6, 0x00, 0x00, 0xb1]).unwrap();
        assert_eq!(output, "2147483647\n");
    }

    #[test]
    fn dup_duplicates_top_of_stack() {
        // bipush 9, dup, imul, print.
        let output =
            run_main(2, 1, vec![0x10, 0x09, 0x59, 0x68, 0xb6, 0x00, 0x00, 0xb1])
                .unwrap();
        assert_eq!(output, "81\n");
    }

    #[test]
    fn sipush_sign_extends() {
        // sipush -300, print.
        let output =
            run_main(1, 1, vec![0x11, 0xfe, 0xd4, 0xb6, 0x00, 0x00, 0xb1]).unwrap();
        assert_eq!(output, "-300\n");
    }

    #[test]
    fn branch_offsets_are_relative_to_the_branch_opcode() {
        // A goto at offset 10 with operand -3 must continue at pc 7.
        //  0: bipush 0
        //  2: goto +8        -> 10
        //  5: (junk, never executed)
        //  7: return         <- target of the backward goto
        //  8: (junk)
        // 10: goto -3        -> 7
        let output = run_main(
            1,
            1,
            vec![
                0x10, 0x00, // 0: bipush 0
                0xa7, 0x00, 0x08, // 2: goto +8
                0xfd, 0xfd, // 5: junk
                0xb1, // 7: return
                0xfd, 0xfd, // 8: junk
                0xa7, 0xff, 0xfd, // 10: goto -3
            ],
        )
        .unwrap();
        assert_eq!(output, "");
    }

    #[test]
    fn countdown_loop_with_ifeq_and_iinc() {
        // i = 3; while (i != 0) { print(i); i += -1; }
        let output = run_main(
            2,
            1,
            vec![
                0x06, // 0: iconst_3
                0x3b, // 1: istore_0
                0x1a, // 2: iload_0
                0x99, 0x00, 0x0d, // 3: ifeq +13 -> 16
                0x1a, // 6: iload_0
                0xb6, 0x00, 0x00, // 7: invokevirtual (print)
                0x84, 0x00, 0xff, // 10: iinc 0, -1
                0xa7, 0xff, 0xf5, // 13: goto -11 -> 2
                0xb1, // 16: return
            ],
        )
        .unwrap();
        assert_eq!(output, "3\n2\n1\n");
    }

    #[test]
    fn invokestatic_places_arguments_in_declaration_order() {
        // digits(a, b, c) returns a*100 + b*10 + c plus two locals the
        // caller never filled, proving they were zero-initialized.
        let digits = method(
            "digits",
            "(III)I",
            3,
            5,
            vec![
                0x1a, // iload_0
                0x10, 0x64, // bipush 100
                0x68, // imul
                0x1b, // iload_1
                0x10, 0x0a, // bipush 10
                0x68, // imul
                0x60, // iadd
                0x1c, // iload_2
                0x60, // iadd
                0x1d, // iload_3 (zeroed)
                0x60, // iadd
                0x15, 0x04, // iload 4 (zeroed)
                0x60, // iadd
                0xac, // ireturn
            ],
        );
        // main: iconst_1, iconst_2, iconst_3, invokestatic #4, print.
        let main = main_method(
            3,
            1,
            vec![0x04, 0x05, 0x06, 0xb8, 0x00, 0x04, 0xb6, 0x00, 0x00, 0xb1],
        );
        let program = Program {
            constant_pool: pool_with_methodref("digits", "(III)I"),
            methods: vec![main, digits],
        };
        assert_eq!(run(program).unwrap(), "123\n");
    }

    #[test]
    fn recursive_factorial_returns_120() {
        let fact = method(
            "fact",
            "(I)I",
            3,
            1,
            vec![
                0x1a, // 0: iload_0
                0x9d, 0x00, 0x05, // 1: ifgt +5 -> 6
                0x04, // 4: iconst_1
                0xac, // 5: ireturn
                0x1a, // 6: iload_0
                0x1a, // 7: iload_0
                0x04, // 8: iconst_1
                0x64, // 9: isub
                0xb8, 0x00, 0x04, // 10: invokestatic #4
                0x68, // 13: imul
                0xac, // 14: ireturn
            ],
        );
        // main: bipush 5, invokestatic #4, print.
        let main = main_method(
            1,
            1,
            vec![0x10, 0x05, 0xb8, 0x00, 0x04, 0xb6, 0x00, 0x00, 0xb1],
        );
        let program = Program {
            constant_pool: pool_with_methodref("fact", "(I)I"),
            methods: vec![main, fact],
        };
        assert_eq!(run(program).unwrap(), "120\n");
    }

    #[test]
    fn array_round_trip() {
        // int[] a = new int[3]; a[0]=10; a[1]=20; a[2]=30;
        // print(a[0]); print(a[1]); print(a[2]); print(a.length);
        let output = run_main(
            3,
            1,
            vec![
                0x06, // iconst_3
                0xbc, 0x0a, // newarray int
                0x4b, // astore_0
                0x2a, 0x03, 0x10, 0x0a, 0x4f, // a[0] = 10
                0x2a, 0x04, 0x10, 0x14, 0x4f, // a[1] = 20
                0x2a, 0x05, 0x10, 0x1e, 0x4f, // a[2] = 30
                0x2a, 0x03, 0x2e, 0xb6, 0x00, 0x00, // print a[0]
                0x2a, 0x04, 0x2e, 0xb6, 0x00, 0x00, // print a[1]
                0x2a, 0x05, 0x2e, 0xb6, 0x00, 0x00, // print a[2]
                0x2a, 0xbe, 0xb6, 0x00, 0x00, // print a.length
                0xb1, // return
            ],
        )
        .unwrap();
        assert_eq!(output, "10\n20\n30\n3\n");
    }

    #[test]
    fn array_store_out_of_bounds_is_reported() {
        // iconst_1, newarray, astore_0, aload_0, iconst_2, iconst_0, iastore.
        let result = run_main(
            3,
            1,
            vec![0x04, 0xbc, 0x0a, 0x4b, 0x2a, 0x05, 0x03, 0x4f, 0xb1],
        );
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::ArrayIndexOutOfBounds {
                index: 2,
                length: 1
            }
        );
    }

    #[test]
    fn bytecode_exhaustion_is_an_implicit_void_return() {
        // A lone iconst_0 with no return instruction.
        assert_eq!(run_main(1, 1, vec![0x03]).unwrap(), "");
    }

    #[test]
    fn void_callee_falling_off_its_bytecode_returns_to_caller() {
        let helper = method("helper", "()V", 1, 1, vec![0x00]); // nop only
        let main = main_method(
            1,
            1,
            vec![0xb8, 0x00, 0x04, 0x08, 0xb6, 0x00, 0x00, 0xb1],
        );
        let program = Program {
            constant_pool: pool_with_methodref("helper", "()V"),
            methods: vec![main, helper],
        };
        assert_eq!(run(program).unwrap(), "5\n");
    }

    #[test]
    fn division_by_zero_is_reported() {
        let result = run_main(2, 1, vec![0x04, 0x03, 0x6c, 0xb1]);
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::DivisionByZero
        );
    }

    #[test]
    fn oversized_shift_amount_is_reported() {
        // iconst_1, bipush 32, ishl.
        let result = run_main(2, 1, vec![0x04, 0x10, 0x20, 0x78, 0xb1]);
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::ShiftOutOfRange(32)
        );
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let result = run_main(1, 1, vec![0xfd]);
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::UnknownOpcode(0xfd)
        );
    }

    #[test]
    fn stack_underflow_is_reported() {
        let result = run_main(2, 1, vec![0x60, 0xb1]);
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::StackUnderflow
        );
    }

    #[test]
    fn stack_overflow_is_reported() {
        // max_stack of 1 cannot hold two constants.
        let result = run_main(1, 1, vec![0x03, 0x03, 0xb1]);
        assert_eq!(result.unwrap_err().kind(), &RuntimeErrorKind::StackOverflow);
    }

    #[test]
    fn entry_point_must_return_void() {
        // iconst_1, ireturn inside main.
        let result = run_main(1, 1, vec![0x04, 0xac]);
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::EntryPointReturnedValue
        );
    }

    #[test]
    fn missing_entry_point_is_a_startup_error() {
        let program = Program {
            constant_pool: Vec::new(),
            methods: vec![method("helper", "()V", 1, 1, vec![0xb1])],
        };
        let Err(error) = Runtime::new(program) else {
            panic!("expected startup error");
        };
        assert_eq!(error.kind(), &RuntimeErrorKind::MissingEntryPoint);
    }

    #[test]
    fn unresolved_method_reference_is_reported() {
        // invokestatic against an empty constant pool.
        let result = run_main(1, 1, vec![0xb8, 0x00, 0x01, 0xb1]);
        assert_eq!(
            result.unwrap_err().kind(),
            &RuntimeErrorKind::UnresolvedMethod(1)
        );
    }
}
