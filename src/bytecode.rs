//! Opcode definitions for the supported subset of JVM bytecode.

/// `OPCode` enumerates the instructions the interpreter understands.
/// Anything outside the supported subset decodes to `Unknown` and is
/// reported as a runtime error during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OPCode {
    Nop,
    IconstM1,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    BiPush,
    SiPush,
    Ldc,
    ILoad,
    ALoad,
    ILoad0,
    ILoad1,
    ILoad2,
    ILoad3,
    ALoad0,
    ALoad1,
    ALoad2,
    ALoad3,
    IALoad,
    IStore,
    AStore,
    IStore0,
    IStore1,
    IStore2,
    IStore3,
    AStore0,
    AStore1,
    AStore2,
    AStore3,
    IAStore,
    Dup,
    IAdd,
    ISub,
    IMul,
    IDiv,
    IRem,
    INeg,
    IShl,
    IShr,
    IUShr,
    IAnd,
    IOr,
    IXor,
    IInc,
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfICmpEq,
    IfICmpNe,
    IfICmpLt,
    IfICmpGe,
    IfICmpGt,
    IfICmpLe,
    Goto,
    IReturn,
    AReturn,
    Return,
    GetStatic,
    InvokeVirtual,
    InvokeStatic,
    NewArray,
    ArrayLength,
    Unknown(u8),
}

impl From<u8> for OPCode {
    fn from(opcode: u8) -> Self {
        match opcode {
            0x00 => Self::Nop,
            0x02 => Self::IconstM1,
            0x03 => Self::Iconst0,
            0x04 => Self::Iconst1,
            0x05 => Self::Iconst2,
            0x06 => Self::Iconst3,
            0x07 => Self::Iconst4,
            0x08 => Self::Iconst5,
            0x10 => Self::BiPush,
            0x11 => Self::SiPush,
            0x12 => Self::Ldc,
            0x15 => Self::ILoad,
            0x19 => Self::ALoad,
            0x1a => Self::ILoad0,
            0x1b => Self::ILoad1,
            0x1c => Self::ILoad2,
            0x1d => Self::ILoad3,
            0x2a => Self::ALoad0,
            0x2b => Self::ALoad1,
            0x2c => Self::ALoad2,
            0x2d => Self::ALoad3,
            0x2e => Self::IALoad,
            0x36 => Self::IStore,
            0x3a => Self::AStore,
            0x3b => Self::IStore0,
            0x3c => Self::IStore1,
            0x3d => Self::IStore2,
            0x3e => Self::IStore3,
            0x4b => Self::AStore0,
            0x4c => Self::AStore1,
            0x4d => Self::AStore2,
            0x4e => Self::AStore3,
            0x4f => Self::IAStore,
            0x59 => Self::Dup,
            0x60 => Self::IAdd,
            0x64 => Self::ISub,
            0x68 => Self::IMul,
            0x6c => Self::IDiv,
            0x70 => Self::IRem,
            0x74 => Self::INeg,
            0x78 => Self::IShl,
            0x7a => Self::IShr,
            0x7c => Self::IUShr,
            0x7e => Self::IAnd,
            0x80 => Self::IOr,
            0x82 => Self::IXor,
            0x84 => Self::IInc,
            0x99 => Self::IfEq,
            0x9a => Self::IfNe,
            0x9b => Self::IfLt,
            0x9c => Self::IfGe,
            0x9d => Self::IfGt,
            0x9e => Self::IfLe,
            0x9f => Self::IfICmpEq,
            0xa0 => Self::IfICmpNe,
            0xa1 => Self::IfICmpLt,
            0xa2 => Self::IfICmpGe,
            0xa3 => Self::IfICmpGt,
            0xa4 => Self::IfICmpLe,
            0xa7 => Self::Goto,
            0xac => Self::IReturn,
            0xb0 => Self::AReturn,
            0xb1 => Self::Return,
            0xb2 => Self::GetStatic,
            0xb6 => Self::InvokeVirtual,
            0xb8 => Self::InvokeStatic,
            0xbc => Self::NewArray,
            0xbe => Self::ArrayLength,
            _ => Self::Unknown(opcode),
        }
    }
}
