//! Instruction encoding: a chunk is a flat vector of [`Inst`], each an
//! opcode function plus its immediate operand. The compiler that would
//! produce chunks is out of scope here; this module only models the shape
//! the execution core consumes.

use crate::error::VmError;
use crate::gc::{BytecodeFunc, NativeFn};

/// Position within the chunk table: which chunk, which instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstPtr {
    pub chunk: usize,
    pub pc: usize,
}

impl InstPtr {
    pub fn new(chunk: usize, pc: usize) -> Self {
        InstPtr { chunk, pc }
    }

    pub fn advance(self, n: usize) -> Self {
        InstPtr { chunk: self.chunk, pc: self.pc + n }
    }
}

/// What an opcode handler hands back to the dispatch loop: jump to a pc,
/// signal a function return, yield to the host, halt, or fail with an
/// error code. The driver loop stays flat and iterative rather than
/// recursing through handlers, so it never accumulates a deepening native
/// call chain on backward jumps or repeated calls.
#[derive(Debug, Clone, Copy)]
pub enum Dispatch {
    Next,
    Jump(InstPtr),
    Yield,
    Fail(VmError),
    Halt,
}

#[derive(Debug, Clone, Copy)]
pub struct ImmNone;

#[derive(Debug, Clone, Copy)]
pub struct ImmU32 {
    pub a: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Imm2xU32 {
    pub a: u32,
    pub b: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Imm3xU32 {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Imm4xU32 {
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
}

/// Call-immediate records, carrying a callable in addition to plain index
/// operands (the "specialised call-immediate records" of the wire format).
#[derive(Debug, Clone, Copy)]
pub struct ImmLeafCall {
    pub f: NativeFn,
    pub base_offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ImmCCall {
    pub f: NativeFn,
    pub base_offset: usize,
    pub nargs: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ImmCCallVariadic {
    pub f: NativeFn,
    pub base_offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ImmGCall {
    pub entry: BytecodeFunc,
    pub base_offset: usize,
}

/// `iter1_ui`: push a numeric iterator and write its first value into
/// `dest`. `step`'s sign picks forward/backward advance.
#[derive(Debug, Clone, Copy)]
pub struct ImmIterUi {
    pub dest: usize,
    pub start: u64,
    pub end: u64,
    pub step: i64,
}

/// `iter1_f`: the floating-point counterpart of [`ImmIterUi`].
#[derive(Debug, Clone, Copy)]
pub struct ImmIterF {
    pub dest: usize,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// All immediate shapes a chunk instruction may carry.
#[derive(Debug, Clone, Copy)]
pub enum Imm {
    None,
    U32(ImmU32),
    U32x2(Imm2xU32),
    U32x3(Imm3xU32),
    U32x4(Imm4xU32),
    LeafCall(ImmLeafCall),
    CCall(ImmCCall),
    CCallVariadic(ImmCCallVariadic),
    GCall(ImmGCall),
    IterUi(ImmIterUi),
    IterF(ImmIterF),
}

/// One decoded instruction: which op to run, plus its operand.
#[derive(Debug, Clone, Copy)]
pub struct Inst {
    pub op: Op,
    pub imm: Imm,
}

impl Inst {
    pub fn new(op: Op, imm: Imm) -> Self {
        Inst { op, imm }
    }
}

/// Closed set of opcodes this execution core understands. A real compiler
/// would emit far more (arithmetic, table/field access, comparisons); those
/// live upstream, in a bytecode-compiler and operator-registration layer
/// this crate does not provide. What's modeled here is the call, jump,
/// iterator and return machinery, plus a minimal arithmetic/loop pair
/// (`AddUi`, `SimpleNext`) for exercising that machinery without a real
/// compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Jf,
    Jb,
    LeafCall,
    Callc,
    Callcv,
    Callg,
    CallAny,
    Ret,
    Retv,
    Iter1Ui,
    Iter1F,
    IterNext,
    IterPop,
    LoadKUi32,
    AddUi,
    SimpleNext,
    Halt,
}

/// A compiled unit: a flat instruction stream. `chunk.0.last()` is expected
/// to be `Op::Halt` — every chunk ends in an instruction that stops
/// dispatch rather than falling off the end.
#[derive(Debug, Clone, Default)]
pub struct Chunk(pub Vec<Inst>);

impl Chunk {
    pub fn new(insts: Vec<Inst>) -> Self {
        Chunk(insts)
    }

    pub fn get(&self, pc: usize) -> Option<&Inst> {
        self.0.get(pc)
    }
}
