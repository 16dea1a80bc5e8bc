//! Threaded bytecode VM: call protocol, stack reallocation, iterator stack,
//! error unwinding. Dispatch is a flat iterative driver loop rather than a
//! chain of tail calls, since Rust gives no sibling-call TCO guarantee.

pub mod call;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod iter;
pub mod opcode;

pub use opcode::{Chunk, Dispatch, Inst, InstPtr, Op};

use crate::alloc::MINSTACK;
use crate::error::VmError;
use crate::gc::GcId;
use crate::gc::Heap;
use crate::strings::StringPool;
use crate::vm::frame::Stack;
use crate::vm::iter::IterStack;

/// The mutable execution position the dispatch loop resumes from: current
/// instruction, current frame base, and current stack pointer.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub ins: InstPtr,
    pub sbase: usize,
    pub sp: usize,
}

/// One virtual machine: a value stack, a call stack, an iterator stack, and
/// the loaded chunks it can jump into. `env` is the symbol table this VM
/// resolves free identifiers against — a GC-managed heap object like any
/// other, pinned for the VM's lifetime.
pub struct Vm {
    pub stack: Stack,
    pub iterstack: IterStack,
    pub chunks: Vec<Chunk>,
    pub env: GcId,
    cur: Option<Cursor>,
    pub err: Option<VmError>,
}

impl Vm {
    pub fn new(env: GcId, initial_stack_slots: usize) -> Self {
        Vm {
            stack: Stack::new(initial_stack_slots.max(MINSTACK)),
            iterstack: IterStack::new(),
            chunks: Vec::new(),
            env,
            cur: None,
            err: None,
        }
    }

    pub fn load_chunk(&mut self, chunk: Chunk) -> usize {
        self.chunks.push(chunk);
        self.chunks.len() - 1
    }

    /// Point the VM at an entry instruction with a fresh top-level frame.
    pub fn start(&mut self, chunk: usize, pc: usize, sbase: usize, sp: usize) {
        self.cur = Some(Cursor { ins: InstPtr::new(chunk, pc), sbase, sp });
    }

    pub fn is_dead(&self) -> bool {
        self.cur.is_none()
    }

    /// Run until yield, halt, or an unrecoverable error; returns the error
    /// on the latter, `Ok(())` otherwise.
    pub fn run(
        &mut self,
        heap: &mut Heap,
        strings: &mut StringPool,
        alloc_hook: &mut dyn FnMut(usize, usize) -> bool,
    ) -> Result<(), VmError> {
        let Some(mut cursor) = self.cur else {
            return Err(VmError::DeadVm);
        };

        loop {
            self.err = None;
            let outcome = loop {
                let d = dispatch::step(self, heap, strings, alloc_hook, &mut cursor);
                match d {
                    Dispatch::Next => cursor.ins = cursor.ins.advance(1),
                    Dispatch::Jump(target) => cursor.ins = target,
                    other => break other,
                }
            };

            match outcome {
                Dispatch::Yield => {
                    self.cur = Some(cursor);
                    return Ok(());
                }
                Dispatch::Halt => {
                    self.cur = None;
                    return Ok(());
                }
                Dispatch::Fail(e) => {
                    self.err = Some(e);
                    match error::unwind_to_handler(&mut self.stack, strings, e) {
                        error::Unwind::Recovered { resume } => {
                            cursor.ins = resume;
                            continue;
                        }
                        error::Unwind::Unhandled => {
                            self.cur = Some(cursor);
                            return Err(e);
                        }
                    }
                }
                Dispatch::Next | Dispatch::Jump(_) => unreachable!("handled in inner loop"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::GcPayload;
    use crate::symtable::SymTable;

    fn test_env(heap: &mut Heap) -> GcId {
        heap.alloc(true, GcPayload::SymTable(SymTable::new()))
    }

    #[test]
    fn fresh_vm_is_not_dead_once_started() {
        let mut heap = Heap::new();
        let env = test_env(&mut heap);
        let mut vm = Vm::new(env, 16);
        assert!(vm.is_dead());
        vm.load_chunk(Chunk::new(vec![Inst::new(Op::Halt, opcode::Imm::None)]));
        vm.start(0, 0, 0, 0);
        assert!(!vm.is_dead());
    }

    #[test]
    fn halt_marks_vm_dead() {
        let mut heap = Heap::new();
        let mut strings = StringPool::new();
        let env = test_env(&mut heap);
        let mut vm = Vm::new(env, 16);
        vm.load_chunk(Chunk::new(vec![Inst::new(Op::Halt, opcode::Imm::None)]));
        vm.start(0, 0, 0, 0);
        let mut hook = |_old: usize, _new: usize| true;
        vm.run(&mut heap, &mut strings, &mut hook).unwrap();
        assert!(vm.is_dead());
    }
}
