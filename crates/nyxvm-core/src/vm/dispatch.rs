//! Instruction dispatch: fetch the current [`Inst`] and route it to its
//! handler.

use crate::gc::Heap;
use crate::strings::StringPool;
use crate::value::Value;
use crate::vm::call;
use crate::vm::iter::VmIter;
use crate::vm::opcode::{Dispatch, Imm, InstPtr, Op};
use crate::vm::{Cursor, Vm};

/// Execute the instruction at `cursor.ins` and report what the driver loop
/// should do next. Never advances `cursor.ins` itself for a non-jumping
/// result: `Vm::run` does that uniformly on `Dispatch::Next`.
pub fn step(
    vm: &mut Vm,
    heap: &mut Heap,
    strings: &mut StringPool,
    alloc_hook: &mut dyn FnMut(usize, usize) -> bool,
    cursor: &mut Cursor,
) -> Dispatch {
    let Some(chunk) = vm.chunks.get(cursor.ins.chunk) else {
        return Dispatch::Halt;
    };
    let Some(inst) = chunk.get(cursor.ins.pc).copied() else {
        return Dispatch::Halt;
    };

    match inst.op {
        Op::Jf => match inst.imm {
            Imm::U32(imm) => Dispatch::Jump(InstPtr::new(cursor.ins.chunk, cursor.ins.pc + imm.a as usize)),
            _ => Dispatch::Halt,
        },
        Op::Jb => match inst.imm {
            Imm::U32(imm) => Dispatch::Jump(InstPtr::new(cursor.ins.chunk, cursor.ins.pc - imm.a as usize)),
            _ => Dispatch::Halt,
        },
        Op::LeafCall => match &inst.imm {
            Imm::LeafCall(imm) => call::op_leafcall(vm, cursor, imm),
            _ => Dispatch::Halt,
        },
        Op::Callc => match &inst.imm {
            Imm::CCall(imm) => call::op_callc(vm, cursor, imm),
            _ => Dispatch::Halt,
        },
        Op::Callcv => match &inst.imm {
            Imm::CCallVariadic(imm) => call::op_callcv(vm, cursor, imm),
            _ => Dispatch::Halt,
        },
        Op::Callg => match &inst.imm {
            Imm::GCall(imm) => call::op_callg(vm, cursor, imm, alloc_hook),
            _ => Dispatch::Halt,
        },
        Op::CallAny => match &inst.imm {
            Imm::U32x3(imm) => call::op_callany(vm, heap, cursor, imm, alloc_hook),
            _ => Dispatch::Halt,
        },
        Op::Ret => match inst.imm {
            Imm::U32(imm) => call::op_ret(vm, cursor, imm.a as usize),
            _ => Dispatch::Halt,
        },
        Op::Retv => match inst.imm {
            Imm::U32x2(imm) => call::op_retv(vm, cursor, imm.a as usize, imm.b as usize),
            _ => Dispatch::Halt,
        },
        Op::Iter1Ui => match inst.imm {
            Imm::IterUi(imm) => {
                let (it, first, cont) = VmIter::new_uint(imm.start, imm.end, imm.step);
                vm.iterstack.push(it);
                vm.stack.values[cursor.sbase + imm.dest] = first;
                vm.stack.values[cursor.sbase + imm.dest + 1] = Value::bool_(cont);
                Dispatch::Next
            }
            _ => Dispatch::Halt,
        },
        Op::Iter1F => match inst.imm {
            Imm::IterF(imm) => {
                let (it, first, cont) = VmIter::new_float(imm.start, imm.end, imm.step);
                vm.iterstack.push(it);
                vm.stack.values[cursor.sbase + imm.dest] = first;
                vm.stack.values[cursor.sbase + imm.dest + 1] = Value::bool_(cont);
                Dispatch::Next
            }
            _ => Dispatch::Halt,
        },
        Op::IterNext => match inst.imm {
            Imm::U32x3(imm) => {
                let base = cursor.sbase + imm.a as usize;
                let n = imm.b as usize;
                let cond_slot = cursor.sbase + imm.c as usize;
                let mut vals = vm.stack.values[base..base + n].to_vec();
                let cont = vm.iterstack.advance_all(n, &mut vals);
                vm.stack.values[base..base + n].copy_from_slice(&vals);
                vm.stack.values[cond_slot] = Value::bool_(cont);
                Dispatch::Next
            }
            _ => Dispatch::Halt,
        },
        Op::IterPop => match inst.imm {
            Imm::U32(imm) => {
                vm.iterstack.pop_n(imm.a as usize);
                Dispatch::Next
            }
            _ => Dispatch::Halt,
        },
        Op::LoadKUi32 => match inst.imm {
            Imm::U32x2(imm) => {
                vm.stack.values[cursor.sbase + imm.a as usize] = Value::uint(imm.b as u64);
                Dispatch::Next
            }
            _ => Dispatch::Halt,
        },
        Op::AddUi => match inst.imm {
            Imm::U32x3(imm) => {
                let lhs = vm.stack.values[cursor.sbase + imm.b as usize].as_uint();
                let rhs = vm.stack.values[cursor.sbase + imm.c as usize].as_uint();
                match (lhs, rhs) {
                    (Some(l), Some(r)) => match l.checked_add(r) {
                        Some(sum) => {
                            vm.stack.values[cursor.sbase + imm.a as usize] = Value::uint(sum);
                            Dispatch::Next
                        }
                        None => Dispatch::Fail(crate::error::VmError::Overflow),
                    },
                    _ => Dispatch::Fail(crate::error::VmError::ValueCast),
                }
            }
            _ => Dispatch::Halt,
        },
        Op::SimpleNext => match inst.imm {
            Imm::U32x3(imm) => {
                let counter_slot = cursor.sbase + imm.a as usize;
                let bound_slot = cursor.sbase + imm.b as usize;
                let Some(counter) = vm.stack.values[counter_slot].as_uint() else {
                    return Dispatch::Fail(crate::error::VmError::ValueCast);
                };
                let Some(bound) = vm.stack.values[bound_slot].as_uint() else {
                    return Dispatch::Fail(crate::error::VmError::ValueCast);
                };
                let next = counter.wrapping_add(1);
                vm.stack.values[counter_slot] = Value::uint(next);
                if next < bound {
                    Dispatch::Jump(InstPtr::new(cursor.ins.chunk, imm.c as usize))
                } else {
                    Dispatch::Next
                }
            }
            _ => Dispatch::Halt,
        },
        Op::Halt => Dispatch::Halt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::GcPayload;
    use crate::symtable::SymTable;
    use crate::vm::opcode::{Chunk, Imm2xU32, Imm3xU32, Inst};

    fn fresh_vm() -> (Vm, Heap, StringPool) {
        let mut heap = Heap::new();
        let env = heap.alloc(true, GcPayload::SymTable(SymTable::new()));
        (Vm::new(env, 32), heap, StringPool::new())
    }

    #[test]
    fn loadkui32_then_addui_then_halt() {
        let (mut vm, mut heap, mut strings) = fresh_vm();
        let chunk = Chunk::new(vec![
            Inst::new(Op::LoadKUi32, Imm::U32x2(Imm2xU32 { a: 0, b: 7 })),
            Inst::new(Op::LoadKUi32, Imm::U32x2(Imm2xU32 { a: 1, b: 35 })),
            Inst::new(Op::AddUi, Imm::U32x3(Imm3xU32 { a: 2, b: 0, c: 1 })),
            Inst::new(Op::Halt, Imm::None),
        ]);
        vm.load_chunk(chunk);
        vm.start(0, 0, 0, 3);
        let mut hook = |_old: usize, _new: usize| true;
        vm.run(&mut heap, &mut strings, &mut hook).unwrap();
        assert!(vm.is_dead());
        assert_eq!(vm.stack.values[2].as_uint(), Some(42));
    }

    #[test]
    fn simplenext_loops_until_bound() {
        let (mut vm, mut heap, mut strings) = fresh_vm();
        // slot 0: counter (starts at 0), slot 1: bound (5). pc 2 jumps back
        // to itself until the counter reaches the bound.
        let chunk = Chunk::new(vec![
            Inst::new(Op::LoadKUi32, Imm::U32x2(Imm2xU32 { a: 0, b: 0 })),
            Inst::new(Op::LoadKUi32, Imm::U32x2(Imm2xU32 { a: 1, b: 5 })),
            Inst::new(Op::SimpleNext, Imm::U32x3(Imm3xU32 { a: 0, b: 1, c: 2 })),
            Inst::new(Op::Halt, Imm::None),
        ]);
        vm.load_chunk(chunk);
        vm.start(0, 0, 0, 2);
        let mut hook = |_old: usize, _new: usize| true;
        vm.run(&mut heap, &mut strings, &mut hook).unwrap();
        assert!(vm.is_dead());
        assert_eq!(vm.stack.values[0].as_uint(), Some(5));
    }

    #[test]
    fn unknown_chunk_halts_defensively() {
        let (mut vm, mut heap, mut strings) = fresh_vm();
        vm.start(0, 0, 0, 0);
        let mut hook = |_old: usize, _new: usize| true;
        vm.run(&mut heap, &mut strings, &mut hook).unwrap();
        assert!(vm.is_dead());

        let mut cursor = Cursor { ins: InstPtr::new(9, 0), sbase: 0, sp: 0 };
        let d = step(&mut vm, &mut heap, &mut strings, &mut hook, &mut cursor);
        assert!(matches!(d, Dispatch::Halt));
    }
}
