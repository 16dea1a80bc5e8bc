//! The four call-opcode shapes (leaf, fixed-arity native, variadic native,
//! bytecode) plus dynamic dispatch through `callany`.
//!
//! Call-frame layout: `[ return-slots | args(+varargs) | locals | varrets ]`.
//! A callee's own `sbase` is simultaneously where its return values are
//! written and where its arguments were read from — the call opcode never
//! reserves a separate return-slot region ahead of the args; returning
//! simply treats whatever sits at the callee's `sbase` as the return value
//! once the callee is done.

use crate::error::VmError;
use crate::gc::{DFunc, Heap};
use crate::value::Value;
use crate::vm::frame::CallFrame;
use crate::vm::opcode::{Dispatch, ImmCCall, ImmCCallVariadic, ImmGCall, ImmLeafCall, Imm3xU32, InstPtr};
use crate::vm::Vm;
use crate::vm::Cursor;

/// Pop the call stack up to (and including) the nearest `Return` frame,
/// relocate the `nret` return values down to the caller's own `sbase`, and
/// restore the caller's `sbase`/`sp` into `cursor` before resuming there. An
/// empty call stack means this was the outermost frame's return: the
/// program is finished.
fn do_return(vm: &mut Vm, cursor: &mut Cursor, callee_sbase: usize, nret: usize) -> Dispatch {
    match vm.stack.pop_return() {
        Some(CallFrame::Return { sbase, resume, .. }) => {
            if callee_sbase != sbase {
                vm.stack.values.copy_within(callee_sbase..callee_sbase + nret, sbase);
            }
            cursor.sbase = sbase;
            cursor.sp = sbase + nret;
            Dispatch::Jump(resume)
        }
        _ => Dispatch::Halt,
    }
}

/// `ret`: `sbase[0..nret)` already holds the return values.
pub fn op_ret(vm: &mut Vm, cursor: &mut Cursor, nret: usize) -> Dispatch {
    let sbase = cursor.sbase;
    do_return(vm, cursor, sbase, nret)
}

/// `retv`: `n` regular returns at `sbase[0..n)`, then a `gap` of locals, then
/// variadic extras up to `sp`. Closes the gap so the extras sit right after
/// the `n` regular values before returning.
pub fn op_retv(vm: &mut Vm, cursor: &mut Cursor, n: usize, gap: usize) -> Dispatch {
    let sbase = cursor.sbase;
    let vn = (cursor.sp - cursor.sbase).saturating_sub(n + gap);
    if vn > 0 {
        let src = sbase + n + gap;
        let dst = sbase + n;
        vm.stack.values.copy_within(src..src + vn, dst);
    }
    do_return(vm, cursor, sbase, n + vn)
}

/// Leaf call: reads `sbase+offset..sp`, writes results back over the same
/// slots. Must not grow the stack (the caller already ensured headroom).
/// Does not touch `cursor.ins`: the driver loop advances the pc by one on
/// `Dispatch::Next` like any other non-jumping instruction.
pub fn op_leafcall(vm: &mut Vm, cursor: &Cursor, imm: &ImmLeafCall) -> Dispatch {
    let start = cursor.sbase + imm.base_offset;
    let args = vm.stack.values[start..cursor.sp].to_vec();
    match (imm.f)(&args) {
        Ok(results) => {
            for (i, v) in results.into_iter().enumerate() {
                vm.stack.values[start + i] = v;
            }
            Dispatch::Next
        }
        Err(e) => Dispatch::Fail(e),
    }
}

fn invoke_native(args: &[Value], f: crate::gc::NativeFn) -> Result<Vec<Value>, VmError> {
    f(args)
}

/// Fixed-arity C call: push a return frame, then invoke. The pushed resume
/// point is the instruction after this one, since a call never jumps on the
/// calling side — only `do_return` jumps, back into the caller.
pub fn op_callc(vm: &mut Vm, cursor: &mut Cursor, imm: &ImmCCall) -> Dispatch {
    vm.stack.push_return(cursor.sbase, cursor.sp, cursor.ins.advance(1));
    let new_sbase = cursor.sbase + imm.base_offset;
    let args = vm.stack.values[new_sbase..new_sbase + imm.nargs].to_vec();
    match invoke_native(&args, imm.f) {
        Ok(results) => {
            let nret = results.len();
            for (i, v) in results.into_iter().enumerate() {
                vm.stack.values[new_sbase + i] = v;
            }
            do_return(vm, cursor, new_sbase, nret)
        }
        Err(e) => Dispatch::Fail(e),
    }
}

/// Variadic C call: args span `new_sbase..sp`.
pub fn op_callcv(vm: &mut Vm, cursor: &mut Cursor, imm: &ImmCCallVariadic) -> Dispatch {
    vm.stack.push_return(cursor.sbase, cursor.sp, cursor.ins.advance(1));
    let new_sbase = cursor.sbase + imm.base_offset;
    debug_assert!(new_sbase <= cursor.sp);
    let args = vm.stack.values[new_sbase..cursor.sp].to_vec();
    match invoke_native(&args, imm.f) {
        Ok(results) => {
            let nret = results.len();
            for (i, v) in results.into_iter().enumerate() {
                vm.stack.values[new_sbase + i] = v;
            }
            do_return(vm, cursor, new_sbase, nret)
        }
        Err(e) => Dispatch::Fail(e),
    }
}

/// Bytecode call: reserve stack space for the callee then jump to its entry.
/// `makegap`/`nargs` support shifting args behind a return-slot gap for
/// dynamically dispatched calls (`callany`) where the callee's return arity
/// isn't known at the call site; a direct `callg` never needs a gap.
fn finish_gcall(
    vm: &mut Vm,
    cursor: &mut Cursor,
    alloc_hook: &mut dyn FnMut(usize, usize) -> bool,
    entry: InstPtr,
    max_stack: usize,
    new_sbase: usize,
    makegap: usize,
    nargs: usize,
) -> Dispatch {
    if let Err(e) = vm.stack.ensure(cursor.sp, max_stack, alloc_hook) {
        return Dispatch::Fail(e);
    }
    let mut sbase = new_sbase;

    if makegap > 0 {
        vm.stack.values.copy_within(sbase..sbase + nargs, sbase + makegap);
        sbase += makegap;
    }

    // The callee's own frame runs from its sbase up to sbase + max_stack;
    // its subsequent calls and variadic reads measure against that top, not
    // against whatever cursor.sp happened to be in the caller's frame.
    cursor.sbase = sbase;
    cursor.sp = sbase + max_stack;
    Dispatch::Jump(entry)
}

pub fn op_callg(
    vm: &mut Vm,
    cursor: &mut Cursor,
    imm: &ImmGCall,
    alloc_hook: &mut dyn FnMut(usize, usize) -> bool,
) -> Dispatch {
    vm.stack.push_return(cursor.sbase, cursor.sp, cursor.ins.advance(1));
    let new_sbase = cursor.sbase + imm.base_offset;
    let entry = InstPtr::new(imm.entry.chunk, 0);
    let max_stack = imm.entry.num_params as usize + imm.entry.num_locals as usize + imm.entry.num_varrets as usize;
    finish_gcall(vm, cursor, alloc_hook, entry, max_stack, new_sbase, 0, 0)
}

/// Dynamic call: the callee is a `Value` in a local slot, resolved through
/// the heap and dispatched to whichever of the three static shapes it is.
pub fn op_callany(
    vm: &mut Vm,
    heap: &Heap,
    cursor: &mut Cursor,
    imm: &Imm3xU32,
    alloc_hook: &mut dyn FnMut(usize, usize) -> bool,
) -> Dispatch {
    let f_slot = cursor.sbase + imm.a as usize;
    let fbase = cursor.sbase + imm.b as usize;
    debug_assert!(fbase <= cursor.sp);
    let nargs = if imm.c != 0 { imm.c as usize - 1 } else { cursor.sp - fbase };

    let Some(func_val) = vm.stack.values.get(f_slot).copied() else {
        return Dispatch::Fail(VmError::NotCallable);
    };
    let Some(gc_id) = func_val.as_gc_id() else {
        return Dispatch::Fail(VmError::NotCallable);
    };
    let Some(func) = heap.func(gc_id) else {
        return Dispatch::Fail(VmError::NotCallable);
    };

    match *func {
        DFunc::Leaf(f) => {
            let args = vm.stack.values[fbase..fbase + nargs].to_vec();
            match invoke_native(&args, f) {
                Ok(results) => {
                    for (i, v) in results.into_iter().enumerate() {
                        vm.stack.values[fbase + i] = v;
                    }
                    Dispatch::Next
                }
                Err(e) => Dispatch::Fail(e),
            }
        }
        DFunc::CFixed(f, arity) => {
            if nargs < arity as usize {
                return Dispatch::Fail(VmError::NotEnoughParams);
            }
            if nargs > arity as usize {
                return Dispatch::Fail(VmError::TooManyParams);
            }
            vm.stack.push_return(cursor.sbase, cursor.sp, cursor.ins.advance(1));
            let args = vm.stack.values[fbase..fbase + nargs].to_vec();
            match invoke_native(&args, f) {
                Ok(results) => {
                    let nret = results.len();
                    for (i, v) in results.into_iter().enumerate() {
                        vm.stack.values[fbase + i] = v;
                    }
                    do_return(vm, cursor, fbase, nret)
                }
                Err(e) => Dispatch::Fail(e),
            }
        }
        DFunc::CVariadic(f) => {
            vm.stack.push_return(cursor.sbase, cursor.sp, cursor.ins.advance(1));
            let args = vm.stack.values[fbase..fbase + nargs].to_vec();
            match invoke_native(&args, f) {
                Ok(results) => {
                    let nret = results.len();
                    for (i, v) in results.into_iter().enumerate() {
                        vm.stack.values[fbase + i] = v;
                    }
                    do_return(vm, cursor, fbase, nret)
                }
                Err(e) => Dispatch::Fail(e),
            }
        }
        DFunc::Bytecode(bf) => {
            if nargs < bf.num_params as usize {
                return Dispatch::Fail(VmError::NotEnoughParams);
            }
            vm.stack.push_return(cursor.sbase, cursor.sp, cursor.ins.advance(1));
            let entry = InstPtr::new(bf.chunk, 0);
            let max_stack = bf.num_params as usize + bf.num_locals as usize + bf.num_varrets as usize;
            finish_gcall(vm, cursor, alloc_hook, entry, max_stack, fbase, 0, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::GcPayload;
    use crate::symtable::SymTable;
    use crate::vm::opcode::{Chunk, Imm, Inst, Op};

    fn add_leaf(args: &[Value]) -> Result<Vec<Value>, VmError> {
        let a = args[0].as_sint().unwrap();
        let b = args[1].as_sint().unwrap();
        Ok(vec![Value::sint(a + b)])
    }

    #[test]
    fn leafcall_overwrites_args_with_result() {
        let mut heap = Heap::new();
        let env = heap.alloc(true, GcPayload::SymTable(SymTable::new()));
        let mut vm = Vm::new(env, 16);
        vm.load_chunk(Chunk::new(vec![Inst::new(Op::Halt, Imm::None)]));
        let cursor = Cursor { ins: InstPtr::new(0, 0), sbase: 0, sp: 2 };
        vm.stack.values[0] = Value::sint(3);
        vm.stack.values[1] = Value::sint(4);

        let imm = ImmLeafCall { f: add_leaf, base_offset: 0 };
        let d = op_leafcall(&mut vm, &cursor, &imm);
        assert!(matches!(d, Dispatch::Next));
        assert_eq!(vm.stack.values[0].as_sint(), Some(7));
    }

    #[test]
    fn callc_pushes_and_pops_return_frame() {
        let mut heap = Heap::new();
        let env = heap.alloc(true, GcPayload::SymTable(SymTable::new()));
        let mut vm = Vm::new(env, 16);
        let mut cursor = Cursor { ins: InstPtr::new(0, 5), sbase: 0, sp: 2 };
        vm.stack.values[0] = Value::sint(10);
        vm.stack.values[1] = Value::sint(20);

        let imm = ImmCCall { f: add_leaf, base_offset: 0, nargs: 2 };
        let d = op_callc(&mut vm, &mut cursor, &imm);
        match d {
            Dispatch::Jump(resume) => assert_eq!(resume, InstPtr::new(0, 6)),
            _ => panic!("expected a jump back to the resume point"),
        }
        assert_eq!(vm.stack.values[0].as_sint(), Some(30));
        assert!(vm.stack.callstack.is_empty());
    }

    #[test]
    fn ret_returns_to_caller_frame() {
        let mut heap = Heap::new();
        let env = heap.alloc(true, GcPayload::SymTable(SymTable::new()));
        let mut vm = Vm::new(env, 16);
        vm.stack.push_return(0, 2, InstPtr::new(0, 3));
        vm.stack.values[4] = Value::sint(99);
        let mut cursor = Cursor { ins: InstPtr::new(0, 10), sbase: 4, sp: 5 };

        let d = op_ret(&mut vm, &mut cursor, 1);
        match d {
            Dispatch::Jump(resume) => assert_eq!(resume, InstPtr::new(0, 3)),
            _ => panic!("expected return jump"),
        }
        assert_eq!(vm.stack.values[0].as_sint(), Some(99));
        assert_eq!(cursor.sbase, 0);
        assert_eq!(cursor.sp, 1);
    }
}
