//! Error unwinding: walking the call stack for the nearest handler frame
//! and synthesising the `ERROR`-tagged value it receives.

use crate::error::VmError;
use crate::strings::StringPool;
use crate::value::Value;
use crate::vm::frame::{CallFrame, Stack};
use crate::vm::opcode::InstPtr;

/// Intern `err`'s message and wrap it as an `ERROR`-tagged value so a
/// handler can inspect it like any other runtime value.
pub fn synthesize_error_value(strings: &mut StringPool, err: VmError) -> Value {
    let r = strings.put_copy(err.message().as_bytes());
    Value::error(r)
}

/// Outcome of searching for a handler after a failing op.
pub enum Unwind {
    /// A handler frame was found; execution resumes at `resume`.
    Recovered { resume: InstPtr },
    /// The call stack holds no handler frame: the VM halts with `err` intact.
    Unhandled,
}

/// Search `stack` for the nearest handler frame, writing the synthesised
/// error value into its `error_slot` if it wants one. Pops frames
/// (discarding `Return` frames along the way, since exceptions do not stop
/// at function boundaries) until a `Handler` frame surfaces or the stack is
/// empty.
pub fn unwind_to_handler(stack: &mut Stack, strings: &mut StringPool, err: VmError) -> Unwind {
    match stack.pop_handler() {
        Some(CallFrame::Handler { error_slot, resume }) => {
            if let Some(slot) = error_slot {
                let v = synthesize_error_value(strings, err);
                if slot < stack.values.len() {
                    stack.values[slot] = v;
                }
            }
            Unwind::Recovered { resume }
        }
        _ => Unwind::Unhandled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_at_nearest_handler_and_writes_error_value() {
        let mut stack = Stack::new(16);
        let mut strings = StringPool::new();
        stack.push_handler(Some(3), InstPtr::new(0, 7));

        match unwind_to_handler(&mut stack, &mut strings, VmError::DivByZero) {
            Unwind::Recovered { resume } => assert_eq!(resume, InstPtr::new(0, 7)),
            Unwind::Unhandled => panic!("expected a handler"),
        }
        assert_eq!(stack.values[3].as_error_ref().map(|r| strings.get(r).to_vec()), Some(b"division by zero".to_vec()));
    }

    #[test]
    fn unhandled_when_no_handler_frame_exists() {
        let mut stack = Stack::new(16);
        let mut strings = StringPool::new();
        stack.push_return(0, 4, InstPtr::new(0, 1));

        match unwind_to_handler(&mut stack, &mut strings, VmError::DivByZero) {
            Unwind::Unhandled => {}
            Unwind::Recovered { .. } => panic!("expected unhandled"),
        }
    }
}
