//! Allocator hook and the runtime configuration that carries it.
//!
//! The host supplies a single callback used to account for (and optionally
//! deny) every GC-managed allocation and resize. This runtime's objects are
//! ordinary `Vec`/`Box` allocations rather than raw `malloc`'d blocks, so
//! the hook is advisory rather than load-bearing for memory safety: denying
//! a request must simply fail the allocation cleanly, never corrupt state.

/// `(old_bytes, new_bytes) -> approved`. Called before every GC-managed
/// allocation or resize with the current and requested byte counts (0 for
/// `old_bytes` on a fresh allocation, 0 for `new_bytes` on a free). Returning
/// `false` fails the request.
pub type AllocHook = Box<dyn FnMut(usize, usize) -> bool + Send>;

fn default_alloc_hook() -> AllocHook {
    Box::new(|_old, _new| true)
}

/// Host-tunable knobs for a [`crate::Runtime`].
pub struct RuntimeConfig {
    pub alloc_hook: AllocHook,
    /// Slot count reserved for the VM stack at startup.
    pub initial_stack_size: usize,
    /// Abstract step budget handed to the GC on each driven step.
    pub gc_step_budget: u32,
}

/// Minimum stack the call protocol needs to run at all: room for a
/// leaf call's return slot, arguments and a few locals without triggering
/// a growth check on the very first call.
pub const MINSTACK: usize = 16;

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            alloc_hook: default_alloc_hook(),
            initial_stack_size: MINSTACK,
            gc_step_budget: 256,
        }
    }
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("initial_stack_size", &self.initial_stack_size)
            .field("gc_step_budget", &self.gc_step_budget)
            .finish_non_exhaustive()
    }
}
