//! Growable buffers: the packed [`PodArray`], the dynamically typed
//! [`DArray`], and the open-addressed [`Table`].

mod darray;
mod pod_array;
mod table;

pub use darray::DArray;
pub use pod_array::PodArray;
pub use table::Table;
