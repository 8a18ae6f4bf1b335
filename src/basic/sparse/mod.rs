//! Sparse helpers missing from `nalgebra_sparse` that the Newton solver relies on.
pub(crate) mod conj;
pub(crate) mod slice;
pub(crate) mod stack;
