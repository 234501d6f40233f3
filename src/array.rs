//! Lazily computed arrays.
//!
//! A [`CachedCellArray`] is a virtual array over a [`Grid`](crate::grid::Grid).
//! Each cell is computed by a [`CellLoader`] on first access and retained in a [`CellCache`](cell_cache::CellCache).
//!
//! Cell loaders are typically created from:
//! - a [`BlockTransform`](block_transform::BlockTransform), a neighbourhood-aware computation over an [`ElementSource`], or
//! - a stored dataset, with [`store_cell_loader`] or [`CachedCellArray::open`].

mod array_errors;
pub mod block_transform;
mod cached_cell_array;
mod cell;
pub mod cell_cache;
mod element;
mod element_source;
mod store_cell_loader;

pub use array_errors::{ArrayError, CellLoadError, ComputationError};
pub use cached_cell_array::{CachedCellArray, CellLoader};
pub use cell::Cell;
pub use element::{elements_from_bytes, elements_to_bytes, DataType, Element};
pub use element_source::{ElementSource, InMemoryArray};
pub use store_cell_loader::store_cell_loader;

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;
