//! A rust library for lazy, cached computation over chunked multidimensional arrays, and for rechunking them.
//!
//! ## Overview
//! - [`grid`]: the [`Grid`](grid::Grid) of cells induced by a block size, including truncated boundary cells,
//!   and the bijection between grid coordinates and cell keys.
//! - [`array`]: the [`CachedCellArray`](array::CachedCellArray), a virtual array whose cells are computed on first access.
//!   Concurrent requests for the same cell compute it once, a failed computation leaves the cell uncached,
//!   and an evicted cell is recomputed on its next access.
//!   [`BlockTransform`](array::block_transform::BlockTransform) turns a neighbourhood-aware computation into a cell loader.
//! - [`rechunk`]: planning and running a copy of a dataset between block sizes as independent [`GridBlock`](rechunk::GridBlock)s,
//!   and converting a series of slices into a dataset.
//! - [`storage`]: the block stores consumed by the above.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use lazychunk::array::{
//!     block_transform::{BlockTransform, Extension, TransformInput, TransformOutput},
//!     InMemoryArray,
//! };
//! use lazychunk::array_subset::ArraySubset;
//!
//! // A 3-tap mean filter along the last axis
//! let source = Arc::new(InMemoryArray::from_fn(vec![4, 6], |i| (i[0] * 6 + i[1]) as f32));
//! let transform = BlockTransform::new(
//!     source,
//!     vec![0, 1],
//!     vec![0, 1],
//!     Extension::MirrorSingle,
//!     |input: &TransformInput<f32>, block: &ArraySubset| {
//!         let data = block
//!             .iter_indices()
//!             .map(|i| {
//!                 let (y, x) = (i[0] as i64, i[1] as i64);
//!                 let sum: f32 = (x - 1..=x + 1).filter_map(|x| input.get(&[y, x])).sum();
//!                 sum / 3.0
//!             })
//!             .collect();
//!         Ok(TransformOutput::new(block.clone(), data))
//!     },
//! )?;
//! let filtered = transform.process(vec![2, 2])?;
//! assert_eq!(filtered.get(&[1, 2])?, 8.0);
//! assert_eq!(filtered.get(&[0, 0])?, 2.0 / 3.0); // mirrored: (1 + 0 + 1) / 3
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `gzip`: gzip block [`Compression`](storage::Compression) in the provided stores.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod array_subset;
pub mod config;
pub mod grid;
pub mod rechunk;
pub mod storage;
