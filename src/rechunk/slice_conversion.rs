use serde::{Deserialize, Serialize};

use crate::{
    array::{ArrayShape, DataType},
    array_subset::ArraySubset,
    config::global_config,
    storage::{
        store_array_subset, Compression, DatasetAttributes, ReadableStorageTraits, StorageError,
        WritableStorageTraits,
    },
};

use super::ParallelExecutor;

/// What to do when a source slice does not exist.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSlicePolicy {
    /// Leave the destination blocks of the slice unwritten.
    #[default]
    Skip,
    /// Write a slice of zeros.
    FillValue,
}

/// A two-dimensional source slice.
///
/// Holds the row-major native-endian elements of a region with `shape` `[size_0, size_1]`,
/// where the axes correspond to the first two axes of the destination dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    shape: ArrayShape,
    bytes: Vec<u8>,
}

impl Slice {
    /// Create a new slice.
    #[must_use]
    pub fn new(shape: [u64; 2], bytes: Vec<u8>) -> Self {
        Self {
            shape: shape.to_vec(),
            bytes,
        }
    }

    /// Return the shape of the slice.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the bytes of the slice.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A source of numbered slices, such as an image series.
pub trait SliceSource: Send + Sync {
    /// Open the slice with `index`.
    ///
    /// Returns [`None`] if the slice does not exist. This is not an error.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the slice exists but cannot be read.
    fn open_slice(&self, index: u64) -> Result<Option<Slice>, StorageError>;
}

impl<F> SliceSource for F
where
    F: Fn(u64) -> Result<Option<Slice>, StorageError> + Send + Sync,
{
    fn open_slice(&self, index: u64) -> Result<Option<Slice>, StorageError> {
        self(index)
    }
}

/// Parameters of a slice conversion.
#[derive(Clone, Debug)]
pub struct SliceConversion {
    region: ArraySubset,
    block_size: [u64; 2],
    data_type: DataType,
    compression: Compression,
    first_slice_index: u64,
    missing_slice_policy: Option<MissingSlicePolicy>,
}

impl SliceConversion {
    /// Create new slice conversion parameters.
    ///
    /// `region` is the three-dimensional region to convert: its first two axes crop each slice, and slice `z`
    /// of its last axis is read from the slice with index `first_slice_index + z`.
    /// The destination dataset has the shape of `region` and a block size of `[block_size[0], block_size[1], 1]`.
    #[must_use]
    pub fn new(region: ArraySubset, block_size: [u64; 2], data_type: DataType) -> Self {
        Self {
            region,
            block_size,
            data_type,
            compression: Compression::default(),
            first_slice_index: 0,
            missing_slice_policy: None,
        }
    }

    /// Set the compression of the destination dataset. Defaults to [`Compression::Raw`].
    pub fn compression(&mut self, compression: Compression) -> &mut Self {
        self.compression = compression;
        self
    }

    /// Set the index of the slice at `z = 0`. Defaults to zero.
    pub fn first_slice_index(&mut self, first_slice_index: u64) -> &mut Self {
        self.first_slice_index = first_slice_index;
        self
    }

    /// Set the missing slice policy.
    ///
    /// Defaults to the [missing slice policy](crate::config::Config#missing-slice-policy) of the global config.
    pub fn missing_slice_policy(&mut self, missing_slice_policy: MissingSlicePolicy) -> &mut Self {
        self.missing_slice_policy = Some(missing_slice_policy);
        self
    }

    /// Return the attributes of the destination dataset.
    #[must_use]
    pub fn dataset_attributes(&self) -> DatasetAttributes {
        DatasetAttributes::new(
            self.region.shape().to_vec(),
            vec![self.block_size[0], self.block_size[1], 1],
            self.data_type,
            self.compression,
        )
    }
}

/// The outcome of converting one slice.
#[derive(Debug)]
pub enum SliceOutcome {
    /// The slice was written.
    Written,
    /// The slice was missing and its blocks were left unwritten.
    Skipped,
    /// The slice was missing and zeros were written.
    Filled,
    /// The slice could not be read or written.
    Failed(StorageError),
}

impl SliceOutcome {
    /// Returns true if the slice failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Convert a series of slices from `source` into a new three-dimensional dataset `name` in `storage`.
///
/// Each slice is an independent task of `executor`. A failing slice does not abort the others.
/// Returns one outcome per slice, in `z` order.
///
/// # Errors
/// Returns a [`StorageError`] if the region is not three-dimensional or the dataset cannot be created.
pub fn convert_slices<TStorage, TSource, TExecutor>(
    storage: &TStorage,
    name: &str,
    conversion: &SliceConversion,
    source: &TSource,
    executor: &TExecutor,
) -> Result<Vec<SliceOutcome>, StorageError>
where
    TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits,
    TSource: ?Sized + SliceSource,
    TExecutor: ParallelExecutor,
{
    if conversion.region.dimensionality() != 3 {
        return Err(StorageError::IncompatibleDimensionality(
            crate::array_subset::IncompatibleDimensionalityError::new(
                conversion.region.dimensionality(),
                3,
            ),
        ));
    }
    storage.create_dataset(name, &conversion.dataset_attributes())?;
    let missing_slice_policy = conversion
        .missing_slice_policy
        .unwrap_or_else(|| global_config().missing_slice_policy());

    let region = &conversion.region;
    let crop = ArraySubset::from_parts(region.start()[..2].to_vec(), region.shape()[..2].to_vec());
    let slice_bytes = crop.num_elements_usize() * conversion.data_type.size();

    let outcomes = executor.for_each((0..region.shape()[2]).collect(), |z| {
        let index = conversion.first_slice_index + region.start()[2] + z;
        let destination = ArraySubset::from_parts(
            vec![0, 0, z],
            vec![region.shape()[0], region.shape()[1], 1],
        );
        let write = |bytes: &[u8]| store_array_subset(storage, name, &destination, bytes);
        let outcome = match source.open_slice(index) {
            Ok(Some(slice)) => read_crop(&slice, &crop, conversion.data_type)
                .and_then(|bytes| write(&bytes))
                .map_or_else(SliceOutcome::Failed, |()| SliceOutcome::Written),
            Ok(None) => match missing_slice_policy {
                MissingSlicePolicy::Skip => {
                    log::warn!("slice {index} is missing, skipping z={z}");
                    SliceOutcome::Skipped
                }
                MissingSlicePolicy::FillValue => {
                    log::warn!("slice {index} is missing, filling z={z}");
                    write(&vec![0; slice_bytes])
                        .map_or_else(SliceOutcome::Failed, |()| SliceOutcome::Filled)
                }
            },
            Err(err) => SliceOutcome::Failed(err),
        };
        if let SliceOutcome::Failed(err) = &outcome {
            log::warn!("failed to convert slice {index}: {err}");
        } else {
            log::debug!("converted slice {index} to z={z}: {outcome:?}");
        }
        outcome
    });
    Ok(outcomes)
}

/// Validate `slice` and return the bytes of `crop`.
fn read_crop(
    slice: &Slice,
    crop: &ArraySubset,
    data_type: DataType,
) -> Result<Vec<u8>, StorageError> {
    let element_size = data_type.size();
    let expected = usize::try_from(slice.shape.iter().product::<u64>())
        .ok()
        .and_then(|n| n.checked_mul(element_size))
        .ok_or_else(|| StorageError::from("slice size exceeds usize::MAX"))?;
    if slice.bytes.len() != expected {
        return Err(StorageError::InvalidBlockLength {
            expected,
            got: slice.bytes.len(),
        });
    }
    if !crop.inbounds(&slice.shape) {
        return Err(StorageError::InvalidArraySubset(
            crop.clone(),
            slice.shape.clone(),
        ));
    }
    Ok(crop.extract_bytes(&slice.bytes, &slice.shape, element_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_crop_validates() {
        let slice = Slice::new([2, 3], vec![1, 2, 3, 4, 5, 6]);
        let crop = ArraySubset::new_with_ranges(&[1..2, 1..3]);
        assert_eq!(read_crop(&slice, &crop, DataType::UInt8).unwrap(), vec![5, 6]);
        assert!(read_crop(&slice, &crop, DataType::UInt16).is_err());
        let crop = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        assert!(read_crop(&slice, &crop, DataType::UInt8).is_err());
    }

    #[test]
    fn missing_slice_policy_serde() {
        assert_eq!(
            serde_json::to_string(&MissingSlicePolicy::FillValue).unwrap(),
            r#""fill_value""#
        );
        assert_eq!(MissingSlicePolicy::default(), MissingSlicePolicy::Skip);
    }
}
