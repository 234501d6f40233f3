use serde::{Deserialize, Serialize};

use crate::{
    array::{ArrayShape, DataType},
    grid::{Grid, GridCreateError},
};

use super::StorageError;

/// Block compression.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Compression {
    /// Blocks are stored uncompressed.
    #[default]
    Raw,
    /// Blocks are stored gzip compressed at `level` (0-9).
    Gzip {
        /// The compression level.
        level: u32,
    },
}

impl Compression {
    /// Encode the bytes of a block.
    ///
    /// # Errors
    /// Returns [`StorageError::UnsupportedCompression`] if the compression is unsupported
    /// (e.g. gzip without the `gzip` feature, or a level above 9).
    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
        match self {
            Self::Raw => Ok(bytes.to_vec()),
            #[cfg(feature = "gzip")]
            Self::Gzip { level } => {
                use std::io::Write;
                if *level > 9 {
                    return Err(StorageError::UnsupportedCompression(format!(
                        "gzip level {level}"
                    )));
                }
                let mut encoder = flate2::write::GzEncoder::new(
                    Vec::with_capacity(bytes.len()),
                    flate2::Compression::new(*level),
                );
                encoder.write_all(bytes)?;
                Ok(encoder.finish()?)
            }
            #[cfg(not(feature = "gzip"))]
            Self::Gzip { .. } => Err(StorageError::UnsupportedCompression("gzip".to_string())),
        }
    }

    /// Decode the bytes of a block.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the compression is unsupported or the bytes cannot be decoded.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, StorageError> {
        match self {
            Self::Raw => Ok(bytes.to_vec()),
            #[cfg(feature = "gzip")]
            Self::Gzip { .. } => {
                use std::io::Read;
                let mut decoder = flate2::read::GzDecoder::new(bytes);
                let mut decoded = Vec::new();
                decoder.read_to_end(&mut decoded)?;
                Ok(decoded)
            }
            #[cfg(not(feature = "gzip"))]
            Self::Gzip { .. } => Err(StorageError::UnsupportedCompression("gzip".to_string())),
        }
    }
}

/// The attributes of a dataset.
///
/// Serialised as JSON, for example:
/// ```json
/// {
///   "dimensions": [100, 200, 30],
///   "blockSize": [64, 64, 1],
///   "dataType": "uint16",
///   "compression": { "type": "gzip", "level": 6 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetAttributes {
    dimensions: ArrayShape,
    block_size: ArrayShape,
    data_type: DataType,
    #[serde(default)]
    compression: Compression,
}

impl DatasetAttributes {
    /// Create new dataset attributes.
    ///
    /// The attributes are validated by [`grid`](Self::grid) when a dataset is created.
    #[must_use]
    pub fn new(
        dimensions: ArrayShape,
        block_size: ArrayShape,
        data_type: DataType,
        compression: Compression,
    ) -> Self {
        Self {
            dimensions,
            block_size,
            data_type,
            compression,
        }
    }

    /// Return the dataset dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[u64] {
        &self.dimensions
    }

    /// Return the block size.
    #[must_use]
    pub fn block_size(&self) -> &[u64] {
        &self.block_size
    }

    /// Return the data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Return the compression.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Create the grid of the dataset.
    ///
    /// # Errors
    /// Returns a [`GridCreateError`] if the dimensions and block size do not form a valid grid.
    pub fn grid(&self) -> Result<Grid, GridCreateError> {
        Grid::new(self.dimensions.clone(), self.block_size.clone())
    }

    /// Return the expected size in bytes of the block at `grid_coord`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the grid is invalid or `grid_coord` is out of bounds.
    pub fn block_size_bytes(&self, grid_coord: &[u64]) -> Result<usize, StorageError> {
        let num_elements: u64 = self.grid()?.cell_dimensions(grid_coord)?.iter().product();
        usize::try_from(num_elements)
            .ok()
            .and_then(|n| n.checked_mul(self.data_type.size()))
            .ok_or_else(|| StorageError::from("block size exceeds usize::MAX"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_attributes_json() {
        let attributes = DatasetAttributes::new(
            vec![100, 200, 30],
            vec![64, 64, 1],
            DataType::UInt16,
            Compression::Gzip { level: 6 },
        );
        let json = serde_json::to_string(&attributes).unwrap();
        assert_eq!(
            json,
            r#"{"dimensions":[100,200,30],"blockSize":[64,64,1],"dataType":"uint16","compression":{"type":"gzip","level":6}}"#
        );
        let parsed: DatasetAttributes = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, attributes);

        let raw: DatasetAttributes =
            serde_json::from_str(r#"{"dimensions":[4],"blockSize":[2],"dataType":"float32"}"#)
                .unwrap();
        assert_eq!(raw.compression(), Compression::Raw);
        assert_eq!(raw.block_size_bytes(&[1]).unwrap(), 8);
        assert!(raw.block_size_bytes(&[2]).is_err());
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn compression_gzip() {
        let bytes: Vec<u8> = (0..255).cycle().take(4096).collect();
        let compression = Compression::Gzip { level: 5 };
        let encoded = compression.encode(&bytes).unwrap();
        assert!(encoded.len() < bytes.len());
        assert_eq!(compression.decode(&encoded).unwrap(), bytes);
        assert!(Compression::Gzip { level: 10 }.encode(&bytes).is_err());
        assert!(compression.decode(&bytes).is_err());
    }
}
