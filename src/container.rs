//! Attributed dataset container (Parquet)
//!
//! Each split is written as one Parquet file holding two logical datasets:
//!
//! - slot 0, `input`: the image tensor, one `FixedSizeBinary(image_size)` row per
//!   example in column `data0`
//! - slot 1, `output`: the sparse label encoding in columns `sparseStart1`,
//!   `sparseEnd1`, `sparseIndex1`
//!
//! Dataset descriptors (`name0`, `kind0`, `width0`, ...) and dimension sizes
//! (`examplesDim0`, `dataDim0`, ...) are stored as Arrow schema metadata, one
//! decimal string per key.

use crate::cifar::{DatasetSplit, ImageLayout, SparseLabels};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, FixedSizeBinaryArray, UInt32Array};
use arrow::buffer::Buffer;
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the image dataset (slot 0)
pub const INPUT_DATASET_NAME: &str = "input";
/// Name of the label dataset (slot 1)
pub const OUTPUT_DATASET_NAME: &str = "output";

/// Pixel column
pub const DATA_COLUMN: &str = "data0";
/// Sparse label start offsets
pub const SPARSE_START_COLUMN: &str = "sparseStart1";
/// Sparse label end offsets
pub const SPARSE_END_COLUMN: &str = "sparseEnd1";
/// Sparse label class indices
pub const SPARSE_INDEX_COLUMN: &str = "sparseIndex1";

/// Dataset attribute flag: sparse storage
pub const ATTRIBUTE_SPARSE: u32 = 1;
/// Dataset attribute flag: boolean (one-hot) values
pub const ATTRIBUTE_BOOLEAN: u32 = 2;

/// What a dataset's values represent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Plain numeric vectors
    Numeric = 0,
    /// Image tensors
    Image = 1,
}

/// Element type code of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// 32-bit unsigned integer
    UInt = 0,
    /// 8-bit unsigned integer
    UChar = 8,
}

/// Descriptor of one logical dataset in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetAttributes {
    /// Dataset name
    pub name: String,
    /// Bitwise OR of `ATTRIBUTE_*` flags
    pub attributes: u32,
    /// [`DataKind`] code
    pub kind: u32,
    /// [`ElementType`] code
    pub data_type: u32,
    /// Number of meaningful dimensions
    pub dimensions: u32,
    /// Size along x
    pub width: u32,
    /// Size along y (only for `dimensions >= 2`)
    pub height: Option<u32>,
    /// Size along z (only for `dimensions >= 3`)
    pub length: Option<u32>,
}

impl DatasetAttributes {
    /// Descriptor of the dense image dataset for `layout`
    #[must_use]
    pub fn input(layout: ImageLayout) -> Self {
        Self {
            name: INPUT_DATASET_NAME.to_string(),
            attributes: 0,
            kind: DataKind::Image as u32,
            data_type: ElementType::UChar as u32,
            dimensions: 3,
            width: layout.width,
            height: Some(layout.height),
            length: Some(layout.depth),
        }
    }

    /// Descriptor of the sparse one-hot label dataset for `layout`
    #[must_use]
    pub fn output(layout: ImageLayout) -> Self {
        Self {
            name: OUTPUT_DATASET_NAME.to_string(),
            attributes: ATTRIBUTE_SPARSE | ATTRIBUTE_BOOLEAN,
            kind: DataKind::Numeric as u32,
            data_type: ElementType::UInt as u32,
            dimensions: 1,
            width: layout.classes,
            height: None,
            length: None,
        }
    }

    fn write_to(&self, slot: usize, metadata: &mut HashMap<String, String>) {
        metadata.insert(format!("name{slot}"), self.name.clone());
        metadata.insert(format!("attributes{slot}"), self.attributes.to_string());
        metadata.insert(format!("kind{slot}"), self.kind.to_string());
        metadata.insert(format!("dataType{slot}"), self.data_type.to_string());
        metadata.insert(format!("dimensions{slot}"), self.dimensions.to_string());
        metadata.insert(format!("width{slot}"), self.width.to_string());
        if let Some(height) = self.height {
            metadata.insert(format!("height{slot}"), height.to_string());
        }
        if let Some(length) = self.length {
            metadata.insert(format!("length{slot}"), length.to_string());
        }
    }

    fn read_from(slot: usize, metadata: &HashMap<String, String>) -> Result<Self> {
        let name = metadata
            .get(&format!("name{slot}"))
            .cloned()
            .ok_or_else(|| Error::Format(format!("container is missing attribute name{slot}")))?;
        Ok(Self {
            name,
            attributes: required_u32(metadata, &format!("attributes{slot}"))?,
            kind: required_u32(metadata, &format!("kind{slot}"))?,
            data_type: required_u32(metadata, &format!("dataType{slot}"))?,
            dimensions: required_u32(metadata, &format!("dimensions{slot}"))?,
            width: required_u32(metadata, &format!("width{slot}"))?,
            height: optional_u32(metadata, &format!("height{slot}"))?,
            length: optional_u32(metadata, &format!("length{slot}"))?,
        })
    }
}

fn optional_u32(metadata: &HashMap<String, String>, key: &str) -> Result<Option<u32>> {
    metadata
        .get(key)
        .map(|raw| {
            raw.parse::<u32>().map_err(|e| {
                Error::Format(format!("container attribute {key}={raw:?} is not a u32: {e}"))
            })
        })
        .transpose()
}

fn required_u32(metadata: &HashMap<String, String>, key: &str) -> Result<u32> {
    optional_u32(metadata, key)?
        .ok_or_else(|| Error::Format(format!("container is missing attribute {key}")))
}

fn required_usize(metadata: &HashMap<String, String>, key: &str) -> Result<usize> {
    let raw = metadata
        .get(key)
        .ok_or_else(|| Error::Format(format!("container is missing attribute {key}")))?;
    raw.parse::<usize>().map_err(|e| {
        Error::Format(format!("container attribute {key}={raw:?} is not a count: {e}"))
    })
}

/// Global attributes of a container file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAttributes {
    /// Input and output dataset descriptors, in slot order
    pub datasets: Vec<DatasetAttributes>,
    /// Number of examples in the split
    pub examples: usize,
}

impl ContainerAttributes {
    /// Attributes describing `split`
    #[must_use]
    pub fn for_split(split: &DatasetSplit) -> Self {
        let layout = split.layout();
        Self {
            datasets: vec![DatasetAttributes::input(layout), DatasetAttributes::output(layout)],
            examples: split.examples(),
        }
    }

    /// Image layout recorded in the input and output descriptors.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if either descriptor is missing or incomplete.
    pub fn layout(&self) -> Result<ImageLayout> {
        let input = self.dataset(INPUT_DATASET_NAME)?;
        let output = self.dataset(OUTPUT_DATASET_NAME)?;
        let (height, depth) = input.height.zip(input.length).ok_or_else(|| {
            Error::Format("input dataset is missing its height/length attributes".to_string())
        })?;
        Ok(ImageLayout {
            width: input.width,
            height,
            depth,
            classes: output.width,
        })
    }

    /// Descriptor with the given dataset name
    ///
    /// # Errors
    /// Returns [`Error::Format`] if no such dataset is recorded.
    pub fn dataset(&self, name: &str) -> Result<&DatasetAttributes> {
        self.datasets
            .iter()
            .find(|dataset| dataset.name == name)
            .ok_or_else(|| Error::Format(format!("container has no {name} dataset")))
    }

    /// Flatten into schema metadata
    #[must_use]
    pub fn to_metadata(&self, image_size: usize) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("datasets".to_string(), self.datasets.len().to_string());
        for (slot, dataset) in self.datasets.iter().enumerate() {
            dataset.write_to(slot, &mut metadata);
        }
        let examples = self.examples.to_string();
        metadata.insert("examplesDim0".to_string(), examples.clone());
        metadata.insert(
            "dataDim0".to_string(),
            (self.examples * image_size).to_string(),
        );
        metadata.insert("examplesDim1".to_string(), examples.clone());
        metadata.insert("sparseDataDim1".to_string(), examples);
        metadata
    }

    /// Parse schema metadata written by [`to_metadata`](Self::to_metadata)
    ///
    /// # Errors
    /// Returns [`Error::Format`] for missing or malformed attributes.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self> {
        let count = required_usize(metadata, "datasets")?;
        let datasets = (0..count)
            .map(|slot| DatasetAttributes::read_from(slot, metadata))
            .collect::<Result<Vec<_>>>()?;
        let examples = required_usize(metadata, "examplesDim0")?;
        for key in ["examplesDim1", "sparseDataDim1"] {
            let other = required_usize(metadata, key)?;
            if other != examples {
                return Err(Error::Format(format!(
                    "{key}={other} disagrees with examplesDim0={examples}"
                )));
            }
        }
        Ok(Self { datasets, examples })
    }
}

/// A container loaded back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetContainer {
    /// Recorded attributes
    pub attributes: ContainerAttributes,
    /// Decoded examples
    pub split: DatasetSplit,
}

fn fixed_image_size(layout: ImageLayout) -> Result<i32> {
    i32::try_from(layout.image_size()).map_err(|_| {
        Error::Format(format!(
            "image size {} exceeds the container's fixed-size column limit",
            layout.image_size()
        ))
    })
}

fn container_schema(image_size: i32, metadata: HashMap<String, String>) -> Schema {
    Schema::new_with_metadata(
        vec![
            Field::new(DATA_COLUMN, DataType::FixedSizeBinary(image_size), false),
            Field::new(SPARSE_START_COLUMN, DataType::UInt32, false),
            Field::new(SPARSE_END_COLUMN, DataType::UInt32, false),
            Field::new(SPARSE_INDEX_COLUMN, DataType::UInt32, false),
        ],
        metadata,
    )
}

/// Build the in-memory record batch for `split`
///
/// # Errors
/// Returns [`Error::Format`] if the split cannot be expressed in the container's
/// integer widths, or [`Error::Arrow`] if the batch cannot be assembled.
pub fn split_to_batch(split: &DatasetSplit) -> Result<RecordBatch> {
    let layout = split.layout();
    let attributes = ContainerAttributes::for_split(split);
    let image_size = fixed_image_size(layout)?;
    let schema = container_schema(image_size, attributes.to_metadata(layout.image_size()));

    let SparseLabels { start, end, index } = split.sparse_labels()?;
    let pixels =
        FixedSizeBinaryArray::try_new(image_size, Buffer::from_vec(split.pixels().to_vec()), None)?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(pixels),
        Arc::new(UInt32Array::from(start)),
        Arc::new(UInt32Array::from(end)),
        Arc::new(UInt32Array::from(index)),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Write `split` as a container file at `path`, replacing any existing file
///
/// # Errors
/// Returns [`Error::StorageError`] if the file cannot be created or written.
pub fn write_container<P: AsRef<Path>>(path: P, split: &DatasetSplit) -> Result<()> {
    let path = path.as_ref();
    let batch = split_to_batch(split)?;

    let file = File::create(path).map_err(|e| {
        Error::StorageError(format!("Failed to create container {}: {e}", path.display()))
    })?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::StorageError(format!("Failed to write record batch: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::StorageError(format!("Failed to finalize Parquet file: {e}")))?;

    info!(
        path = %path.display(),
        examples = split.examples(),
        "wrote container"
    );
    Ok(())
}

/// Read every record batch of a Parquet file, with its schema
///
/// # Errors
/// Returns [`Error::StorageError`] if the file cannot be opened or parsed.
pub fn load_batches<P: AsRef<Path>>(path: P) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::StorageError(format!("Failed to open Parquet file {}: {e}", path.display()))
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;
    let schema = builder.schema().clone();

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch
            .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }
    debug!(path = %path.display(), batches = batches.len(), "loaded Parquet batches");

    Ok((schema, batches))
}

/// Read a Parquet file into one record batch
///
/// # Errors
/// Same conditions as [`load_batches`], plus [`Error::Arrow`] if the batches cannot
/// be concatenated.
pub fn load_batch<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let (schema, batches) = load_batches(path)?;
    Ok(concat_batches(&schema, &batches)?)
}

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::Format(format!("container has no {name} column")))?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| Error::Format(format!("container column {name} has an unexpected type")))
}

/// Every recorded attribute must equal what [`write_container`] writes for `split`
fn check_attributes(
    attributes: &ContainerAttributes,
    split: &DatasetSplit,
    metadata: &HashMap<String, String>,
) -> Result<()> {
    let expected = ContainerAttributes::for_split(split);
    if attributes.datasets.len() != expected.datasets.len() {
        return Err(Error::Format(format!(
            "container records {} datasets, expected {}",
            attributes.datasets.len(),
            expected.datasets.len()
        )));
    }
    for (slot, (found, wanted)) in attributes.datasets.iter().zip(&expected.datasets).enumerate() {
        if found != wanted {
            return Err(Error::Format(format!(
                "dataset {slot} attributes {found:?} do not match {wanted:?}"
            )));
        }
    }

    let data_dim = required_usize(metadata, "dataDim0")?;
    let expected_dim = split.pixels().len();
    if data_dim != expected_dim {
        return Err(Error::Format(format!(
            "dataDim0={data_dim} disagrees with {} examples of {} bytes",
            split.examples(),
            split.layout().image_size()
        )));
    }
    Ok(())
}

/// Load and validate a container written by [`write_container`]
///
/// # Errors
/// - [`Error::StorageError`] if the file cannot be read
/// - [`Error::Format`] if attributes, columns, or sparse offsets are inconsistent
pub fn load_container<P: AsRef<Path>>(path: P) -> Result<DatasetContainer> {
    let path = path.as_ref();
    let (schema, batches) = load_batches(path)?;
    let attributes = ContainerAttributes::from_metadata(schema.metadata())?;
    let layout = attributes.layout()?;
    let batch = concat_batches(&schema, &batches)?;

    if batch.num_rows() != attributes.examples {
        return Err(Error::Format(format!(
            "container holds {} rows but records {} examples",
            batch.num_rows(),
            attributes.examples
        )));
    }

    let data = column::<FixedSizeBinaryArray>(&batch, DATA_COLUMN)?;
    if usize::try_from(data.value_length()).ok() != Some(layout.image_size()) {
        return Err(Error::Format(format!(
            "{DATA_COLUMN} rows are {} bytes, attributes describe {}-byte images",
            data.value_length(),
            layout.image_size()
        )));
    }
    let start = column::<UInt32Array>(&batch, SPARSE_START_COLUMN)?;
    let end = column::<UInt32Array>(&batch, SPARSE_END_COLUMN)?;
    let index = column::<UInt32Array>(&batch, SPARSE_INDEX_COLUMN)?;

    let mut pixels = Vec::with_capacity(batch.num_rows() * layout.image_size());
    for row in 0..data.len() {
        pixels.extend_from_slice(data.value(row));
    }

    for (row, (&s, &e)) in start.values().iter().zip(end.values().iter()).enumerate() {
        if usize::try_from(s).ok() != Some(row) || e.checked_sub(s) != Some(1) {
            return Err(Error::Format(format!(
                "example {row} has sparse range {s}..{e}, expected one label at slot {row}"
            )));
        }
    }

    let split = DatasetSplit::new(layout, pixels, index.values().to_vec())?;
    check_attributes(&attributes, &split, schema.metadata())?;
    info!(path = %path.display(), examples = split.examples(), "loaded container");

    Ok(DatasetContainer { attributes, split })
}
