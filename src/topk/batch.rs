//! Top-K over Arrow record batches
//!
//! Ranks the rows of a batch by one numeric column using the same selector as
//! the slice API, then gathers every column with Arrow's `take` kernel so rows
//! stay aligned. Null slots rank last, like NaN.

use super::{compare_rank, top_k_positions, KeySource, RankKey, SortOrder};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int32Type, Int64Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use std::cmp::Ordering;

/// Trait for Top-K selection on record batches
pub trait TopKSelection {
    /// Select top K rows by a specific column
    ///
    /// # Arguments
    /// * `column_index` - Index of the column to rank by
    /// * `k` - Number of rows to select (clamped to the row count)
    /// * `order` - Sort order (Ascending or Descending)
    ///
    /// # Returns
    /// A new `RecordBatch` with the same schema containing the top K rows, best first
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if:
    /// - Column index is out of bounds
    /// - Column data type is not rankable
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cifar_topk::topk::{TopKSelection, SortOrder};
    /// use arrow::array::{Float64Array, RecordBatch};
    /// use arrow::datatypes::{DataType, Field, Schema};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let schema = Arc::new(Schema::new(vec![
    ///     Field::new("score", DataType::Float64, false),
    /// ]));
    /// let batch = RecordBatch::try_new(
    ///     schema,
    ///     vec![Arc::new(Float64Array::from(vec![1.0, 5.0, 3.0, 9.0, 2.0]))],
    /// )?;
    ///
    /// // Get top 3 highest scores
    /// let top3 = batch.top_k(0, 3, SortOrder::Descending)?;
    /// assert_eq!(top3.num_rows(), 3);
    /// # Ok(())
    /// # }
    /// ```
    fn top_k(&self, column_index: usize, k: usize, order: SortOrder) -> Result<RecordBatch>;
}

impl TopKSelection for RecordBatch {
    fn top_k(&self, column_index: usize, k: usize, order: SortOrder) -> Result<RecordBatch> {
        if column_index >= self.num_columns() {
            return Err(Error::InvalidArgument(format!(
                "Column index {} out of bounds (batch has {} columns)",
                column_index,
                self.num_columns()
            )));
        }

        let indices = column_top_k_indices(self.column(column_index), k, order)?;
        let take_indices = UInt64Array::from_iter_values(indices.iter().map(|&i| i as u64));

        let columns = self
            .columns()
            .iter()
            .map(|column| take(column.as_ref(), &take_indices, None))
            .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;

        RecordBatch::try_new(self.schema(), columns)
            .map_err(|e| Error::StorageError(format!("Failed to create result batch: {e}")))
    }
}

/// A primitive column ranked in place. Null slots rank like `None`.
struct ColumnKeys<'a, T: ArrowPrimitiveType>(&'a PrimitiveArray<T>);

impl<T: ArrowPrimitiveType> ColumnKeys<'_, T> {
    #[inline]
    fn key(&self, row: usize) -> Option<T::Native> {
        self.0.is_valid(row).then(|| self.0.value(row))
    }
}

impl<T> KeySource for ColumnKeys<'_, T>
where
    T: ArrowPrimitiveType,
    T::Native: RankKey,
{
    fn key_count(&self) -> usize {
        self.0.len()
    }

    fn compare_at(&self, a: usize, b: usize, order: SortOrder) -> Ordering {
        compare_rank(&self.key(a), &self.key(b), order)
    }
}

fn rank_primitive<T>(column: &ArrayRef, k: usize, order: SortOrder) -> Result<Vec<usize>>
where
    T: ArrowPrimitiveType,
    T::Native: RankKey,
{
    let array = column.as_primitive_opt::<T>().ok_or_else(|| {
        Error::Other(format!(
            "Failed to downcast {} column to {}",
            column.data_type(),
            std::any::type_name::<T>()
        ))
    })?;
    Ok(top_k_positions(&ColumnKeys(array), k, order))
}

/// Rank one column, returning row positions best first
fn column_top_k_indices(column: &ArrayRef, k: usize, order: SortOrder) -> Result<Vec<usize>> {
    match column.data_type() {
        DataType::Int32 => rank_primitive::<Int32Type>(column, k, order),
        DataType::Int64 => rank_primitive::<Int64Type>(column, k, order),
        DataType::UInt8 => rank_primitive::<UInt8Type>(column, k, order),
        DataType::UInt32 => rank_primitive::<UInt32Type>(column, k, order),
        DataType::UInt64 => rank_primitive::<UInt64Type>(column, k, order),
        DataType::Float32 => rank_primitive::<Float32Type>(column, k, order),
        DataType::Float64 => rank_primitive::<Float64Type>(column, k, order),
        dt => Err(Error::InvalidArgument(format!(
            "Top-K not supported for data type: {dt:?}"
        ))),
    }
}
