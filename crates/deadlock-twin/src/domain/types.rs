//! Core Types for the Allocation Model
//!
//! Identifiers, unit vectors and the flat process-by-resource matrix shared
//! by every component of the engine.
//!
//! # Representation
//!
//! Per-process data is stored as row-major [`Matrix`] arenas keyed by
//! [`ProcessId`], not as nested per-process records. Cloning a
//! [`SystemState`](super::SystemState) for a tentative grant therefore copies
//! a handful of flat vectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

use super::error::ConfigError;

/// Quantity of a single resource type
///
/// Unsigned, so a negative quantity cannot be expressed at all.
pub type Units = u32;

/// Process identifier (row index into the process table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub usize);

impl ProcessId {
    /// Create a new process identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Resource type identifier (column index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub usize);

impl ResourceId {
    /// Create a new resource identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Component-wise Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `demand[r] <= limit[r]` for every resource type
#[inline]
pub(crate) fn fits(demand: &[Units], limit: &[Units]) -> bool {
    debug_assert_eq!(demand.len(), limit.len());
    demand.iter().zip(limit).all(|(d, l)| d <= l)
}

/// First resource type where `demand` exceeds `limit`
#[inline]
pub(crate) fn first_excess(demand: &[Units], limit: &[Units]) -> Option<ResourceId> {
    demand
        .iter()
        .zip(limit)
        .position(|(d, l)| d > l)
        .map(ResourceId)
}

#[inline]
pub(crate) fn add_into(acc: &mut [Units], other: &[Units]) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, o) in acc.iter_mut().zip(other) {
        *a += *o;
    }
}

/// Add `other` into `acc`, clamping at `Units::MAX`.
///
/// A clamped entry still admits every demand, since no demand exceeds
/// `Units::MAX`.
#[inline]
pub(crate) fn saturating_add_into(acc: &mut [Units], other: &[Units]) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, o) in acc.iter_mut().zip(other) {
        *a = a.saturating_add(*o);
    }
}

/// Subtract `other` from `acc`, panicking on underflow.
#[inline]
pub(crate) fn sub_from(acc: &mut [Units], other: &[Units], what: &str) {
    debug_assert_eq!(acc.len(), other.len());
    for (a, o) in acc.iter_mut().zip(other) {
        *a = a
            .checked_sub(*o)
            .unwrap_or_else(|| panic!("{what}: subtracting {o} from {a} underflows"));
    }
}

/// Precondition check for vectors handed to the engine.
#[inline]
pub(crate) fn assert_len(units: &[Units], expected: usize, what: &str) {
    assert_eq!(
        units.len(),
        expected,
        "{what}: expected {expected} resource entries, found {}",
        units.len()
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ResourceVector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Units indexed by resource type
///
/// # Example
///
/// ```rust
/// use deadlock_twin::domain::ResourceVector;
///
/// let request = ResourceVector::new(vec![1, 0, 2]);
/// assert!(request.fits_within(&[3, 3, 2]));
/// assert_eq!(request.to_string(), "[1, 0, 2]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVector(Vec<Units>);

impl ResourceVector {
    /// Wrap a vector of units
    pub fn new(units: Vec<Units>) -> Self {
        Self(units)
    }

    /// All-zero vector over `len` resource types
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Copy a slice of units
    pub fn from_slice(units: &[Units]) -> Self {
        Self(units.to_vec())
    }

    /// Number of resource types
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when the vector covers no resource types
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw units
    pub fn as_slice(&self) -> &[Units] {
        &self.0
    }

    /// Iterate over the units in resource order
    pub fn iter(&self) -> impl Iterator<Item = Units> + '_ {
        self.0.iter().copied()
    }

    /// Units of a single resource type
    pub fn get(&self, resource: ResourceId) -> Units {
        self.0[resource.as_usize()]
    }

    /// Sum across every resource type
    pub fn sum(&self) -> u64 {
        self.0.iter().map(|&u| u64::from(u)).sum()
    }

    /// `true` when every component is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&u| u == 0)
    }

    /// `self[r] <= limit[r]` for every resource type
    pub fn fits_within(&self, limit: &[Units]) -> bool {
        assert_len(limit, self.len(), "ResourceVector::fits_within");
        fits(&self.0, limit)
    }

    /// First resource type where `self` exceeds `limit`
    pub fn first_excess(&self, limit: &[Units]) -> Option<ResourceId> {
        assert_len(limit, self.len(), "ResourceVector::first_excess");
        first_excess(&self.0, limit)
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Units] {
        &mut self.0
    }

    /// Unwrap into the raw units
    pub fn into_vec(self) -> Vec<Units> {
        self.0
    }
}

impl From<Vec<Units>> for ResourceVector {
    fn from(units: Vec<Units>) -> Self {
        Self(units)
    }
}

impl From<&[Units]> for ResourceVector {
    fn from(units: &[Units]) -> Self {
        Self::from_slice(units)
    }
}

impl AsRef<[Units]> for ResourceVector {
    fn as_ref(&self) -> &[Units] {
        &self.0
    }
}

impl Index<ResourceId> for ResourceVector {
    type Output = Units;

    fn index(&self, resource: ResourceId) -> &Units {
        &self.0[resource.as_usize()]
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, u) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", u)?;
        }
        write!(f, "]")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Matrix
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Row-major process × resource matrix
///
/// Rows are processes, columns are resource types. Serialized as a list of
/// rows so scenario files and JSON output stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<Units>>", try_from = "Vec<Vec<Units>>")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Units>,
}

impl Matrix {
    /// All-zero matrix
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// Build from rows, panicking on ragged input
    ///
    /// Intended for literals in code and tests. Use [`Matrix::try_from_rows`]
    /// for data that comes from outside the program.
    ///
    /// # Panics
    ///
    /// Panics if the rows differ in length.
    pub fn from_rows<R: AsRef<[Units]>>(rows: &[R]) -> Self {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        match Self::try_from_rows(rows, cols) {
            Ok(m) => m,
            Err(e) => panic!("Matrix::from_rows: {e}"),
        }
    }

    /// Build from rows, checking every row has `cols` entries
    pub fn try_from_rows<R: AsRef<[Units]>>(rows: &[R], cols: usize) -> Result<Self, ConfigError> {
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(ConfigError::ShapeMismatch {
                    what: format!("row {i}"),
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of rows (processes)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (resource types)
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow one row
    #[inline]
    pub fn row(&self, process: ProcessId) -> &[Units] {
        let start = process.as_usize() * self.cols;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub(crate) fn row_mut(&mut self, process: ProcessId) -> &mut [Units] {
        let start = process.as_usize() * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Copy one row out as a vector
    pub fn row_vector(&self, process: ProcessId) -> ResourceVector {
        ResourceVector::from_slice(self.row(process))
    }

    /// Single entry
    pub fn get(&self, process: ProcessId, resource: ResourceId) -> Units {
        self.row(process)[resource.as_usize()]
    }

    /// Sum of one column, widened so it cannot overflow
    pub fn column_sum(&self, resource: ResourceId) -> u64 {
        (0..self.rows)
            .map(|p| u64::from(self.get(ProcessId(p), resource)))
            .sum()
    }

    /// Iterate over rows in process order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[Units]> + '_ {
        (0..self.rows).map(move |p| self.row(ProcessId(p)))
    }

    /// Clone out as nested rows
    pub fn to_rows(&self) -> Vec<Vec<Units>> {
        (0..self.rows)
            .map(|p| self.row(ProcessId(p)).to_vec())
            .collect()
    }
}

impl From<Matrix> for Vec<Vec<Units>> {
    fn from(matrix: Matrix) -> Self {
        matrix.to_rows()
    }
}

impl TryFrom<Vec<Vec<Units>>> for Matrix {
    type Error = ConfigError;

    fn try_from(rows: Vec<Vec<Units>>) -> Result<Self, Self::Error> {
        let cols = rows.first().map_or(0, Vec::len);
        Self::try_from_rows(&rows, cols)
    }
}
