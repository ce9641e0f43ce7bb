// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Row-major storage for multi-rank arrays in generated source.

use crate::error::{CodecError, CodecResult};
use crate::stream::MAX_PREALLOC;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Grid<T> {
    dims: Vec<usize>,
    items: Vec<T>,
}

impl<T> Grid<T> {
    /// Empty grid expecting `dims.iter().product()` pushes.
    pub fn with_dims(dims: Vec<usize>) -> CodecResult<Self> {
        let total = total_len(&dims)?;
        Ok(Self {
            items: Vec::with_capacity(total.min(MAX_PREALLOC)),
            dims,
        })
    }

    /// Grid over existing row-major `items`.
    pub fn from_parts(dims: Vec<usize>, items: Vec<T>) -> CodecResult<Self> {
        let total = total_len(&dims)?;
        if total != items.len() {
            return Err(CodecError::OutOfRange(format!(
                "dimensions {:?} need {} items, got {}",
                dims,
                total,
                items.len()
            )));
        }
        Ok(Self { dims, items })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Length of dimension `d`; 0 when out of range.
    pub fn dim(&self, d: usize) -> usize {
        self.dims.get(d).copied().unwrap_or(0)
    }

    /// Length of dimension `d` of a grid that must have `rank` dimensions.
    pub fn dim_of_rank(&self, d: usize, rank: usize) -> CodecResult<usize> {
        if self.dims.len() != rank {
            return Err(CodecError::mismatch(
                format!("array of rank {}", rank),
                format!("array of rank {}", self.dims.len()),
            ));
        }
        self.dims
            .get(d)
            .copied()
            .ok_or_else(|| CodecError::OutOfRange(format!("array of rank {} has no dimension {}", rank, d)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append the next element in row-major order.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        if indices.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0usize;
        for (index, len) in indices.iter().zip(&self.dims) {
            if index >= len {
                return None;
            }
            flat = flat * len + index;
        }
        self.items.get(flat)
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

fn total_len(dims: &[usize]) -> CodecResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| CodecError::OutOfRange(format!("array dimensions {:?} overflow", dims)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_row_major() {
        let grid = Grid::from_parts(vec![2, 3], vec![0, 1, 2, 10, 11, 12]).expect("grid");
        assert_eq!(grid.get(&[1, 0]), Some(&10));
        assert_eq!(grid.get(&[0, 2]), Some(&2));
        assert_eq!(grid.get(&[2, 0]), None);
        assert_eq!(grid.dim(1), 3);
    }

    #[test]
    fn test_from_parts_checks_item_count() {
        assert!(Grid::from_parts(vec![2, 2], vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_dim_of_rank_rejects_other_ranks() {
        let grid = Grid::from_parts(vec![1, 1, 2], vec![7u8, 9]).expect("grid");
        assert_eq!(grid.dim_of_rank(2, 3).expect("rank 3"), 2);
        assert!(matches!(grid.dim_of_rank(0, 2), Err(CodecError::TypeMismatch { .. })));
    }

    #[test]
    fn test_overflowing_dims_are_rejected() {
        assert!(Grid::<u8>::with_dims(vec![usize::MAX, 2]).is_err());
    }
}
