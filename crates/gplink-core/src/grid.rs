//! Score grid view
//!
//! A borrowed `[channel, position_i, position_j]` score array together with
//! the validity mask of the sequence it was computed for.

use ndarray::{s, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::{GplinkError, Result};

/// Borrowed pairwise score grid with an optional validity mask
#[derive(Debug, Clone)]
pub struct ScoreGrid<'a> {
    scores: ArrayView3<'a, f32>,
    mask: Option<Vec<bool>>,
}

impl<'a> ScoreGrid<'a> {
    /// Wrap a `[C, L, L]` score array. The position axes must be square.
    pub fn new(scores: ArrayView3<'a, f32>) -> Result<Self> {
        let (_, rows, cols) = scores.dim();
        if rows != cols {
            return Err(GplinkError::ShapeMismatch {
                expected: format!("[C, {rows}, {rows}]"),
                actual: format!("{:?}", scores.shape()),
            });
        }

        Ok(Self { scores, mask: None })
    }

    /// Attach a validity mask; `false` marks padding
    pub fn with_mask(mut self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.seq_len() {
            return Err(GplinkError::MaskLength {
                expected: self.seq_len(),
                actual: mask.len(),
            });
        }

        self.mask = Some(mask.to_vec());
        Ok(self)
    }

    /// Attach an integer attention mask; non-zero marks a real token
    pub fn with_attention_mask<T>(self, attention_mask: &[T]) -> Result<Self>
    where
        T: Copy + PartialEq + Default,
    {
        let mask: Vec<bool> = attention_mask.iter().map(|&v| v != T::default()).collect();
        self.with_mask(&mask)
    }

    /// Number of label channels
    pub fn channels(&self) -> usize {
        self.scores.len_of(Axis(0))
    }

    /// Padded sequence length `L`
    pub fn seq_len(&self) -> usize {
        self.scores.len_of(Axis(1))
    }

    pub fn scores(&self) -> &ArrayView3<'a, f32> {
        &self.scores
    }

    /// Whether `position` may be reported as a boundary
    pub fn is_valid(&self, position: usize) -> bool {
        match &self.mask {
            Some(mask) => mask.get(position).copied().unwrap_or(false),
            None => position < self.seq_len(),
        }
    }

    /// Number of positions the mask leaves usable
    pub fn valid_len(&self) -> usize {
        (0..self.seq_len()).filter(|&p| self.is_valid(p)).count()
    }

    /// Upper-triangle cells `(i, j)`, `i <= j`, of `channel` scoring above
    /// `threshold`, in row-major order. Masked positions are skipped.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= self.channels()`.
    pub fn positions_above(
        &self,
        channel: usize,
        threshold: f32,
    ) -> impl Iterator<Item = (usize, usize)> + '_ {
        cells_above(
            self.scores.index_axis(Axis(0), channel),
            self.mask.as_deref(),
            threshold,
        )
    }

    /// Channels scoring above `threshold` at cell `(i, j)`.
    /// No triangle restriction: alignment grids score both orders.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is not below `self.seq_len()`.
    pub fn channels_above(
        &self,
        i: usize,
        j: usize,
        threshold: f32,
    ) -> impl Iterator<Item = usize> + '_ {
        lanes_above(self.scores.slice(s![.., i, j]), threshold)
    }
}

// Free functions so the returned iterators borrow only the view, not the
// grid's own lifetime parameter.

fn cells_above<'s>(
    plane: ArrayView2<'s, f32>,
    mask: Option<&'s [bool]>,
    threshold: f32,
) -> impl Iterator<Item = (usize, usize)> + 's {
    let len = plane.nrows();
    let valid = move |p: usize| mask.map_or(true, |m| m.get(p).copied().unwrap_or(false));

    (0..len).filter(move |&i| valid(i)).flat_map(move |i| {
        (i..len)
            .filter(move |&j| valid(j) && plane[[i, j]] > threshold)
            .map(move |j| (i, j))
    })
}

fn lanes_above<'s>(lane: ArrayView1<'s, f32>, threshold: f32) -> impl Iterator<Item = usize> + 's {
    lane.into_iter()
        .enumerate()
        .filter(move |&(_, &score)| score > threshold)
        .map(|(channel, _)| channel)
}
