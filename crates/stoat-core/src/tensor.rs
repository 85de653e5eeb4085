use rand::Rng;

use crate::error::{Error, Result};

// Tensor — The fundamental data structure
//
// A Tensor is a 3-dimensional array of f32, the unit of data every layer
// consumes and produces. It reconciles two coordinate systems over one
// owning buffer:
//
//   1. The LOGICAL view: channel-major (channel, row, col), always padded
//      to three dimensions. `at(c, r, w)` indexes this view, and `shape()`
//      reports it.
//   2. The PHYSICAL layout: column-major planes, one per channel. Within a
//      channel the element at (row r, col w) lives at offset `w * rows + r`.
//      `index(offset)` addresses this flat layout directly.
//
// On top of the always-3D physical shape sits `raw_shape`, the collapsed
// logical shape of 1, 2, or 3 dimensions: a (1, 1, W) tensor is logically a
// vector [W], a (1, H, W) tensor a matrix [H, W], and anything else the full
// [C, H, W]. Keeping one buffer with two mapping functions (instead of two
// synchronized structures) is deliberate; every row-major entry point
// (`fill_with`, `values`, `reshape`) converts explicitly.
//
// MEMORY MODEL:
//
//   A Tensor owns its buffer outright. Graph edges share tensors through
//   `Arc<Tensor>`; a layer that needs to mutate its input (padding, in-place
//   transforms) must clone the tensor first. `Clone` duplicates the buffer.

/// A 3-D f32 array with a channel-major logical view over column-major
/// physical storage.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    /// Column-major element storage, one (rows x cols) plane per channel.
    data: Vec<f32>,
    channels: usize,
    rows: usize,
    cols: usize,
    /// Collapsed logical shape: 1, 2, or 3 dims (empty only for an empty
    /// tensor).
    raw_shape: Vec<usize>,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(channels={}, rows={}, cols={}, raw_shape={:?})",
            self.channels, self.rows, self.cols, self.raw_shape
        )
    }
}

/// Collapse an always-3D physical shape into the 1/2/3-dim logical shape.
fn collapse_shape(channels: usize, rows: usize, cols: usize) -> Vec<usize> {
    if channels == 1 && rows == 1 {
        vec![cols]
    } else if channels == 1 {
        vec![rows, cols]
    } else {
        vec![channels, rows, cols]
    }
}

impl Tensor {
    /// Create a zero-filled tensor with the given physical dimensions.
    pub fn new(channels: usize, rows: usize, cols: usize) -> Self {
        Tensor {
            data: vec![0.0; channels * rows * cols],
            channels,
            rows,
            cols,
            raw_shape: collapse_shape(channels, rows, cols),
        }
    }

    /// Create a zero-filled tensor from a 1-, 2-, or 3-dim logical shape.
    ///
    /// Missing leading dimensions are padded with 1: `[W]` becomes
    /// `(1, 1, W)` and `[H, W]` becomes `(1, H, W)`.
    pub fn from_shape(shape: &[usize]) -> Result<Self> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(Error::msg(format!(
                "tensor shape must have 1 to 3 dims, got {:?}",
                shape
            )));
        }
        let mut full = [1usize; 3];
        full[3 - shape.len()..].copy_from_slice(shape);
        Ok(Tensor::new(full[0], full[1], full[2]))
    }

    // Accessors

    /// Number of channels.
    ///
    /// # Panics
    /// Panics on an empty tensor, as do all accessors below.
    pub fn channels(&self) -> usize {
        assert!(!self.is_empty(), "channels() on empty tensor");
        self.channels
    }

    /// Number of rows per channel plane.
    pub fn rows(&self) -> usize {
        assert!(!self.is_empty(), "rows() on empty tensor");
        self.rows
    }

    /// Number of columns per channel plane.
    pub fn cols(&self) -> usize {
        assert!(!self.is_empty(), "cols() on empty tensor");
        self.cols
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        assert!(!self.is_empty(), "size() on empty tensor");
        self.data.len()
    }

    /// Whether this tensor holds no elements. An empty tensor is a
    /// distinguished state with no valid indexing.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The always-3D physical shape `(channels, rows, cols)`.
    pub fn shape(&self) -> [usize; 3] {
        assert!(!self.is_empty(), "shape() on empty tensor");
        [self.channels, self.rows, self.cols]
    }

    /// The collapsed logical shape of 1, 2, or 3 dimensions.
    pub fn raw_shape(&self) -> &[usize] {
        assert!(!self.is_empty(), "raw_shape() on empty tensor");
        &self.raw_shape
    }

    /// Read by physical flat offset (column-major order).
    ///
    /// # Panics
    /// Panics if `offset >= size()`.
    pub fn index(&self, offset: usize) -> f32 {
        assert!(offset < self.data.len(), "tensor index out of bound");
        self.data[offset]
    }

    /// Mutable access by physical flat offset.
    pub fn index_mut(&mut self, offset: usize) -> &mut f32 {
        assert!(offset < self.data.len(), "tensor index out of bound");
        &mut self.data[offset]
    }

    /// Read by logical CHW coordinates.
    ///
    /// # Panics
    /// Panics if any coordinate is out of range.
    pub fn at(&self, channel: usize, row: usize, col: usize) -> f32 {
        assert!(channel < self.channels, "channel out of range");
        assert!(row < self.rows, "row out of range");
        assert!(col < self.cols, "col out of range");
        self.data[channel * self.rows * self.cols + col * self.rows + row]
    }

    /// Mutable access by logical CHW coordinates.
    pub fn at_mut(&mut self, channel: usize, row: usize, col: usize) -> &mut f32 {
        assert!(channel < self.channels, "channel out of range");
        assert!(row < self.rows, "row out of range");
        assert!(col < self.cols, "col out of range");
        let offset = channel * self.rows * self.cols + col * self.rows + row;
        &mut self.data[offset]
    }

    /// One channel's 2-D plane, in physical (column-major) order.
    pub fn channel(&self, channel: usize) -> &[f32] {
        assert!(channel < self.channels, "channel out of range");
        let plane = self.rows * self.cols;
        &self.data[channel * plane..(channel + 1) * plane]
    }

    /// Mutable view of one channel's 2-D plane.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        assert!(channel < self.channels, "channel out of range");
        let plane = self.rows * self.cols;
        &mut self.data[channel * plane..(channel + 1) * plane]
    }

    /// The whole buffer in physical order.
    pub fn raw_data(&self) -> &[f32] {
        &self.data
    }

    // Whole-buffer assignment

    /// Fill every element with one value.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Fill from a flat value list.
    ///
    /// With `row_major` the input is read as one row-major (rows x cols)
    /// block per channel and transposed into the column-major layout;
    /// otherwise it is copied into the physical buffer verbatim. The value
    /// count must equal the element count.
    pub fn fill_with(&mut self, values: &[f32], row_major: bool) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(Error::ElementCountMismatch {
                expected: self.data.len(),
                got: values.len(),
            });
        }
        if row_major {
            let plane = self.rows * self.cols;
            for c in 0..self.channels {
                for r in 0..self.rows {
                    for w in 0..self.cols {
                        self.data[c * plane + w * self.rows + r] =
                            values[c * plane + r * self.cols + w];
                    }
                }
            }
        } else {
            self.data.copy_from_slice(values);
        }
        Ok(())
    }

    /// Extract all elements as a flat vector, the inverse of `fill_with`.
    pub fn values(&self, row_major: bool) -> Vec<f32> {
        assert!(!self.is_empty(), "values() on empty tensor");
        if !row_major {
            return self.data.clone();
        }
        let mut out = Vec::with_capacity(self.data.len());
        let plane = self.rows * self.cols;
        for c in 0..self.channels {
            for r in 0..self.rows {
                for w in 0..self.cols {
                    out.push(self.data[c * plane + w * self.rows + r]);
                }
            }
        }
        out
    }

    // In-place mutation

    /// Pad the spatial dims with a constant value.
    ///
    /// `pads` is `[left, right, top, bottom]`. A new buffer of shape
    /// `(rows + top + bottom, cols + left + right, channels)` is allocated,
    /// filled with `value`, and the original data is copied into the offset
    /// sub-region. There is no in-place variant.
    pub fn padding(&mut self, pads: &[usize], value: f32) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyTensor { op: "padding" });
        }
        if pads.len() != 4 {
            return Err(Error::msg(format!(
                "padding expects [left, right, top, bottom], got {} values",
                pads.len()
            )));
        }
        let (left, right, top, bottom) = (pads[0], pads[1], pads[2], pads[3]);
        let new_rows = self.rows + top + bottom;
        let new_cols = self.cols + left + right;

        let mut padded = Tensor::new(self.channels, new_rows, new_cols);
        padded.fill(value);
        for c in 0..self.channels {
            for w in 0..self.cols {
                for r in 0..self.rows {
                    *padded.at_mut(c, r + top, w + left) = self.at(c, r, w);
                }
            }
        }
        *self = padded;
        Ok(())
    }

    /// Reshape to a new 1-, 2-, or 3-dim logical shape.
    ///
    /// The total element count is invariant. With `row_major` the elements
    /// keep their logical row-major order across the reshape (extract, then
    /// refill); otherwise the physical buffer is reinterpreted as-is.
    pub fn reshape(&mut self, shape: &[usize], row_major: bool) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyTensor { op: "reshape" });
        }
        if shape.is_empty() || shape.len() > 3 {
            return Err(Error::msg(format!(
                "reshape target must have 1 to 3 dims, got {:?}",
                shape
            )));
        }
        let target: usize = shape.iter().product();
        if target != self.data.len() {
            return Err(Error::ElementCountMismatch {
                expected: self.data.len(),
                got: target,
            });
        }

        let saved = if row_major {
            Some(self.values(true))
        } else {
            None
        };

        match shape.len() {
            1 => {
                self.channels = 1;
                self.rows = 1;
                self.cols = shape[0];
            }
            2 => {
                self.channels = 1;
                self.rows = shape[0];
                self.cols = shape[1];
            }
            _ => {
                self.channels = shape[0];
                self.rows = shape[1];
                self.cols = shape[2];
            }
        }
        self.raw_shape = shape.to_vec();

        if let Some(values) = saved {
            self.fill_with(&values, true)?;
        }
        Ok(())
    }

    /// Collapse to one dimension: `reshape([size], row_major)`.
    pub fn flatten(&mut self, row_major: bool) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyTensor { op: "flatten" });
        }
        let size = self.data.len();
        self.reshape(&[size], row_major)
    }

    /// Apply an elementwise map in place.
    pub fn transform<F: Fn(f32) -> f32>(&mut self, f: F) {
        for v in self.data.iter_mut() {
            *v = f(*v);
        }
    }

    /// Fill with zeros.
    pub fn zero(&mut self) {
        self.fill(0.0);
    }

    /// Fill with ones.
    pub fn ones(&mut self) {
        self.fill(1.0);
    }

    /// Fill with uniform random values in [0, 1).
    pub fn rand(&mut self) {
        let mut rng = rand::thread_rng();
        for v in self.data.iter_mut() {
            *v = rng.gen::<f32>();
        }
    }

    /// Dump every channel plane to the log, row by row.
    pub fn show(&self) {
        for c in 0..self.channels {
            let mut plane = String::new();
            for r in 0..self.rows {
                let row: Vec<String> = (0..self.cols)
                    .map(|w| format!("{:.4}", self.at(c, r, w)))
                    .collect();
                plane.push_str(&row.join(" "));
                plane.push('\n');
            }
            log::debug!("channel {}:\n{}", c, plane);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_and_size() {
        let t = Tensor::new(3, 4, 5);
        assert_eq!(t.channels(), 3);
        assert_eq!(t.rows(), 4);
        assert_eq!(t.cols(), 5);
        assert_eq!(t.size(), 60);
        assert_eq!(t.shape(), [3, 4, 5]);
    }

    #[test]
    fn test_raw_shape_collapse() {
        assert_eq!(Tensor::new(1, 1, 7).raw_shape(), &[7]);
        assert_eq!(Tensor::new(1, 2, 3).raw_shape(), &[2, 3]);
        assert_eq!(Tensor::new(2, 2, 3).raw_shape(), &[2, 2, 3]);
        // 1-dim shape pads leading dims with 1
        let t = Tensor::from_shape(&[5]).unwrap();
        assert_eq!(t.shape(), [1, 1, 5]);
    }

    #[test]
    fn test_row_major_fill_transposes() {
        let mut t = Tensor::new(1, 2, 3);
        t.fill_with(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], true).unwrap();
        // logical view is row-major
        assert_eq!(t.at(0, 0, 0), 1.0);
        assert_eq!(t.at(0, 0, 2), 3.0);
        assert_eq!(t.at(0, 1, 0), 4.0);
        // physical layout is column-major
        assert_eq!(t.index(0), 1.0);
        assert_eq!(t.index(1), 4.0);
        assert_eq!(t.index(2), 2.0);
    }

    #[test]
    fn test_values_inverse_of_fill() {
        let vals: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let mut t = Tensor::new(2, 3, 4);
        t.fill_with(&vals, true).unwrap();
        assert_eq!(t.values(true), vals);

        let mut u = Tensor::new(2, 3, 4);
        u.fill_with(&vals, false).unwrap();
        assert_eq!(u.values(false), vals);
    }

    #[test]
    fn test_fill_count_mismatch() {
        let mut t = Tensor::new(1, 2, 2);
        let err = t.fill_with(&[1.0, 2.0], true).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::ElementCountMismatch { expected: 4, got: 2 }
        ));
    }

    #[test]
    fn test_reshape_preserves_row_major_order() {
        let vals: Vec<f32> = (1..=12).map(|v| v as f32).collect();
        let mut t = Tensor::new(2, 2, 3);
        t.fill_with(&vals, true).unwrap();
        t.reshape(&[3, 4], true).unwrap();
        assert_eq!(t.shape(), [1, 3, 4]);
        assert_eq!(t.raw_shape(), &[3, 4]);
        assert_eq!(t.values(true), vals);
    }

    #[test]
    fn test_reshape_count_invariant() {
        let mut t = Tensor::new(2, 2, 3);
        assert!(t.reshape(&[5], true).is_err());
    }

    #[test]
    fn test_flatten() {
        let vals: Vec<f32> = (1..=8).map(|v| v as f32).collect();
        let mut t = Tensor::new(2, 2, 2);
        t.fill_with(&vals, true).unwrap();
        t.flatten(true).unwrap();
        assert_eq!(t.raw_shape(), &[8]);
        assert_eq!(t.values(true), vals);
    }

    #[test]
    fn test_padding_preserves_interior() {
        let vals: Vec<f32> = (1..=6).map(|v| v as f32).collect();
        let mut t = Tensor::new(1, 2, 3);
        t.fill_with(&vals, true).unwrap();
        t.padding(&[1, 2, 1, 1], 9.0).unwrap();
        assert_eq!(t.shape(), [1, 4, 6]);
        // interior survives at the offset sub-region
        for r in 0..2 {
            for w in 0..3 {
                assert_eq!(t.at(0, r + 1, w + 1), vals[r * 3 + w]);
            }
        }
        // every border cell is the pad value
        for r in 0..4 {
            for w in 0..6 {
                let inside = (1..3).contains(&r) && (1..4).contains(&w);
                if !inside {
                    assert_eq!(t.at(0, r, w), 9.0);
                }
            }
        }
    }

    #[test]
    fn test_transform_threshold() {
        let mut t = Tensor::new(1, 1, 3);
        t.fill_with(&[-1.0, -2.0, 3.0], true).unwrap();
        t.transform(|v| if v > 0.0 { v } else { 0.0 });
        assert_eq!(t.values(true), vec![0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_channel_plane_view() {
        let mut t = Tensor::new(2, 2, 2);
        t.fill_with(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], true)
            .unwrap();
        // second channel, column-major: (r0c0, r1c0, r0c1, r1c1)
        assert_eq!(t.channel(1), &[5.0, 7.0, 6.0, 8.0]);
        t.channel_mut(1)[0] = 0.0;
        assert_eq!(t.at(1, 0, 0), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_bound_panics() {
        let t = Tensor::new(1, 1, 2);
        t.index(2);
    }
}
