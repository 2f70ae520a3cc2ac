//! Decoder for GSI text elevation tiles.
//!
//! A tile is 256 lines of 256 comma-separated cells, north row first. Each
//! cell is a decimal elevation in metres or the no-data token `e`. Leading
//! and trailing whitespace around the whole body and around each cell is
//! ignored.

use crate::coord::TILE_SIZE;
use crate::DecodeError;
use std::fmt;

/// Cell text marking a missing sample.
pub const NO_DATA_TOKEN: &str = "e";

const SAMPLE_COUNT: usize = TILE_SIZE * TILE_SIZE;

/// Decoded 256 x 256 tile, row-major. Missing samples are NaN.
#[derive(Clone, PartialEq)]
pub struct TileSample {
    data: Box<[f32]>,
}

impl TileSample {
    /// Wrap a buffer of exactly 256 x 256 samples.
    pub fn from_vec(data: Vec<f32>) -> Result<Self, DecodeError> {
        if data.len() != SAMPLE_COUNT {
            return Err(DecodeError::SampleCount {
                expected: SAMPLE_COUNT,
                found: data.len(),
            });
        }
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    /// A tile with every sample equal to `value`.
    pub fn filled(value: f32) -> Self {
        Self {
            data: vec![value; SAMPLE_COUNT].into_boxed_slice(),
        }
    }

    /// A tile whose sample at (row, col) is `f(row, col)`.
    pub fn from_fn(f: impl Fn(usize, usize) -> f32) -> Self {
        let data: Vec<f32> = (0..SAMPLE_COUNT)
            .map(|i| f(i / TILE_SIZE, i % TILE_SIZE))
            .collect();
        Self {
            data: data.into_boxed_slice(),
        }
    }

    /// Sample at (row, col), or `None` outside the tile.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= TILE_SIZE || col >= TILE_SIZE {
            return None;
        }
        Some(self.data[row * TILE_SIZE + col])
    }

    /// One row of samples.
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * TILE_SIZE..(row + 1) * TILE_SIZE]
    }

    /// All samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of non-missing samples.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Render in the text tile format, writing missing samples as `e`.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(SAMPLE_COUNT * 7);
        for row in self.data.chunks(TILE_SIZE) {
            for (col, value) in row.iter().enumerate() {
                if col > 0 {
                    out.push(',');
                }
                if value.is_nan() {
                    out.push_str(NO_DATA_TOKEN);
                } else {
                    out.push_str(&value.to_string());
                }
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for TileSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSample")
            .field("valid", &self.valid_count())
            .field("missing", &(SAMPLE_COUNT - self.valid_count()))
            .finish()
    }
}

/// Parse a text tile.
///
/// Fails unless there are exactly 256 rows of exactly 256 cells, each a
/// number or `e`.
pub fn decode_tile(text: &str) -> Result<TileSample, DecodeError> {
    let text = text.trim();
    let mut data = Vec::with_capacity(SAMPLE_COUNT);
    let mut rows = 0;

    for (row, line) in text.lines().enumerate() {
        if row >= TILE_SIZE {
            return Err(DecodeError::RowCount {
                expected: TILE_SIZE,
                found: text.lines().count(),
            });
        }

        let mut cols = 0;
        for (col, token) in line.split(',').enumerate() {
            if col >= TILE_SIZE {
                return Err(DecodeError::ColumnCount {
                    row,
                    expected: TILE_SIZE,
                    found: line.split(',').count(),
                });
            }
            let value = parse_cell(token).ok_or_else(|| DecodeError::InvalidCell {
                row,
                col,
                token: token.to_string(),
            })?;
            data.push(value);
            cols += 1;
        }
        if cols != TILE_SIZE {
            return Err(DecodeError::ColumnCount {
                row,
                expected: TILE_SIZE,
                found: cols,
            });
        }
        rows += 1;
    }

    if rows != TILE_SIZE {
        return Err(DecodeError::RowCount {
            expected: TILE_SIZE,
            found: rows,
        });
    }
    TileSample::from_vec(data)
}

fn parse_cell(token: &str) -> Option<f32> {
    let token = token.trim();
    if token == NO_DATA_TOKEN {
        return Some(f32::NAN);
    }
    token.parse().ok()
}
