//! Pre-tiled lower factor supplied to the solve drivers
//!
//! The solve drivers accept `L` already in blocked layout and copy it into the
//! arena verbatim. `TiledFactor` owns that blocked storage together with its
//! descriptor, so the tile size used to build it travels with the data.

use crate::descriptor::MatrixDescriptor;
use crate::layout::TileLayout;
use crate::numeric::Scalar;
use crate::{Error, Result};

/// Unit lower-trapezoidal factor stored in blocked layout
#[derive(Debug, Clone, PartialEq)]
pub struct TiledFactor<T> {
    desc: MatrixDescriptor,
    tiles: Vec<T>,
}

impl<T: Scalar> TiledFactor<T> {
    /// An `m x k` factor whose leading `k x k` block is the identity
    pub fn identity(m: usize, k: usize, nb: usize) -> Result<Self> {
        let desc = MatrixDescriptor::new(m, k, nb)?;
        let layout = TileLayout::new(desc, m.max(1))?;
        let mut tiles = vec![T::zero(); desc.tiled_len()];
        for d in 0..m.min(k) {
            tiles[layout.tiled_index(d, d)] = T::one();
        }
        Ok(Self { desc, tiles })
    }

    /// Tile an `m x k` column-major factor with leading dimension `ld`
    pub fn from_lapack(m: usize, k: usize, flat: &[T], ld: usize, nb: usize) -> Result<Self> {
        let desc = MatrixDescriptor::new(m, k, nb)?;
        let layout = TileLayout::new(desc, ld)?;
        let mut tiles = vec![T::zero(); desc.tiled_len()];
        layout.to_tiled(flat, &mut tiles)?;
        Ok(Self { desc, tiles })
    }

    /// Adopt storage that is already in blocked layout
    pub fn from_tiles(desc: MatrixDescriptor, tiles: Vec<T>) -> Result<Self> {
        if desc.offset() != 0 {
            return Err(Error::Shape("factor descriptor must start at offset 0".to_string()));
        }
        if tiles.len() != desc.tiled_len() {
            return Err(Error::too_small("factor tiles", desc.tiled_len(), tiles.len()));
        }
        Ok(Self { desc, tiles })
    }

    /// Write the factor back to column-major storage with leading dimension `ld`
    pub fn to_lapack(&self, flat: &mut [T], ld: usize) -> Result<()> {
        TileLayout::new(self.desc, ld)?.from_tiled(&self.tiles, flat)
    }

    /// Element `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> T {
        let nb = self.desc.nb();
        let start = self.desc.tile_range(row / nb, col / nb).start;
        self.tiles[start + row % nb + (col % nb) * nb]
    }
}

impl<T> TiledFactor<T> {
    /// Blocked-layout descriptor
    pub fn descriptor(&self) -> &MatrixDescriptor {
        &self.desc
    }

    /// Tile edge length the factor was built with
    pub fn nb(&self) -> usize {
        self.desc.nb()
    }

    /// Blocked storage
    pub fn tiles(&self) -> &[T] {
        &self.tiles
    }

    /// Blocked storage, mutably
    pub fn tiles_mut(&mut self) -> &mut [T] {
        &mut self.tiles
    }
}
