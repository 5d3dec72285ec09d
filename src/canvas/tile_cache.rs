//! Per-style caches of rendered tile bitmaps.
//!
//! Tiles are indexed by `start_column / tile_width` in the virtual column space
//! of the current zoom. Each [`RenderingStyle`] owns a separate cache so that
//! e.g. selecting a region never evicts the normal tiles around it.

use crate::canvas::style::RenderingStyle;
use crate::canvas::surface::Bitmap;
use audiotile_core::block_cache::{BlockCache, BlockFactory};
use std::convert::Infallible;

/// Tiles per macroblock, as log2.
pub const TILE_MACROBLOCK_EXPONENT: u32 = 8;

/// Produces blank tile bitmaps; rendering into them is the provider's job.
pub struct TileFactory {
    pub width: u32,
    pub height: u32,
}

impl BlockFactory for TileFactory {
    type Block = Bitmap;
    type Error = Infallible;

    fn produce_block(&mut self, _index: usize) -> Result<Bitmap, Infallible> {
        Ok(Bitmap::new(self.width, self.height))
    }

    fn block_size(&self) -> usize {
        std::mem::size_of::<Bitmap>() + self.width as usize * self.height as usize * 3
    }
}

pub type TileCache = BlockCache<TileFactory>;

/// Number of tiles covering `columns` virtual columns.
pub fn tile_count_for(columns: usize, tile_width: u32) -> usize {
    columns.div_ceil(tile_width as usize)
}

pub struct TileCaches {
    caches: [TileCache; RenderingStyle::COUNT],
}

impl TileCaches {
    pub fn new(tile_width: u32, height: u32) -> Self {
        Self {
            caches: std::array::from_fn(|_| {
                BlockCache::new(0, TILE_MACROBLOCK_EXPONENT, TileFactory { width: tile_width, height })
            }),
        }
    }

    pub fn for_style(&mut self, style: RenderingStyle) -> &mut TileCache {
        &mut self.caches[style.index()]
    }

    pub fn get(&self, style: RenderingStyle) -> &TileCache {
        &self.caches[style.index()]
    }

    /// Resize every style's index space. Flushes all tiles.
    pub fn set_tile_count(&mut self, tiles: usize) {
        for cache in &mut self.caches {
            cache.set_block_count(tiles);
        }
    }

    pub fn set_tile_height(&mut self, height: u32) {
        for cache in &mut self.caches {
            cache.age(0);
            cache.factory_mut().height = height;
        }
    }

    pub fn invalidate(&mut self) {
        for cache in &mut self.caches {
            cache.age(0);
        }
    }

    pub fn live_bytes(&self) -> usize {
        self.caches.iter().map(BlockCache::live_bytes).sum()
    }
}
