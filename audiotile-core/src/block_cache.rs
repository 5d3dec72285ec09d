//! Generic cache of lazily produced, equally sized data blocks.
//!
//! The index space `[0, N)` is split into macroblocks of `2^k` consecutive
//! blocks. Every macroblock carries one access counter, which is the unit the
//! eviction pass reasons about:
//!
//! - `get` bumps the counter of the macroblock holding the block.
//! - `age` sorts macroblocks by counter (highest first, lowest index first on
//!   ties), keeps them until the byte budget is reached and halves every
//!   counter it walks past. Everything after the cut-off is disposed and its
//!   counter reset.
//!
//! Halving makes a once-hot region cool off over repeated aging passes
//! instead of staying pinned.
//!
//! Blocks are created and destroyed only through the cache's [`BlockFactory`].

/// Produces and disposes the blocks held by a [`BlockCache`].
pub trait BlockFactory {
    type Block;
    type Error;

    /// Create the block for index `index`.
    fn produce_block(&mut self, index: usize) -> Result<Self::Block, Self::Error>;

    /// Release a block previously returned by `produce_block`.
    fn dispose_block(&mut self, block: Self::Block) {
        drop(block);
    }

    /// Memory cost of one block in bytes. Must be the same for every block
    /// the factory produces until the cache is cleared.
    fn block_size(&self) -> usize;
}

struct MacroBlock<B> {
    access_count: u32,
    /// Empty until the first access, then exactly one macroblock long.
    blocks: Vec<Option<B>>,
}

impl<B> MacroBlock<B> {
    fn new() -> Self {
        Self { access_count: 0, blocks: Vec::new() }
    }

    fn live_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }
}

fn kill_macroblock<F: BlockFactory>(mb: &mut MacroBlock<F::Block>, factory: &mut F) -> usize {
    mb.access_count = 0;
    let mut killed = 0;
    for block in mb.blocks.drain(..).flatten() {
        factory.dispose_block(block);
        killed += 1;
    }
    killed
}

pub struct BlockCache<F: BlockFactory> {
    macroblocks: Vec<MacroBlock<F::Block>>,
    exponent: u32,
    factory: F,
}

impl<F: BlockFactory> BlockCache<F> {
    /// Create a cache able to hold `block_count` blocks, grouped into
    /// macroblocks of `2^macroblock_exponent` blocks.
    pub fn new(block_count: usize, macroblock_exponent: u32, factory: F) -> Self {
        let mut cache = Self {
            macroblocks: Vec::new(),
            exponent: macroblock_exponent,
            factory,
        };
        cache.set_block_count(block_count);
        cache
    }

    /// Blocks per macroblock.
    pub fn macroblock_size(&self) -> usize {
        1 << self.exponent
    }

    pub fn macroblock_count(&self) -> usize {
        self.macroblocks.len()
    }

    /// Size of the index space. Always a multiple of the macroblock size.
    pub fn len(&self) -> usize {
        self.macroblocks.len() << self.exponent
    }

    pub fn is_empty(&self) -> bool {
        self.macroblocks.is_empty()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Mutable access to the factory. Changing anything that affects the
    /// block size must be preceded by `age(0)`.
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Resize the index space to the smallest macroblock-aligned size that
    /// holds `block_count` blocks. A non-empty cache is flushed first.
    pub fn set_block_count(&mut self, block_count: usize) {
        if !self.macroblocks.is_empty() {
            self.age(0);
        }
        let size = self.macroblock_size();
        let count = block_count.div_ceil(size);
        self.macroblocks.clear();
        self.macroblocks.resize_with(count, MacroBlock::new);
    }

    /// Locate the slot for `index`, counting the access against its macroblock.
    fn slot(&mut self, index: usize) -> (&mut Option<F::Block>, &mut F) {
        debug_assert!(index < self.len(), "block index {index} out of range {}", self.len());
        let size = 1usize << self.exponent;
        let mb = &mut self.macroblocks[index >> self.exponent];
        mb.access_count = mb.access_count.saturating_add(1);
        if mb.blocks.is_empty() {
            mb.blocks.resize_with(size, || None);
        }
        (&mut mb.blocks[index & (size - 1)], &mut self.factory)
    }

    /// Return the block at `index`, producing it through the factory if absent.
    pub fn get(&mut self, index: usize) -> Result<&mut F::Block, F::Error> {
        self.get_created(index).map(|(block, _)| block)
    }

    /// Like [`get`](Self::get), also reporting whether the block was produced
    /// by this call.
    pub fn get_created(&mut self, index: usize) -> Result<(&mut F::Block, bool), F::Error> {
        let (slot, factory) = self.slot(index);
        let created = slot.is_none();
        let block = match slot.take() {
            Some(block) => block,
            None => factory.produce_block(index)?,
        };
        Ok((slot.insert(block), created))
    }

    /// Return the block at `index`. A freshly produced block is passed to
    /// `fill` before it is stored; if `fill` fails the block is disposed and
    /// the slot stays empty, so a half-built block never lands in the cache.
    pub fn get_with<E>(
        &mut self,
        index: usize,
        fill: impl FnOnce(usize, &mut F::Block) -> Result<(), E>,
    ) -> Result<(&mut F::Block, bool), E>
    where
        E: From<F::Error>,
    {
        let (slot, factory) = self.slot(index);
        if let Some(block) = slot.take() {
            return Ok((slot.insert(block), false));
        }
        let mut block = factory.produce_block(index)?;
        if let Err(e) = fill(index, &mut block) {
            factory.dispose_block(block);
            return Err(e);
        }
        log::trace!("block {index} produced");
        Ok((slot.insert(block), true))
    }

    /// Whether the block at `index` is currently cached. Does not count as an access.
    pub fn contains(&self, index: usize) -> bool {
        self.macroblocks
            .get(index >> self.exponent)
            .and_then(|mb| mb.blocks.get(index & (self.macroblock_size() - 1)))
            .is_some_and(|slot| slot.is_some())
    }

    /// Access counter of macroblock `macroblock`.
    pub fn access_count(&self, macroblock: usize) -> u32 {
        self.macroblocks.get(macroblock).map_or(0, |mb| mb.access_count)
    }

    pub fn live_blocks(&self) -> usize {
        self.macroblocks.iter().map(MacroBlock::live_blocks).sum()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_blocks() * self.factory.block_size()
    }

    /// Evict blocks until the cache holds roughly `max_bytes`.
    ///
    /// The budget is not a hard limit: the macroblock that crosses it is kept.
    /// `age(0)` disposes everything without sorting.
    pub fn age(&mut self, max_bytes: usize) {
        if max_bytes == 0 {
            let mut killed = 0;
            for mb in &mut self.macroblocks {
                killed += kill_macroblock(mb, &mut self.factory);
            }
            if killed > 0 {
                log::debug!("block cache flushed, {killed} blocks disposed");
            }
            return;
        }

        let mut order: Vec<usize> = (0..self.macroblocks.len()).collect();
        order.sort_by(|&a, &b| {
            self.macroblocks[b]
                .access_count
                .cmp(&self.macroblocks[a].access_count)
                .then(a.cmp(&b))
        });

        let block_size = self.factory.block_size();
        let mut kept_bytes = 0;
        let mut cut = 0;
        while cut < order.len() {
            let mb = &mut self.macroblocks[order[cut]];
            kept_bytes += mb.live_blocks() * block_size;
            mb.access_count /= 2;
            cut += 1;
            if kept_bytes >= max_bytes {
                break;
            }
        }

        let mut killed = 0;
        for &mbi in &order[cut..] {
            killed += kill_macroblock(&mut self.macroblocks[mbi], &mut self.factory);
        }
        if killed > 0 {
            log::debug!(
                "block cache aged to {max_bytes} bytes: kept {kept_bytes}, disposed {killed} blocks"
            );
        }
    }

    /// Move every live block to a new index space of `block_count` blocks.
    ///
    /// `map` translates an old index to its new one; blocks it maps to `None`
    /// or out of range are disposed. Access counters start over at zero.
    /// Returns the number of blocks kept.
    pub fn remap(&mut self, block_count: usize, mut map: impl FnMut(usize) -> Option<usize>) -> usize {
        let mut live = Vec::new();
        for (mbi, mb) in self.macroblocks.iter_mut().enumerate() {
            for (bi, slot) in mb.blocks.iter_mut().enumerate() {
                if let Some(block) = slot.take() {
                    live.push(((mbi << self.exponent) | bi, block));
                }
            }
        }

        let size = self.macroblock_size();
        self.macroblocks.clear();
        self.macroblocks.resize_with(block_count.div_ceil(size), MacroBlock::new);

        let mut kept = 0;
        for (old, block) in live {
            let Some(new) = map(old).filter(|&i| i < self.len()) else {
                self.factory.dispose_block(block);
                continue;
            };
            let mb = &mut self.macroblocks[new >> self.exponent];
            if mb.blocks.is_empty() {
                mb.blocks.resize_with(size, || None);
            }
            let slot = &mut mb.blocks[new & (size - 1)];
            if slot.is_some() {
                self.factory.dispose_block(block);
            } else {
                *slot = Some(block);
                kept += 1;
            }
        }
        kept
    }
}

impl<F: BlockFactory> Drop for BlockCache<F> {
    fn drop(&mut self) {
        self.age(0);
    }
}
