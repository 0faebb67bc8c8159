//! Launch geometry for the bilateral kernel.

use bilat_device::NdRange;

/// Work-group width.
pub const THREADS_X: usize = 16;
/// Work-group height.
pub const THREADS_Y: usize = 16;

/// Largest filter half-width; wider windows are clamped to it.
///
/// Keeps the halo tile within `(16 + 2 * 64)^2` elements.
pub const MAX_FILTER_RADIUS: usize = 64;

/// Half-width of the filter window for a spatial sigma.
///
/// Rounds `1.5 * sigma` into `1..=MAX_FILTER_RADIUS`. A NaN or negative
/// sigma yields 1, an infinite one [`MAX_FILTER_RADIUS`].
pub fn filter_radius(spatial_sigma: f32) -> usize {
    let radius = (1.5 * spatial_sigma).round();
    if radius >= 1.0 { radius.min(MAX_FILTER_RADIUS as f32) as usize } else { 1 }
}

/// Grid and shared-memory sizing for one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchPlan {
    pub tile: [usize; 2],
    /// Tiles along dims[0] and dims[1].
    pub blocks: [usize; 2],
    /// Tile columns times the folded batch dimensions.
    pub batch_count: usize,
    pub global: [usize; 2],
    pub radius: usize,
    /// Elements in the halo-padded input tile.
    pub shared_tile_elems: usize,
    /// Elements in the spatial weight table.
    pub shared_weight_elems: usize,
}

impl LaunchPlan {
    /// Plan a launch over `dims`.
    ///
    /// dims[2] always folds into the x extent of the grid; dims[3] folds in
    /// only for color input. Non-positive extents produce an empty grid; a
    /// batch too large to address saturates and is refused by the device.
    pub fn new(dims: &[i64; 4], is_color: bool, spatial_sigma: f32) -> Self {
        let extent = |axis: usize| dims[axis].max(0) as usize;

        let blk_x = extent(0).div_ceil(THREADS_X);
        let blk_y = extent(1).div_ceil(THREADS_Y);
        let mut batch_count = blk_x.saturating_mul(extent(2));
        if is_color {
            batch_count = batch_count.saturating_mul(extent(3));
        }

        let radius = filter_radius(spatial_sigma);
        let padded = THREADS_X + 2 * radius;
        let window = 2 * radius + 1;

        Self {
            tile: [THREADS_X, THREADS_Y],
            blocks: [blk_x, blk_y],
            batch_count,
            global: [batch_count.saturating_mul(THREADS_X), blk_y * THREADS_Y],
            radius,
            shared_tile_elems: padded * padded,
            shared_weight_elems: window * window,
        }
    }

    pub fn range(&self) -> NdRange {
        NdRange::new_2d(self.global, self.tile)
    }

    pub fn is_empty(&self) -> bool {
        self.global[0] == 0 || self.global[1] == 0
    }

    pub fn shared_tile_bytes(&self, elem_size: usize) -> usize {
        self.shared_tile_elems * elem_size
    }

    pub fn shared_weight_bytes(&self, elem_size: usize) -> usize {
        self.shared_weight_elems * elem_size
    }
}
