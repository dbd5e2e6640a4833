use crate::core::raster::Raster;

/// Minimal bounding-box diff of a target raster against a base raster.
///
/// Inside the crop, pixels that differ hold the target's RGBA word and
/// everything else holds the (0,0,0,0) sentinel.
pub struct DiffCrop {
    pub left: u32,
    pub top: u32,
    pub crop: Raster,
}

/// Scan two same-size rasters and build the tightest crop enclosing every
/// differing pixel. Returns `None` when the rasters are pixel-identical.
pub fn diff_crop(base: &Raster, target: &Raster) -> Option<DiffCrop> {
    debug_assert_eq!(base.width(), target.width());
    debug_assert_eq!(base.height(), target.height());

    let width = base.width();
    let height = base.height();

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for y in 0..height {
        for x in 0..width {
            if base.pixel(x, y) != target.pixel(x, y) {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    if min_x == u32::MAX {
        return None;
    }

    let crop_w = max_x - min_x + 1;
    let crop_h = max_y - min_y + 1;
    let mut crop = Raster::zeroed(crop_w, crop_h);
    for y in 0..crop_h {
        for x in 0..crop_w {
            let sx = min_x + x;
            let sy = min_y + y;
            if base.pixel(sx, sy) != target.pixel(sx, sy) {
                crop.set_pixel(x, y, target.pixel(sx, sy));
            }
        }
    }

    Some(DiffCrop {
        left: min_x,
        top: min_y,
        crop,
    })
}

/// Overwrite base pixels under crop pixels whose alpha is non-zero. Zero
/// alpha is the "unchanged" sentinel and leaves the base pixel untouched.
/// The caller must have validated that the crop fits the base at (left, top).
pub fn composite_into(base: &mut Raster, crop: &Raster, left: u32, top: u32) {
    for y in 0..crop.height() {
        for x in 0..crop.width() {
            let px = crop.pixel(x, y);
            if px[3] != 0 {
                base.set_pixel(left + x, top + y, px);
            }
        }
    }
}
