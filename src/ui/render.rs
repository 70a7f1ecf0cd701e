use crate::loader::DecodedImage;
use crate::viewport::{self, Point};

/// Canvas color around images smaller than the window.
pub const BG_COLOR: u32 = 0x1f1f1f;

pub fn fill(buf: &mut [u32], color: u32) {
    buf.fill(color);
}

/// Copy the part of `img` starting at `origin` into a `dst_w` x `dst_h`
/// framebuffer. Images narrower than the canvas are centered on that axis.
/// `origin` must already be clamped.
pub fn blit_region(dst: &mut [u32], dst_w: u32, dst_h: u32, img: &DecodedImage, origin: Point) {
    let (mx, my) = viewport::center(dst_w, dst_h, img.width, img.height);
    let sx = origin.x.max(0) as u32;
    let sy = origin.y.max(0) as u32;

    let cols = img.width.saturating_sub(sx).min(dst_w - mx) as usize;
    let rows = img.height.saturating_sub(sy).min(dst_h - my);
    if cols == 0 {
        return;
    }

    for row in 0..rows {
        let src_off = ((sy + row) as usize) * img.width as usize + sx as usize;
        let dst_off = ((my + row) as usize) * dst_w as usize + mx as usize;
        let (Some(src), Some(out)) = (
            img.pixels.get(src_off..src_off + cols),
            dst.get_mut(dst_off..dst_off + cols),
        ) else {
            break;
        };
        out.copy_from_slice(src);
    }
}
