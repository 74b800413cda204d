//! Binarization and horizontal morphology on grayscale pages.

use image::GrayImage;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Adaptive mean thresholding with inverted polarity.
///
/// For each pixel the mean over a `block_size x block_size` window is taken
/// from an integral image; the pixel becomes foreground (255) when it is at
/// or below `mean - c`, so dark text on light paper ends up white.
pub fn adaptive_threshold_inv(gray: &GrayImage, block_size: u32, c: f64) -> GrayImage {
    let (w, h) = gray.dimensions();
    let (w, h) = (w as usize, h as usize);
    let mut out = GrayImage::new(w as u32, h as u32);
    if w == 0 || h == 0 {
        return out;
    }

    let src = gray.as_raw();
    let iw = w + 1;
    let mut integral = vec![0i64; iw * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0i64;
        for x in 0..w {
            row_sum += src[y * w + x] as i64;
            integral[(y + 1) * iw + (x + 1)] = row_sum + integral[y * iw + (x + 1)];
        }
    }

    let half = (block_size.max(3) / 2) as isize;
    let dst: &mut [u8] = &mut out;
    for y in 0..h {
        let y0 = (y as isize - half).max(0) as usize;
        let y1 = ((y as isize + half).min(h as isize - 1) + 1) as usize;
        for x in 0..w {
            let x0 = (x as isize - half).max(0) as usize;
            let x1 = ((x as isize + half).min(w as isize - 1) + 1) as usize;

            let area = ((y1 - y0) * (x1 - x0)) as f64;
            let sum = integral[y1 * iw + x1] - integral[y0 * iw + x1] - integral[y1 * iw + x0]
                + integral[y0 * iw + x0];
            let threshold = sum as f64 / area - c;

            dst[y * w + x] = if (src[y * w + x] as f64) <= threshold {
                FOREGROUND
            } else {
                BACKGROUND
            };
        }
    }
    out
}

/// Sliding-window horizontal dilation: a pixel is set when any pixel of the
/// `kernel_w` wide window centred on it is set.
pub fn dilate_horizontal(input: &GrayImage, kernel_w: u32) -> GrayImage {
    horizontal_window(input, kernel_w, |count, _| count > 0)
}

/// Sliding-window horizontal erosion: a pixel stays set only when every
/// in-bounds pixel of the window is set.
pub fn erode_horizontal(input: &GrayImage, kernel_w: u32) -> GrayImage {
    horizontal_window(input, kernel_w, |count, window| count == window)
}

/// Closing (dilate then erode) with a `kernel_w x 1` structuring element.
///
/// Bridges the gaps between characters and words of one text line without
/// merging vertically adjacent lines.
pub fn close_horizontal(input: &GrayImage, kernel_w: u32) -> GrayImage {
    erode_horizontal(&dilate_horizontal(input, kernel_w), kernel_w)
}

fn horizontal_window<F>(input: &GrayImage, kernel_w: u32, keep: F) -> GrayImage
where
    F: Fn(usize, usize) -> bool,
{
    let (w, h) = input.dimensions();
    if kernel_w <= 1 || w == 0 {
        return input.clone();
    }
    let (w, h) = (w as usize, h as usize);
    let r_left = (kernel_w as usize - 1) / 2;
    let r_right = kernel_w as usize / 2;

    let src = input.as_raw();
    let mut out = GrayImage::new(w as u32, h as u32);
    let dst: &mut [u8] = &mut out;

    for y in 0..h {
        let row = y * w;
        let mut count = 0usize;
        for x in 0..=r_right.min(w - 1) {
            if src[row + x] > 0 {
                count += 1;
            }
        }

        for x in 0..w {
            let lo = x.saturating_sub(r_left);
            let hi = (x + r_right).min(w - 1);
            let window = hi - lo + 1;
            dst[row + x] = if keep(count, window) {
                FOREGROUND
            } else {
                BACKGROUND
            };

            let enter = x + r_right + 1;
            if enter < w && src[row + enter] > 0 {
                count += 1;
            }
            if x >= r_left && src[row + x - r_left] > 0 {
                count -= 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn row_image(pixels: &[u8]) -> GrayImage {
        GrayImage::from_raw(pixels.len() as u32, 1, pixels.to_vec()).unwrap()
    }

    #[test]
    fn test_threshold_marks_dark_bar_as_foreground() {
        let mut gray = GrayImage::from_pixel(60, 60, Luma([255]));
        for y in 25..35 {
            for x in 10..50 {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        let bin = adaptive_threshold_inv(&gray, 25, 10.0);
        assert_eq!(bin.get_pixel(30, 30)[0], 255);
        assert_eq!(bin.get_pixel(30, 5)[0], 0);
    }

    #[test]
    fn test_uniform_page_has_no_foreground() {
        let gray = GrayImage::from_pixel(40, 40, Luma([200]));
        let bin = adaptive_threshold_inv(&gray, 15, 10.0);
        assert!(bin.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_close_bridges_small_gap() {
        let input = row_image(&[0, 255, 255, 0, 0, 255, 255, 0, 0, 0, 0, 0]);
        let closed = close_horizontal(&input, 5);
        assert_eq!(closed.get_pixel(3, 0)[0], 255);
        assert_eq!(closed.get_pixel(4, 0)[0], 255);
        assert_eq!(closed.get_pixel(10, 0)[0], 0);
    }

    #[test]
    fn test_dilate_grows_single_pixel() {
        let input = row_image(&[0, 0, 0, 255, 0, 0, 0]);
        let dilated = dilate_horizontal(&input, 3);
        let set: Vec<u8> = dilated.pixels().map(|p| p[0]).collect();
        assert_eq!(set, vec![0, 0, 255, 255, 255, 0, 0]);
    }
}
