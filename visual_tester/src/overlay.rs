use burrow_vision::BurrowPipeline;
use burrow_vision::core_modules::ground::GroundProfile;
use geo::Coord;
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::path::Path;
use tracing::error;

const GROUND_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const MASK_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const BURROW_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Opacity of the mask tint, out of 255.
const MASK_STRENGTH: u16 = 64;

/// Draws the current analysis state on top of `frame`.
///
/// The ground profile is drawn in yellow with its points marked, the burrow mask
/// is tinted blue and every active burrow is outlined in red.
pub fn render(pipeline: &BurrowPipeline, frame: &GrayImage, ground: &GroundProfile) -> RgbImage {
    let mask = pipeline.mask();
    let mut canvas = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let value = frame.get_pixel(x, y)[0];
        let pixel = Rgb([value; 3]);
        if mask.is_set(x, y) {
            tint(pixel, MASK_COLOR)
        } else {
            pixel
        }
    });

    draw_polyline(&mut canvas, ground.points(), GROUND_COLOR);
    for point in ground.points() {
        let center = (point.x.round() as i32, point.y.round() as i32);
        draw_filled_circle_mut(&mut canvas, center, 2, GROUND_COLOR);
    }

    for burrow in pipeline.active_burrows() {
        draw_polyline(&mut canvas, burrow.points(), BURROW_COLOR);
    }
    canvas
}

/// Writes an overlay; failures are logged and never abort the analysis.
pub fn save(canvas: &RgbImage, path: &Path) {
    if let Err(err) = canvas.save(path) {
        error!(%err, "failed to write debug frame {}", path.display());
    }
}

fn tint(pixel: Rgb<u8>, color: Rgb<u8>) -> Rgb<u8> {
    let mut out = pixel;
    for (channel, &target) in out.0.iter_mut().zip(&color.0) {
        let blended = (*channel as u16 * (255 - MASK_STRENGTH) + target as u16 * MASK_STRENGTH) / 255;
        *channel = blended as u8;
    }
    out
}

fn draw_polyline(canvas: &mut RgbImage, points: &[Coord<f64>], color: Rgb<u8>) {
    for pair in points.windows(2) {
        let start = (pair[0].x as f32, pair[0].y as f32);
        let end = (pair[1].x as f32, pair[1].y as f32);
        draw_line_segment_mut(canvas, start, end, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_vision::{ColorStats, PipelineConfig};
    use image::Luma;

    #[test]
    fn overlay_marks_the_ground_line() {
        let colors = ColorStats {
            sand_mean: 100.0,
            sand_std: 5.0,
            sky_mean: 200.0,
            sky_std: 5.0,
        };
        let pipeline = BurrowPipeline::new(PipelineConfig::default(), colors, 40, 30).unwrap();
        let frame = GrayImage::from_pixel(40, 30, Luma([100]));
        let ground = GroundProfile::flat(10.0, 40);

        let canvas = render(&pipeline, &frame, &ground);
        assert_eq!(canvas.dimensions(), (40, 30));
        assert_eq!(*canvas.get_pixel(20, 10), GROUND_COLOR);
        assert_eq!(*canvas.get_pixel(20, 20), Rgb([100, 100, 100]));
    }

    #[test]
    fn tint_blends_towards_the_mask_color() {
        assert_eq!(tint(Rgb([255, 255, 255]), MASK_COLOR), Rgb([191, 191, 255]));
        assert_eq!(tint(Rgb([0, 0, 0]), MASK_COLOR), Rgb([0, 0, 64]));
    }
}
