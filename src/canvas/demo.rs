use super::Canvas;
use crate::color::{BLUE, Color, ORANGE};
use crate::element::{ElementError, PenStyle};
use crate::geometry::Point;
use std::f64::consts::TAU;

const WAVE_SAMPLES: usize = 48;

/// Draws a fixed sample scene: two waves, a spiral and an eraser pass across
/// the first wave. Returns the number of strokes drawn.
pub fn draw_demo(canvas: &mut Canvas) -> Result<usize, ElementError> {
    let pen = canvas.pen();
    let strokes = [
        (pen, wave(Point::new(40.0, 120.0), 400.0, 40.0)),
        (
            PenStyle::marker(BLUE, pen.thickness * 1.5),
            wave(Point::new(40.0, 260.0), 400.0, -30.0),
        ),
        (
            PenStyle::marker(Color::new(ORANGE.r, ORANGE.g, ORANGE.b, 0.6), pen.thickness * 2.0),
            spiral(Point::new(620.0, 200.0), 120.0),
        ),
        (
            canvas.eraser(),
            vec![Point::new(220.0, 40.0), Point::new(230.0, 200.0)],
        ),
    ];

    let mut drawn = 0;
    for (style, points) in strokes {
        let Some((first, rest)) = points.split_first() else {
            continue;
        };
        canvas.begin_stroke(*first, &style)?;
        let Some((last, middle)) = rest.split_last() else {
            canvas.cancel_stroke();
            continue;
        };
        for point in middle {
            canvas.append_stroke(*point);
        }
        if canvas.end_stroke(*last).is_some() {
            drawn += 1;
        }
    }
    log::info!("Drew {} demo strokes", drawn);
    Ok(drawn)
}

fn wave(start: Point, length: f64, amplitude: f64) -> Vec<Point> {
    (0..=WAVE_SAMPLES)
        .map(|i| {
            let t = i as f64 / WAVE_SAMPLES as f64;
            Point::new(start.x + t * length, start.y + amplitude * (t * TAU).sin())
        })
        .collect()
}

fn spiral(center: Point, radius: f64) -> Vec<Point> {
    (0..=WAVE_SAMPLES * 2)
        .map(|i| {
            let t = i as f64 / (WAVE_SAMPLES * 2) as f64;
            let angle = t * 3.0 * TAU;
            Point::new(
                center.x + radius * t * angle.cos(),
                center.y + radius * t * angle.sin(),
            )
        })
        .collect()
}
