use std::f64::consts::{FRAC_PI_2, TAU};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageBuffer, ImageEncoder, Rgb, RgbImage};

use sherlock_core::outcome::Row;

use super::{series, ChartError, ChartKind, ChartOptions, ChartSpec, Series};

const BACKGROUND: Rgb<u8> = Rgb([0x11, 0x11, 0x11]);
const GRID: Rgb<u8> = Rgb([0x33, 0x33, 0x33]);
const AXIS: Rgb<u8> = Rgb([0xcc, 0xcc, 0xcc]);
const TEXT: Rgb<u8> = Rgb([0xee, 0xee, 0xee]);
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([0x63, 0x6e, 0xfa]),
    Rgb([0xef, 0x55, 0x3b]),
    Rgb([0x00, 0xcc, 0x96]),
    Rgb([0xab, 0x63, 0xfa]),
    Rgb([0xff, 0xa1, 0x5a]),
    Rgb([0x19, 0xd3, 0xf3]),
    Rgb([0xff, 0x66, 0x92]),
    Rgb([0xb6, 0xe8, 0x80]),
];

// Plot area insets. The left inset holds y tick labels, the bottom one x labels.
const LEFT: i64 = 64;
const RIGHT: i64 = 24;
const TOP: i64 = 24;
const BOTTOM: i64 = 40;
const GRID_LINES: i64 = 5;
const GLYPH: i64 = 8;
const LEGEND_ROW: i64 = 16;

/// Draw `spec` against `rows` and encode the result as PNG bytes.
///
/// `x` supplies category labels for bar charts, positions (or ordered
/// categories) for line charts and the legend for pie charts. `y` must be
/// numeric.
pub fn render(spec: &ChartSpec, rows: &[Row], opts: &ChartOptions) -> Result<Vec<u8>, ChartError> {
    let data = series(rows, &spec.x, &spec.y)?;
    let mut canvas = Canvas::new(opts.clamped());

    match spec.kind {
        ChartKind::Bar => canvas.bars(&data),
        ChartKind::Line => canvas.line(&data),
        ChartKind::Pie => {
            if data.values.iter().any(|v| *v < 0.0) {
                return Err(ChartError::InvalidValues {
                    kind: spec.kind,
                    reason: "negative slice".into(),
                });
            }
            let total: f64 = data.values.iter().sum();
            if total <= 0.0 {
                return Err(ChartError::InvalidValues {
                    kind: spec.kind,
                    reason: "values sum to zero".into(),
                });
            }
            canvas.pie(&data, total);
        }
    }

    canvas.encode()
}

/// Compact tick text: integers without a fraction, small values with up to
/// two decimals.
fn tick_label(value: f64) -> String {
    if value.fract().abs() < 1e-9 || value.abs() >= 100.0 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Shorten `text` to at most `max_chars`, marking the cut with a trailing dot.
fn fit(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    match max_chars {
        0 => String::new(),
        n => {
            let mut out: String = text.chars().take(n - 1).collect();
            out.push('.');
            out
        }
    }
}

fn text_width(text: &str) -> i64 {
    text.chars().count() as i64 * GLYPH
}

struct Canvas {
    img: RgbImage,
}

/// Vertical mapping from data values to pixel rows inside the plot area.
struct Scale {
    lo: f64,
    span: f64,
    top: i64,
    height: i64,
}

impl Scale {
    fn new(values: &[f64], top: i64, height: i64) -> Self {
        let lo = values.iter().copied().fold(0.0_f64, f64::min);
        let hi = values.iter().copied().fold(0.0_f64, f64::max);
        let span = if hi - lo > f64::EPSILON { hi - lo } else { 1.0 };
        Self {
            lo,
            span,
            top,
            height,
        }
    }

    fn y(&self, value: f64) -> i64 {
        let frac = (value - self.lo) / self.span;
        self.top + self.height - (frac * self.height as f64).round() as i64
    }

    /// Data value at grid line `i`, counted from the top.
    fn grid_value(&self, i: i64) -> f64 {
        self.lo + self.span * (GRID_LINES - i) as f64 / GRID_LINES as f64
    }
}

impl Canvas {
    fn new(opts: ChartOptions) -> Self {
        Self {
            img: ImageBuffer::from_pixel(opts.width, opts.height, BACKGROUND),
        }
    }

    fn width(&self) -> i64 {
        i64::from(self.img.width())
    }

    fn height(&self) -> i64 {
        i64::from(self.img.height())
    }

    /// Plot area as (left, top, width, height).
    fn plot_area(&self) -> (i64, i64, i64, i64) {
        let w = (self.width() - LEFT - RIGHT).max(1);
        let h = (self.height() - TOP - BOTTOM).max(1);
        (LEFT, TOP, w, h)
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && x < self.width() && y < self.height() {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        let (x0, x1) = (x0.min(x1).max(0), x0.max(x1).min(self.width() - 1));
        let (y0, y1) = (y0.min(y1).max(0), y0.max(y1).min(self.height() - 1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.put(x, y, color);
            }
        }
    }

    fn segment(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = x0 as f64 + t * (x1 - x0) as f64;
            let y = y0 as f64 + t * (y1 - y0) as f64;
            let (x, y) = (x.round() as i64, y.round() as i64);
            self.put(x, y, color);
            self.put(x, y + 1, color);
        }
    }

    /// 8x8 bitmap text with its top-left corner at (`x`, `y`). Characters
    /// outside basic Latin are drawn as `?`.
    fn text(&mut self, x: i64, y: i64, text: &str, color: Rgb<u8>) {
        for (i, ch) in text.chars().enumerate() {
            let glyph = BASIC_FONTS
                .get(ch)
                .or_else(|| BASIC_FONTS.get('?'))
                .unwrap_or([0; 8]);
            let origin = x + i as i64 * GLYPH;
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8u32 {
                    if (bits >> col) & 1 == 1 {
                        self.put(origin + i64::from(col), y + row as i64, color);
                    }
                }
            }
        }
    }

    fn centered_text(&mut self, center_x: i64, y: i64, text: &str) {
        self.text(center_x - text_width(text) / 2, y, text, TEXT);
    }

    fn frame(&mut self, scale: &Scale) {
        let (left, top, w, h) = self.plot_area();
        let max_chars = ((LEFT - GLYPH) / GLYPH) as usize;
        for i in 0..=GRID_LINES {
            let y = top + h * i / GRID_LINES;
            self.fill_rect(left, y, left + w, y, GRID);
            let label = fit(&tick_label(scale.grid_value(i)), max_chars);
            self.text(left - 6 - text_width(&label), y - GLYPH / 2, &label, TEXT);
        }
        self.fill_rect(left, top, left, top + h, AXIS);
        let zero = scale.y(0.0);
        self.fill_rect(left, zero, left + w, zero, AXIS);
    }

    /// Labels under evenly spaced categories, thinned out when they would
    /// overlap.
    fn category_labels(&mut self, centers: &[i64], labels: &[String], slot: f64) {
        let (_, top, _, h) = self.plot_area();
        let step = ((3 * GLYPH) as f64 / slot.max(1.0)).ceil().max(1.0) as usize;
        let room = (slot * step as f64 / GLYPH as f64).floor() as usize;
        let max_chars = room.saturating_sub(1).max(1);
        let y = top + h + GLYPH;
        for i in (0..centers.len()).step_by(step) {
            let label = fit(&labels[i], max_chars);
            self.centered_text(centers[i], y, &label);
        }
    }

    fn bars(&mut self, data: &Series) {
        let (left, top, w, h) = self.plot_area();
        let scale = Scale::new(&data.values, top, h);
        self.frame(&scale);

        let slot = w as f64 / data.values.len() as f64;
        let zero = scale.y(0.0);
        let mut centers = Vec::with_capacity(data.values.len());
        for (i, value) in data.values.iter().enumerate() {
            let x0 = left + (slot * i as f64 + slot * 0.15).round() as i64;
            let x1 = left + (slot * (i + 1) as f64 - slot * 0.15).round() as i64;
            self.fill_rect(x0, zero, x1.max(x0), scale.y(*value), PALETTE[0]);
            centers.push(left + (slot * (i as f64 + 0.5)).round() as i64);
        }
        self.category_labels(&centers, &data.labels, slot);
    }

    fn line(&mut self, data: &Series) {
        let (left, top, w, h) = self.plot_area();
        let scale = Scale::new(&data.values, top, h);
        self.frame(&scale);

        let mut points: Vec<(i64, i64)> = match &data.positions {
            Some(xs) => {
                let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let span = hi - lo;
                let px = |x: f64| {
                    if span > f64::EPSILON {
                        left + ((x - lo) / span * w as f64).round() as i64
                    } else {
                        left + w / 2
                    }
                };

                let tick_y = top + h + GLYPH;
                if span > f64::EPSILON {
                    for i in 0..=GRID_LINES {
                        let value = lo + span * i as f64 / GRID_LINES as f64;
                        self.fill_rect(px(value), top + h, px(value), top + h + 3, AXIS);
                        self.centered_text(px(value), tick_y, &tick_label(value));
                    }
                } else {
                    self.centered_text(left + w / 2, tick_y, &tick_label(lo));
                }

                xs.iter()
                    .zip(&data.values)
                    .map(|(x, value)| (px(*x), scale.y(*value)))
                    .collect()
            }
            None => {
                let n = data.values.len();
                let slot = if n > 1 { w as f64 / (n - 1) as f64 } else { w as f64 };
                let points: Vec<(i64, i64)> = data
                    .values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let x = if n == 1 {
                            left + w / 2
                        } else {
                            left + (slot * i as f64).round() as i64
                        };
                        (x, scale.y(*value))
                    })
                    .collect();
                let centers: Vec<i64> = points.iter().map(|(x, _)| *x).collect();
                self.category_labels(&centers, &data.labels, slot);
                points
            }
        };

        // Numeric x may arrive in any order; the line follows x.
        points.sort_by_key(|(x, _)| *x);
        for pair in points.windows(2) {
            self.segment(pair[0], pair[1], PALETTE[0]);
        }
        for (x, y) in points {
            self.fill_rect(x - 3, y - 3, x + 3, y + 3, PALETTE[1]);
        }
    }

    fn pie(&mut self, data: &Series, total: f64) {
        let pad = TOP;
        let legend_w = (self.width() / 3).clamp(10 * GLYPH, 30 * GLYPH);
        let pie_w = (self.width() - legend_w - 3 * pad).max(2);
        let radius = (pie_w.min(self.height() - 2 * pad) / 2).max(1);
        let (cx, cy) = (pad + pie_w / 2, self.height() / 2);

        // Cumulative slice boundaries as fractions of a full turn.
        let mut bounds = Vec::with_capacity(data.values.len());
        let mut acc = 0.0;
        for value in &data.values {
            acc += value / total;
            bounds.push(acc);
        }

        for y in (cy - radius)..=(cy + radius) {
            for x in (cx - radius)..=(cx + radius) {
                let (dx, dy) = ((x - cx) as f64, (y - cy) as f64);
                if dx * dx + dy * dy > (radius * radius) as f64 {
                    continue;
                }
                // Clockwise from twelve o'clock.
                let angle = (dy.atan2(dx) + FRAC_PI_2).rem_euclid(TAU);
                let frac = angle / TAU;
                let slice = bounds
                    .iter()
                    .position(|b| frac < *b)
                    .unwrap_or(data.values.len() - 1);
                self.put(x, y, PALETTE[slice % PALETTE.len()]);
            }
        }

        self.legend(2 * pad + pie_w, pad, legend_w, &data.labels);
    }

    fn legend(&mut self, x: i64, top: i64, width: i64, labels: &[String]) {
        let rows = ((self.height() - 2 * top) / LEGEND_ROW).max(1) as usize;
        let max_chars = ((width - 2 * GLYPH) / GLYPH).max(1) as usize;
        let shown = if labels.len() > rows { rows - 1 } else { labels.len() };

        for (i, label) in labels.iter().take(shown).enumerate() {
            let y = top + i as i64 * LEGEND_ROW;
            self.fill_rect(x, y, x + GLYPH - 1, y + GLYPH - 1, PALETTE[i % PALETTE.len()]);
            self.text(x + 2 * GLYPH, y, &fit(label, max_chars), TEXT);
        }
        if shown < labels.len() {
            let y = top + shown as i64 * LEGEND_ROW;
            let more = format!("+{} more", labels.len() - shown);
            self.text(x + 2 * GLYPH, y, &fit(&more, max_chars), TEXT);
        }
    }

    fn encode(self) -> Result<Vec<u8>, ChartError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                self.img.as_raw(),
                self.img.width(),
                self.img.height(),
                ColorType::Rgb8,
            )
            .map_err(|e| ChartError::Encode(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn country_rows() -> Vec<Row> {
        [
            ("USA", 28.71),
            ("France", 19.8),
            ("Germany", 18.81),
            ("Canada", 17.82),
            ("UK", 9.9),
        ]
        .iter()
        .enumerate()
        .map(|(i, (c, t))| {
            json!({"country": c, "rank": i + 1, "total_sales": t})
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect()
    }

    fn spec(kind: ChartKind) -> ChartSpec {
        spec_x(kind, "country")
    }

    fn spec_x(kind: ChartKind, x: &str) -> ChartSpec {
        ChartSpec {
            kind,
            x: x.into(),
            y: "total_sales".into(),
        }
    }

    fn decode(bytes: &[u8]) -> RgbImage {
        image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .unwrap()
            .to_rgb8()
    }

    fn count_color(img: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) -> usize {
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .filter(|(x, y)| *img.get_pixel(*x, *y) == color)
            .count()
    }

    #[test]
    fn every_kind_renders_a_png() {
        for kind in [ChartKind::Bar, ChartKind::Line, ChartKind::Pie] {
            let bytes = render(&spec(kind), &country_rows(), &ChartOptions::default()).unwrap();
            assert_eq!(bytes[..8], PNG_MAGIC, "kind: {kind}");
            let img = decode(&bytes);
            assert_eq!(img.dimensions(), (800, 500));
            assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
        }
    }

    #[test]
    fn bar_uses_palette_inside_plot_area() {
        let bytes =
            render(&spec(ChartKind::Bar), &country_rows(), &ChartOptions::default()).unwrap();
        let img = decode(&bytes);
        // Middle of the first bar's slot, just above the zero line.
        let slot = (800 - LEFT - RIGHT) / 5;
        let x = (LEFT + slot / 2) as u32;
        let y = (500 - BOTTOM - 5) as u32;
        assert_eq!(*img.get_pixel(x, y), PALETTE[0]);
    }

    #[test]
    fn bar_draws_category_labels_below_plot() {
        let bytes =
            render(&spec(ChartKind::Bar), &country_rows(), &ChartOptions::default()).unwrap();
        let img = decode(&bytes);
        let label_band = count_color(&img, LEFT as u32, 460, 800, 500, TEXT);
        assert!(label_band > 0, "no label pixels under the bars");
    }

    #[test]
    fn pie_draws_legend() {
        let bytes =
            render(&spec(ChartKind::Pie), &country_rows(), &ChartOptions::default()).unwrap();
        let img = decode(&bytes);
        // Legend sits in the right third.
        assert!(count_color(&img, 540, 0, 800, 500, TEXT) > 0);
        assert!(count_color(&img, 540, 0, 800, 500, PALETTE[4]) > 0);
    }

    #[test]
    fn x_column_changes_the_image() {
        let rows = country_rows();
        let opts = ChartOptions::default();
        for kind in [ChartKind::Bar, ChartKind::Line, ChartKind::Pie] {
            let by_country = render(&spec_x(kind, "country"), &rows, &opts).unwrap();
            let by_rank = render(&spec_x(kind, "rank"), &rows, &opts).unwrap();
            let by_sales = render(&spec_x(kind, "total_sales"), &rows, &opts).unwrap();
            assert_ne!(by_country, by_rank, "kind: {kind}");
            assert_ne!(by_country, by_sales, "kind: {kind}");
        }
    }

    #[test]
    fn line_places_numeric_x_by_value() {
        // Same y values, x spacing differs: 1,2,3 versus 1,2,10.
        let rows = |xs: [i64; 3]| -> Vec<Row> {
            xs.iter()
                .map(|x| json!({"x": x, "y": 5}).as_object().cloned().unwrap())
                .collect()
        };
        let spec = ChartSpec {
            kind: ChartKind::Line,
            x: "x".into(),
            y: "y".into(),
        };
        let opts = ChartOptions::default();
        let even = decode(&render(&spec, &rows([1, 2, 3]), &opts).unwrap());
        let skewed = decode(&render(&spec, &rows([1, 2, 10]), &opts).unwrap());

        // The middle marker sits at the plot's horizontal centre only when
        // the x values are evenly spaced.
        let (left, w) = (LEFT as u32, (800 - LEFT - RIGHT) as u32);
        let y = (TOP + 1) as u32;
        let mid = left + w / 2;
        assert_eq!(*even.get_pixel(mid, y), PALETTE[1]);
        assert_ne!(*skewed.get_pixel(mid, y), PALETTE[1]);
    }

    #[test]
    fn oversized_options_are_clamped_not_fatal() {
        let opts = ChartOptions {
            width: u32::MAX,
            height: 120,
        };
        let bytes = render(&spec(ChartKind::Bar), &country_rows(), &opts).unwrap();
        assert_eq!(decode(&bytes).dimensions(), (ChartOptions::MAX_SIDE, 120));

        let opts = ChartOptions {
            width: 0,
            height: u32::MAX,
        };
        let bytes = render(&spec(ChartKind::Bar), &country_rows(), &opts).unwrap();
        assert_eq!(decode(&bytes).dimensions(), (ChartOptions::MIN_SIDE, ChartOptions::MAX_SIDE));
    }

    #[test]
    fn pie_rejects_negative_values() {
        let rows = vec![
            json!({"country": "A", "total_sales": 3}).as_object().cloned().unwrap(),
            json!({"country": "B", "total_sales": -1}).as_object().cloned().unwrap(),
        ];
        assert!(matches!(
            render(&spec(ChartKind::Pie), &rows, &ChartOptions::default()),
            Err(ChartError::InvalidValues { kind: ChartKind::Pie, .. })
        ));
    }

    #[test]
    fn pie_rejects_zero_total() {
        let rows = vec![json!({"country": "A", "total_sales": 0}).as_object().cloned().unwrap()];
        assert!(matches!(
            render(&spec(ChartKind::Pie), &rows, &ChartOptions::default()),
            Err(ChartError::InvalidValues { .. })
        ));
    }

    #[test]
    fn unknown_column_fails_before_drawing() {
        let bad = ChartSpec {
            kind: ChartKind::Bar,
            x: "country".into(),
            y: "revenue".into(),
        };
        assert!(matches!(
            render(&bad, &country_rows(), &ChartOptions::default()),
            Err(ChartError::UnknownColumn(c)) if c == "revenue"
        ));
    }

    #[test]
    fn negative_bars_and_single_point_lines_render() {
        let rows = vec![json!({"country": "A", "total_sales": -4.5}).as_object().cloned().unwrap()];
        let opts = ChartOptions {
            width: 200,
            height: 120,
        };
        assert!(render(&spec(ChartKind::Bar), &rows, &opts).is_ok());
        assert!(render(&spec(ChartKind::Line), &rows, &opts).is_ok());
    }

    #[test]
    fn labels_are_fitted() {
        assert_eq!(fit("Germany", 10), "Germany");
        assert_eq!(fit("Germany", 4), "Ger.");
        assert_eq!(fit("Germany", 0), "");
        assert_eq!(tick_label(28.71), "28.71");
        assert_eq!(tick_label(19.80), "19.8");
        assert_eq!(tick_label(8.0), "8");
        assert_eq!(tick_label(1234.4), "1234");
    }
}
