//! Rasterizing symbols into styled PNG images.
//!
//! A symbol is scaled to `box_size` pixels per module, padded by a quiet zone of light modules,
//! drawn in one of the [`Style`]s and framed by a decorative border.

use std::io::Cursor;

use image::{imageops, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::qrcode::QrCode;

/// Far end of every gradient.
const GRADIENT_END: Rgb<u8> = Rgb([0, 0, 255]);

/// How dark modules (and the border) are drawn.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Style {
    /// Solid squares.
    #[default]
    Basic,
    /// Squares with rounded outer corners.
    Rounded,
    /// One dot per module.
    Circles,
    /// Left-to-right gradient.
    Gradient,
    /// Top-to-bottom gradient.
    GradientVertical,
    /// Gradient from the center outwards.
    GradientRadial,
}

impl Style {
    pub const ALL: [Style; 6] = [
        Style::Basic,
        Style::Rounded,
        Style::Circles,
        Style::Gradient,
        Style::GradientVertical,
        Style::GradientRadial,
    ];

    /// Maps a query-string tag to a style. Unknown tags draw the basic style.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "rounded" => Style::Rounded,
            "circles" => Style::Circles,
            "gradient" => Style::Gradient,
            "gradient_vertical" => Style::GradientVertical,
            "gradient_radial" => Style::GradientRadial,
            _ => Style::Basic,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Style::Basic => "basic",
            Style::Rounded => "rounded",
            Style::Circles => "circles",
            Style::Gradient => "gradient",
            Style::GradientVertical => "gradient_vertical",
            Style::GradientRadial => "gradient_radial",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Style::Basic => "Default black and white",
            Style::Rounded => "Rounded modules",
            Style::Circles => "Circular modules",
            Style::Gradient => "Gradient colors (specify color1 and color2)",
            Style::GradientVertical => "Vertical gradient",
            Style::GradientRadial => "Radial gradient",
        }
    }
}

/// A color string that is not 3 or 6 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid color provided: {0}")]
pub struct InvalidColor(pub String);

/// Parses `RRGGBB` or `RGB`, with or without a leading `#`.
///
/// ```rust
/// use image::Rgb;
/// use upi_qr::helper::parse_hex_color;
///
/// assert_eq!(parse_hex_color("FF5733").unwrap(), Rgb([255, 87, 51]));
/// assert_eq!(parse_hex_color("#fff").unwrap(), Rgb([255, 255, 255]));
/// ```
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>, InvalidColor> {
    let invalid = || InvalidColor(s.to_owned());
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let hex = match hex.len() {
        6 => hex.to_owned(),
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        _ => return Err(invalid()),
    };
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Rendering parameters. All sizes are in pixels except `quiet_zone`, which is in modules.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub box_size: u32,
    pub quiet_zone: u32,
    pub border_size: u32,
    pub style: Style,
    pub front: Rgb<u8>,
    pub back: Rgb<u8>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            box_size: 15,
            quiet_zone: 2,
            border_size: 40,
            style: Style::Basic,
            front: Rgb([0, 0, 0]),
            back: Rgb([255, 255, 255]),
        }
    }
}

/// Renders the symbol and frames it with the decorative border.
pub fn render(qr: &QrCode, options: &RenderOptions) -> RgbImage {
    let symbol = render_symbol(qr, options);
    add_decorative_border(&symbol, options)
}

/// Renders and PNG-encodes in one go.
pub fn render_png(qr: &QrCode, options: &RenderOptions) -> Result<Vec<u8>, image::ImageError> {
    to_png_bytes(&render(qr, options))
}

/// Rasterizes the symbol alone: `(size + 2 * quiet_zone) * box_size` pixels square.
pub fn render_symbol(qr: &QrCode, options: &RenderOptions) -> RgbImage {
    let box_size = options.box_size.max(1);
    let quiet = options.quiet_zone;
    let side = (qr.size() as u32 + 2 * quiet) * box_size;
    let mut img = RgbImage::from_pixel(side, side, options.back);

    for y in 0..qr.size() {
        for x in 0..qr.size() {
            if !qr.get_module(x, y) {
                continue;
            }
            let left = (x as u32 + quiet) * box_size;
            let top = (y as u32 + quiet) * box_size;
            match options.style {
                Style::Basic => draw_filled_rect_mut(
                    &mut img,
                    Rect::at(left as i32, top as i32).of_size(box_size, box_size),
                    options.front,
                ),
                Style::Rounded => {
                    draw_rounded_module(&mut img, qr, (x, y), (left, top), box_size, options.front)
                }
                Style::Circles => {
                    let radius = ((box_size - 1) / 2) as i32;
                    let center = (left as i32 + radius, top as i32 + radius);
                    draw_filled_circle_mut(&mut img, center, radius, options.front);
                }
                Style::Gradient | Style::GradientVertical | Style::GradientRadial => {
                    for py in top..top + box_size {
                        for px in left..left + box_size {
                            let t = gradient_position(options.style, px, py, side);
                            img.put_pixel(px, py, lerp(options.front, GRADIENT_END, t));
                        }
                    }
                }
            }
        }
    }
    img
}

// A dot, squared off towards every dark orthogonal neighbour. A corner stays round only when
// both sides meeting at it are light.
fn draw_rounded_module(
    img: &mut RgbImage,
    qr: &QrCode,
    (x, y): (i32, i32),
    (left, top): (u32, u32),
    box_size: u32,
    color: Rgb<u8>,
) {
    let radius = ((box_size - 1) / 2) as i32;
    let (l, t) = (left as i32, top as i32);
    draw_filled_circle_mut(img, (l + radius, t + radius), radius, color);

    let half = box_size / 2;
    let halves = [
        (qr.get_module(x, y - 1), Rect::at(l, t).of_size(box_size, half + 1)),
        (qr.get_module(x, y + 1), Rect::at(l, t + half as i32).of_size(box_size, box_size - half)),
        (qr.get_module(x - 1, y), Rect::at(l, t).of_size(half + 1, box_size)),
        (qr.get_module(x + 1, y), Rect::at(l + half as i32, t).of_size(box_size - half, box_size)),
    ];
    for (neighbour, rect) in halves {
        if neighbour {
            draw_filled_rect_mut(img, rect, color);
        }
    }
}

// 0.0 at the gradient's start, 1.0 at its far end.
fn gradient_position(style: Style, px: u32, py: u32, side: u32) -> f32 {
    let span = side.saturating_sub(1).max(1) as f32;
    match style {
        Style::GradientVertical => py as f32 / span,
        Style::GradientRadial => {
            let half = side as f32 / 2.0;
            let dx = px as f32 - half;
            let dy = py as f32 - half;
            ((dx * dx + dy * dy).sqrt() / (half * std::f32::consts::SQRT_2)).min(1.0)
        }
        _ => px as f32 / span,
    }
}

fn lerp(from: Rgb<u8>, to: Rgb<u8>, t: f32) -> Rgb<u8> {
    let mix = |a: u8, b: u8| (f32::from(a) * (1.0 - t) + f32::from(b) * t) as u8;
    Rgb([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2])])
}

/// Places `symbol` in the middle of a canvas `border_size` pixels wider on every side and draws
/// the style's frame around it.
pub fn add_decorative_border(symbol: &RgbImage, options: &RenderOptions) -> RgbImage {
    let border = options.border_size;
    let (width, height) = symbol.dimensions();
    let mut base = RgbImage::from_pixel(width + 2 * border, height + 2 * border, options.back);
    let (w, h) = (base.width() as i32, base.height() as i32);
    let b = border as i32;
    let (front, back) = (options.front, options.back);

    match options.style {
        Style::Gradient | Style::GradientVertical | Style::GradientRadial => {
            for i in 0..b {
                let color = lerp(front, back, i as f32 / b as f32);
                draw_outline(&mut base, (i, i, w - i, h - i), color, 1);
            }
        }
        Style::Rounded | Style::Circles => {
            for i in (0..b).step_by(3) {
                let color = if i % 6 == 0 { front } else { back };
                draw_outline(&mut base, (i, i, w - i, h - i), color, 2);
            }
        }
        Style::Basic => {
            draw_outline(&mut base, (0, 0, w - 1, h - 1), front, 5);
            draw_outline(&mut base, (5, 5, w - 6, h - 6), back, 3);
            draw_outline(&mut base, (8, 8, w - 9, h - 9), front, 1);
        }
    }

    imageops::replace(&mut base, symbol, i64::from(border), i64::from(border));
    base
}

// Outline of the inclusive box (x0, y0)-(x1, y1), `width` pixels thick growing inwards.
// Parts outside the canvas are clipped.
fn draw_outline(img: &mut RgbImage, (x0, y0, x1, y1): (i32, i32, i32, i32), color: Rgb<u8>, width: i32) {
    for k in 0..width {
        let (left, top, right, bottom) = (x0 + k, y0 + k, x1 - k, y1 - k);
        if right < left || bottom < top {
            break;
        }
        let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Encodes an image as PNG in memory.
pub fn to_png_bytes(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrcode::{encode, Encoder, Mask, QrCodeEcc};

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn payment_symbol() -> QrCode {
        encode("upi://pay?pa=satyam84ya@fam&pn=Test&cu=INR&am=100", QrCodeEcc::High, None).unwrap()
    }

    fn with_style(style: Style) -> RenderOptions {
        RenderOptions {
            style,
            ..RenderOptions::default()
        }
    }

    fn scannable() -> RenderOptions {
        RenderOptions {
            box_size: 4,
            quiet_zone: 4,
            border_size: 0,
            ..RenderOptions::default()
        }
    }

    // Decodes the image with an independent reader; returns (version, text).
    fn scan(img: &RgbImage) -> (usize, String) {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            img.width() as usize,
            img.height() as usize,
            |x, y| img.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one symbol");
        let (meta, content) = grids[0].decode().unwrap();
        (meta.version.0, content)
    }

    #[test]
    fn scanner_reads_payment_symbol_at_low_and_high() {
        let uri = "upi://pay?pa=satyam84ya@fam&pn=Test&cu=INR&am=100";
        for (ecl, version) in [(QrCodeEcc::Low, 3), (QrCodeEcc::High, 6)] {
            let qr = encode(uri, ecl, None).unwrap();
            assert_eq!(scan(&render_symbol(&qr, &scannable())), (version, uri.to_string()));
        }
    }

    #[test]
    fn scanner_reads_every_mask() {
        let uri = "upi://pay?pa=shop@bank&pn=Corner Shop&cu=INR";
        for m in 0..8 {
            let qr = Encoder::new(QrCodeEcc::Medium).mask(Mask::new(m)).encode_text(uri).unwrap();
            assert_eq!(scan(&render_symbol(&qr, &scannable())).1, uri, "mask {m}");
        }
    }

    #[test]
    fn scanner_reads_versions_with_version_information() {
        let text = "upi://pay?pa=merchant@bank&pn=".to_string() + &"Long Name ".repeat(20);
        let qr = encode(&text, QrCodeEcc::Quartile, None).unwrap();
        assert!(qr.version().value() >= 7);
        let (version, content) = scan(&render_symbol(&qr, &scannable()));
        assert_eq!(version, usize::from(qr.version().value()));
        assert_eq!(content, text);
    }

    #[test]
    fn image_size_covers_quiet_zone_and_border() {
        let qr = payment_symbol();
        assert_eq!(qr.size(), 41);
        let img = render(&qr, &RenderOptions::default());
        // (41 + 2 * 2) * 15 + 2 * 40
        assert_eq!(img.dimensions(), (755, 755));

        let bare = RenderOptions {
            box_size: 10,
            quiet_zone: 4,
            border_size: 0,
            ..RenderOptions::default()
        };
        assert_eq!(render(&qr, &bare).dimensions(), (490, 490));
    }

    #[test]
    fn basic_style_pixels() {
        let img = render(&payment_symbol(), &RenderOptions::default());
        // Frame: 5 px front, 3 px back, 1 px front
        assert_eq!(*img.get_pixel(0, 0), BLACK);
        assert_eq!(*img.get_pixel(4, 300), BLACK);
        assert_eq!(*img.get_pixel(6, 6), WHITE);
        assert_eq!(*img.get_pixel(8, 8), BLACK);
        assert_eq!(*img.get_pixel(20, 20), WHITE);
        // Quiet zone, then the outer ring of the top-left finder
        assert_eq!(*img.get_pixel(45, 45), WHITE);
        assert_eq!(*img.get_pixel(40 + 30, 40 + 30), BLACK);
        assert_eq!(*img.get_pixel(40 + 30 + 15 + 7, 40 + 30 + 15 + 7), WHITE);
    }

    #[test]
    fn custom_colors_apply() {
        let options = RenderOptions {
            front: parse_hex_color("FF5733").unwrap(),
            back: parse_hex_color("FFBD33").unwrap(),
            ..RenderOptions::default()
        };
        let img = render(&payment_symbol(), &options);
        assert_eq!(*img.get_pixel(0, 0), Rgb([255, 87, 51]));
        assert_eq!(*img.get_pixel(45, 45), Rgb([255, 189, 51]));
    }

    #[test]
    fn circles_leave_module_corners_light() {
        let img = render_symbol(&payment_symbol(), &with_style(Style::Circles));
        // Module (3, 3) is the finder's center; its top-left pixel lies outside the dot
        let (left, top) = ((3 + 2) * 15, (3 + 2) * 15);
        assert_eq!(*img.get_pixel(left, top), WHITE);
        assert_eq!(*img.get_pixel(left + 7, top + 7), BLACK);
    }

    #[test]
    fn rounded_fills_corners_between_dark_neighbours() {
        let img = render_symbol(&payment_symbol(), &with_style(Style::Rounded));
        let (left, top) = ((3 + 2) * 15, (3 + 2) * 15);
        assert_eq!(*img.get_pixel(left, top), BLACK);
        assert_eq!(*img.get_pixel(left + 14, top + 14), BLACK);
        // The finder's outer corner module has light neighbours above and to the left
        let (left, top) = (2 * 15, 2 * 15);
        assert_eq!(*img.get_pixel(left, top), WHITE);
        assert_eq!(*img.get_pixel(left + 14, top + 7), BLACK);
    }

    #[test]
    fn gradients_run_from_front_color() {
        let qr = payment_symbol();
        let img = render_symbol(&qr, &with_style(Style::Gradient));
        let finder_left = 2 * 15;
        let near = *img.get_pixel(finder_left, finder_left);
        let far_module = (qr.size() as u32 - 1 + 2) * 15;
        let far = *img.get_pixel(far_module + 14, finder_left);
        assert!(near[2] < 40, "{near:?}");
        assert!(far[2] > 200, "{far:?}");

        let framed = render(&qr, &with_style(Style::GradientRadial));
        assert_eq!(*framed.get_pixel(0, 0), BLACK);
        assert_eq!(*framed.get_pixel(20, 20), lerp(BLACK, WHITE, 0.5));
    }

    #[test]
    fn dotted_frame_alternates() {
        let img = render(&payment_symbol(), &with_style(Style::Rounded));
        assert_eq!(*img.get_pixel(0, 100), BLACK);
        assert_eq!(*img.get_pixel(3, 100), WHITE);
        assert_eq!(*img.get_pixel(6, 100), BLACK);
    }

    #[test]
    fn png_signature() {
        let png = render_png(&payment_symbol(), &RenderOptions::default()).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (755, 755));
    }

    #[test]
    fn style_tags() {
        for style in Style::ALL {
            assert_eq!(Style::from_tag(style.tag()), style);
        }
        assert_eq!(Style::from_tag("sparkly"), Style::Basic);
        assert_eq!(Style::from_tag(""), Style::Basic);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("000000").unwrap(), BLACK);
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), WHITE);
        assert_eq!(parse_hex_color("f53").unwrap(), Rgb([0xff, 0x55, 0x33]));
        for bad in ["", "#", "12345", "GGGGGG", "1234567", "+12345", "ÿÿÿ"] {
            assert_eq!(parse_hex_color(bad), Err(InvalidColor(bad.to_owned())), "{bad:?}");
        }
    }
}
