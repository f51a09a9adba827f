use super::{Color, Image, RotatedRect};

/// Describes how to blend pixels together in a [`Blend`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// All destination pixels will be overwritten with the corresponding source pixel.
    Overwrite,

    /// Performs alpha blending between source and destination pixels to make the source image
    /// appear in front of the destination image.
    Alpha,
}

/// A blending operation that draws an image into a rotated rectangle of another image.
///
/// Returned by [`Image::blend_from`]. The blend is performed when this value is dropped.
pub struct Blend<'a> {
    dest: &'a mut Image,
    src: &'a Image,
    rect: RotatedRect,
    mode: BlendMode,
}

impl<'a> Blend<'a> {
    pub(super) fn new(dest: &'a mut Image, src: &'a Image, rect: RotatedRect) -> Self {
        Self {
            dest,
            src,
            rect,
            mode: BlendMode::Alpha,
        }
    }

    /// Sets the blend mode to use.
    pub fn mode(&mut self, mode: BlendMode) -> &mut Self {
        self.mode = mode;
        self
    }
}

impl Drop for Blend<'_> {
    fn drop(&mut self) {
        let (w, h) = (self.rect.width(), self.rect.height());
        if w <= 0.0 || h <= 0.0 || self.src.width() == 0 || self.src.height() == 0 {
            return;
        }
        let area = match self.rect.bounding_rect().intersection(&self.dest.rect()) {
            Some(area) => area,
            None => return,
        };

        for dest_y in area.y()..area.y() + area.height() as i32 {
            for dest_x in area.x()..area.x() + area.width() as i32 {
                // Sample at pixel centers, nearest neighbor.
                let [lx, ly] = self.rect.transform_in(dest_x as f32 + 0.5, dest_y as f32 + 0.5);
                if lx < 0.0 || ly < 0.0 || lx >= w || ly >= h {
                    continue;
                }
                let src_x = ((lx / w * self.src.width() as f32) as u32).min(self.src.width() - 1);
                let src_y = ((ly / h * self.src.height() as f32) as u32).min(self.src.height() - 1);

                let (dest_x, dest_y) = (dest_x as u32, dest_y as u32);
                let src_pix = self.src.get(src_x, src_y);
                let dest_pix = self.dest.get(dest_x, dest_y);
                let result = match self.mode {
                    BlendMode::Overwrite => src_pix,
                    BlendMode::Alpha => blend_alpha(dest_pix, src_pix),
                };
                self.dest.set(dest_x, dest_y, result);
            }
        }
    }
}

/// Source-over compositing, performed in linear RGB.
fn blend_alpha(dest: Color, src: Color) -> Color {
    match src.a() {
        0 => return dest,
        255 => return src,
        _ => {}
    }

    let dest = LinearColor::from_srgb(dest);
    let src = LinearColor::from_srgb(src);

    let alpha = src.a() + dest.a() * (1.0 - src.a());
    let channel = |i: usize| (src.0[i] * src.a() + dest.0[i] * dest.a() * (1.0 - src.a())) / alpha;
    LinearColor([channel(0), channel(1), channel(2), alpha]).to_srgb()
}

struct LinearColor([f32; 4]);

impl LinearColor {
    fn from_srgb(color: Color) -> Self {
        fn decode(srgb: u8) -> f32 {
            let srgb = f32::from(srgb) / 255.0;
            if srgb <= 0.04045 {
                srgb / 12.92
            } else {
                ((srgb + 0.055) / 1.055).powf(2.4)
            }
        }

        Self([
            decode(color.r()),
            decode(color.g()),
            decode(color.b()),
            f32::from(color.a()) / 255.0,
        ])
    }

    fn to_srgb(&self) -> Color {
        fn encode(rgb: f32) -> u8 {
            let srgb = if rgb <= 0.0031308 {
                rgb * 12.92
            } else {
                1.055 * rgb.powf(1.0 / 2.4) - 0.055
            };
            (srgb * 255.0).round().clamp(0.0, 255.0) as u8
        }

        Color([
            encode(self.0[0]),
            encode(self.0[1]),
            encode(self.0[2]),
            (self.a() * 255.0).round().clamp(0.0, 255.0) as u8,
        ])
    }

    fn a(&self) -> f32 {
        self.0[3]
    }
}
