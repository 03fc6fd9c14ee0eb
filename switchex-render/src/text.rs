use std::collections::HashMap;
use std::sync::Arc;

use ab_glyph::{Font, FontArc, FontVec, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use tiny_skia::{Color, Pixmap};

/// Regular and bold sans-serif faces resolved from the system font database.
pub struct Fonts {
    pub regular: FontArc,
    pub bold: FontArc,
}

pub fn load_system_fonts() -> Result<Fonts> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let regular = load_face(&db, fontdb::Weight::NORMAL)
        .context("no usable sans-serif font installed")?;
    // A missing bold face is not fatal; emphasis just renders regular.
    let bold = load_face(&db, fontdb::Weight::BOLD).unwrap_or_else(|_| regular.clone());
    Ok(Fonts { regular, bold })
}

fn load_face(db: &fontdb::Database, weight: fontdb::Weight) -> Result<FontArc> {
    let query = fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        weight,
        ..fontdb::Query::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("no sans-serif face matches weight {}", weight.0))?;
    let (bytes, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("face data unavailable"))?;
    let font = FontVec::try_from_vec_and_index(bytes, index)?;
    Ok(FontArc::new(font))
}

/// Rasterize one line of text into a tightly sized premultiplied pixmap.
///
/// Glyphs are laid out with kerning along a shared baseline; coverage is
/// accumulated first so overlapping outlines don't double-blend.
pub fn render_text_pixmap(font: &FontArc, text: &str, px: f32, color: Color) -> Pixmap {
    let scale = PxScale::from(px);
    let scaled = font.as_scaled(scale);

    let mut glyphs = Vec::<Glyph>::new();
    let mut pen_x = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = previous {
            pen_x += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scale, point(pen_x, scaled.ascent())));
        pen_x += scaled.h_advance(id);
        previous = Some(id);
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for glyph in &glyphs {
        if let Some(outlined) = font.outline_glyph(glyph.clone()) {
            let b = outlined.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }
    if min_x == f32::INFINITY {
        // Whitespace-only runs still need a valid pixmap.
        return Pixmap::new(1, 1).expect("pixmap");
    }

    let width = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let height = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut coverage = vec![0.0f32; (width * height) as usize];

    for glyph in glyphs {
        if let Some(outlined) = font.outline_glyph(glyph) {
            let b = outlined.px_bounds();
            let offset_x = (b.min.x - min_x) as i32;
            let offset_y = (b.min.y - min_y) as i32;
            outlined.draw(|x, y, c| {
                let px = x as i32 + offset_x;
                let py = y as i32 + offset_y;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                let i = py as usize * width as usize + px as usize;
                coverage[i] = coverage[i].max(c);
            });
        }
    }

    let mut pixmap = Pixmap::new(width, height).expect("pixmap");
    let data = pixmap.data_mut();
    for (i, c) in coverage.iter().enumerate() {
        let alpha = (c.clamp(0.0, 1.0) * color.alpha() * 255.0) as u32;
        if alpha == 0 {
            continue;
        }
        let offset = i * 4;
        data[offset] = ((color.red() * 255.0) as u32 * alpha / 255) as u8;
        data[offset + 1] = ((color.green() * 255.0) as u32 * alpha / 255) as u8;
        data[offset + 2] = ((color.blue() * 255.0) as u32 * alpha / 255) as u8;
        data[offset + 3] = alpha as u8;
    }
    pixmap
}

/// Cache of rasterized runs keyed by content, pixel size and color.
///
/// Digit strings and the input buffer churn, but the working set per frame
/// is small; entries are cheap and never evicted within a session.
pub struct TextCache {
    font: FontArc,
    map: HashMap<(String, u32, [u8; 4]), Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn get(&mut self, text: &str, px: f32, color: Color) -> Arc<Pixmap> {
        let key = (text.to_string(), px.to_bits(), color_key(color));
        if let Some(pixmap) = self.map.get(&key) {
            return Arc::clone(pixmap);
        }
        let pixmap = Arc::new(render_text_pixmap(&self.font, text, px, color));
        self.map.insert(key, Arc::clone(&pixmap));
        pixmap
    }
}

fn color_key(color: Color) -> [u8; 4] {
    let c = color.to_color_u8();
    [c.red(), c.green(), c.blue(), c.alpha()]
}
