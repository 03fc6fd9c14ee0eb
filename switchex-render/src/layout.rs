use tiny_skia::{Color, Rect};

/// Fixed canvas size; the surface scales it to the window.
pub const WIDTH: u32 = 900;
pub const HEIGHT: u32 = 500;

pub mod palette {
    use tiny_skia::Color;

    pub fn bg() -> Color {
        Color::from_rgba8(245, 245, 250, 255)
    }
    pub fn ink() -> Color {
        Color::from_rgba8(40, 40, 50, 255)
    }
    pub fn panel() -> Color {
        Color::from_rgba8(255, 255, 255, 255)
    }
    pub fn outline() -> Color {
        Color::from_rgba8(210, 215, 225, 255)
    }
    pub fn negative() -> Color {
        Color::from_rgba8(200, 75, 75, 255)
    }
    pub fn positive() -> Color {
        Color::from_rgba8(75, 180, 110, 255)
    }
    pub fn accent() -> Color {
        Color::from_rgba8(70, 130, 210, 255)
    }
    pub fn subtle() -> Color {
        Color::from_rgba8(140, 145, 160, 255)
    }
}

/// Control regions on the start screen, shared between the renderer and the
/// pointer hit-testing in the app layer.
pub fn start_button() -> Rect {
    Rect::from_xywh(WIDTH as f32 / 2.0 + 20.0, 400.0, 200.0, 55.0).unwrap()
}

pub fn tutorial_button() -> Rect {
    Rect::from_xywh(WIDTH as f32 / 2.0 - 220.0, 400.0, 200.0, 55.0).unwrap()
}

pub fn hit(rect: Rect, x: f32, y: f32) -> bool {
    x >= rect.x() && x < rect.x() + rect.width() && y >= rect.y() && y < rect.y() + rect.height()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_do_not_overlap() {
        let start = start_button();
        let tutorial = tutorial_button();
        assert!(tutorial.x() + tutorial.width() <= start.x());
    }

    #[test]
    fn hit_testing_uses_half_open_edges() {
        let rect = start_button();
        assert!(hit(rect, rect.x(), rect.y()));
        assert!(hit(
            rect,
            rect.x() + rect.width() - 1.0,
            rect.y() + rect.height() - 1.0
        ));
        assert!(!hit(rect, rect.x() + rect.width(), rect.y()));
        assert!(!hit(rect, rect.x() - 1.0, rect.y()));
    }
}
