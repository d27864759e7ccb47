//! Pan and zoom state of the diagram. Purely presentational: the graph is
//! never touched.

use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Pan and zoom gestures are only captured while the diagram is maximized.
    pub maximized: bool,
    #[serde(default)]
    fitted: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            maximized: false,
            fitted: false,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scales the content down (never up) so it fits the view, centered.
    pub fn fit(&mut self, content: (f64, f64), view: (f64, f64)) {
        let (content_width, content_height) = content;
        let (view_width, view_height) = view;
        if content_width <= 0.0 || content_height <= 0.0 {
            self.scale = 1.0;
            self.offset_x = 0.0;
            self.offset_y = 0.0;
        } else {
            let scale = (view_width / content_width)
                .min(view_height / content_height)
                .min(1.0);
            self.scale = clamp_scale(scale);
            self.offset_x = (view_width - content_width * self.scale) / 2.0;
            self.offset_y = (view_height - content_height * self.scale) / 2.0;
        }
        self.fitted = true;
    }

    /// Fits only on the first render; later renders keep the user's view.
    pub fn fit_once(&mut self, content: (f64, f64), view: (f64, f64)) {
        if !self.fitted {
            self.fit(content, view);
        }
    }

    pub fn set_maximized(&mut self, maximized: bool) {
        self.maximized = maximized;
    }

    /// Drag gesture. Returns whether the gesture was consumed.
    pub fn pan(&mut self, dx: f64, dy: f64) -> bool {
        if !self.maximized {
            return false;
        }
        self.offset_x += dx;
        self.offset_y += dy;
        true
    }

    /// Wheel gesture around the pointer at `(x, y)`, which stays in place.
    /// Returns whether the gesture was consumed.
    pub fn zoom(&mut self, factor: f64, x: f64, y: f64) -> bool {
        if !self.maximized || factor <= 0.0 {
            return false;
        }
        let scale = clamp_scale(self.scale * factor);
        let ratio = scale / self.scale;
        self.offset_x = x - (x - self.offset_x) * ratio;
        self.offset_y = y - (y - self.offset_y) * ratio;
        self.scale = scale;
        true
    }

    /// SVG/CSS transform for the diagram group.
    pub fn transform(&self) -> String {
        format!(
            "translate({:.2} {:.2}) scale({:.4})",
            self.offset_x, self.offset_y, self.scale
        )
    }
}

fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE, MAX_SCALE)
}
