use std::fmt;

use serde::Serialize;

/// What the CRT shader is drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Power-on sweep, driven by the boot timer.
    #[default]
    Boot,
    /// Scanline loader, driven by gesture and loading progress.
    Scanline,
}

impl RenderMode {
    /// Value written to the `uMode` uniform.
    pub fn uniform_value(self) -> f32 {
        match self {
            RenderMode::Boot => 0.0,
            RenderMode::Scanline => 1.0,
        }
    }

    /// Inverse of [`uniform_value`](Self::uniform_value); anything non-zero is scanline.
    pub fn from_uniform(value: f32) -> Self {
        if value == 0.0 {
            RenderMode::Boot
        } else {
            RenderMode::Scanline
        }
    }

    /// Map a page-level tag: `"boot"` is boot, every other string is scanline.
    pub fn from_tag(tag: &str) -> Self {
        if tag == "boot" {
            RenderMode::Boot
        } else {
            RenderMode::Scanline
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Boot => "boot",
            RenderMode::Scanline => "scanline",
        }
    }
}

impl From<&str> for RenderMode {
    fn from(tag: &str) -> Self {
        Self::from_tag(tag)
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
