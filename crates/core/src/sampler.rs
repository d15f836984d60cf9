use crate::error::PlatformError;
use crate::platform::ScreenSource;
use crate::types::*;
use crate::logger;

/// True only if every pixel in `capture` is exactly `expected`. Alpha is
/// ignored; an empty capture never matches.
pub fn matches(capture: &Capture, expected: Rgb) -> bool {
    if capture.width == 0 || capture.height == 0 {
        return false;
    }
    let row_bytes = (capture.width * 4) as usize;
    for y in 0..capture.height {
        let start = (y * capture.bytes_per_row) as usize;
        let Some(row) = capture.data.get(start..start + row_bytes) else {
            return false;
        };
        for px in row.chunks_exact(4) {
            if px[0] != expected.b || px[1] != expected.g || px[2] != expected.r {
                return false;
            }
        }
    }
    true
}

/// Reads regions from one screen source. Each polling loop owns its own.
pub struct RegionSampler {
    source: Box<dyn ScreenSource>,
    tag: &'static str,
}

impl RegionSampler {
    pub fn new(source: Box<dyn ScreenSource>, tag: &'static str) -> Self {
        Self { source, tag }
    }

    pub fn sample(&mut self, region: &Region) -> Result<Capture, PlatformError> {
        self.source.capture(region.rect())
    }

    /// Sample and match in one go. A capture failure is logged and
    /// counts as a non-match for this poll only.
    pub fn check(&mut self, region: &Region) -> bool {
        match self.sample(region) {
            Ok(cap) => matches(&cap, region.color),
            Err(e) => {
                logger::debug_p(self.tag, &format!("capture failed: {}", e));
                false
            }
        }
    }
}

/// Write a capture to disk as PNG for inspecting region geometry.
#[cfg(feature = "debug-capture")]
pub fn save_png(capture: &Capture, path: &std::path::Path) -> anyhow::Result<()> {
    let mut img = image::RgbaImage::new(capture.width, capture.height);
    for y in 0..capture.height {
        for x in 0..capture.width {
            if let Some(c) = capture.pixel(x, y) {
                img.put_pixel(x, y, image::Rgba([c.r, c.g, c.b, 255]));
            }
        }
    }
    img.save(path)?;
    Ok(())
}
