use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

use crate::error::{MonitorError, MonitorResult};
use crate::settings::CaptureSettings;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Fixed output geometry for snapshots sent to inference services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl From<&CaptureSettings> for FrameSpec {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            width: settings.frame_width,
            height: settings.frame_height,
            jpeg_quality: settings.jpeg_quality,
        }
    }
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self::from(&CaptureSettings::default())
    }
}

#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedFrame {
    /// `data:image/jpeg;base64,...`, the shape the services split on `,`.
    pub fn to_data_url(&self) -> String {
        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        url.push_str(DATA_URL_PREFIX);
        BASE64_STANDARD.encode_string(&self.jpeg, &mut url);
        url
    }
}

/// Resizes `frame` to the exact `FrameSpec` geometry and JPEG-encodes it.
pub fn encode_frame(frame: &DynamicImage, spec: FrameSpec) -> MonitorResult<EncodedFrame> {
    if spec.width == 0 || spec.height == 0 {
        return Err(MonitorError::Encode(format!(
            "frame size {}x{} is empty",
            spec.width, spec.height
        )));
    }

    let resized = if frame.width() == spec.width && frame.height() == spec.height {
        frame.to_rgb8()
    } else {
        frame
            .resize_exact(spec.width, spec.height, FilterType::Triangle)
            .to_rgb8()
    };

    let mut jpeg = Vec::new();
    let quality = spec.jpeg_quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&resized)
        .map_err(|err| MonitorError::Encode(err.to_string()))?;

    Ok(EncodedFrame {
        jpeg,
        width: spec.width,
        height: spec.height,
    })
}
