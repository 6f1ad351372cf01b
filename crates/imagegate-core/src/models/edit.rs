use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// How a resize fits the image into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFit {
    /// Fill the box, cropping the overflow
    #[default]
    Cover,
    /// Fit inside the box, letterboxing with the background color
    Contain,
    /// Stretch to the exact box
    Fill,
    /// Fit inside the box, keeping aspect ratio
    Inside,
    /// Cover the box, keeping aspect ratio without cropping
    Outside,
}

impl FromStr for ResizeFit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cover" => Ok(ResizeFit::Cover),
            "contain" => Ok(ResizeFit::Contain),
            "fill" => Ok(ResizeFit::Fill),
            "inside" => Ok(ResizeFit::Inside),
            "outside" => Ok(ResizeFit::Outside),
            other => Err(format!("Unknown resize fit '{}'", other)),
        }
    }
}

/// RGBA color used for letterbox backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbaColor(pub [u8; 4]);

impl RgbaColor {
    pub const WHITE: RgbaColor = RgbaColor([255, 255, 255, 255]);
    pub const BLACK: RgbaColor = RgbaColor([0, 0, 0, 255]);
    pub const TRANSPARENT: RgbaColor = RgbaColor([0, 0, 0, 0]);

    /// Parse a color name or a hex value with or without a leading `#`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "white" => return Some(Self::WHITE),
            "black" => return Some(Self::BLACK),
            "transparent" => return Some(Self::TRANSPARENT),
            "red" => return Some(RgbaColor([255, 0, 0, 255])),
            "green" => return Some(RgbaColor([0, 128, 0, 255])),
            "blue" => return Some(RgbaColor([0, 0, 255, 255])),
            "gray" | "grey" => return Some(RgbaColor([128, 128, 128, 255])),
            _ => {}
        }

        let hex = value.strip_prefix('#').unwrap_or(&value);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let mut rgba = [0, 0, 0, 255];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    rgba[i] = v * 17;
                }
                Some(RgbaColor(rgba))
            }
            6 => Some(RgbaColor([channel(0)?, channel(2)?, channel(4)?, 255])),
            8 => Some(RgbaColor([
                channel(0)?,
                channel(2)?,
                channel(4)?,
                channel(6)?,
            ])),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: ResizeFit,
    pub background: Option<RgbaColor>,
    pub without_enlargement: bool,
}

impl ResizeSpec {
    pub fn new(width: Option<u32>, height: Option<u32>, fit: ResizeFit) -> Self {
        Self {
            width,
            height,
            fit,
            background: None,
            without_enlargement: false,
        }
    }
}

/// Pixel rectangle.
///
/// `reference` records the buffer dimensions the rectangle was computed against;
/// the executor rescales it when the buffer has since changed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub reference: Option<(u32, u32)>,
}

impl CropRect {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            reference: None,
        }
    }

    pub fn with_reference(mut self, width: u32, height: u32) -> Self {
        self.reference = Some((width, height));
        self
    }
}

/// Encodable output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
    Tiff,
    Heif,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Heif => "image/heif",
        }
    }

    /// Quality only matters for lossy encoders.
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            OutputFormat::Jpeg | OutputFormat::WebP | OutputFormat::Avif
        )
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            "gif" => Ok(OutputFormat::Gif),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "heif" | "heic" => Ok(OutputFormat::Heif),
            other => Err(format!("Unknown output format '{}'", other)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Heif => "heif",
        };
        write!(f, "{}", name)
    }
}

/// Overlay offset along one axis. Negative pixel values count from the far edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayOffset {
    Pixels(i64),
    Percent(f32),
}

impl OverlayOffset {
    /// Parse `10`, `-10` or `10p`; `center` yields `None`.
    pub fn parse(value: &str) -> Result<Option<Self>, String> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("center") {
            return Ok(None);
        }
        if let Some(percent) = value.strip_suffix('p') {
            return percent
                .parse::<f32>()
                .map(|p| Some(OverlayOffset::Percent(p)))
                .map_err(|_| format!("Invalid overlay offset '{}'", value));
        }
        value
            .parse::<i64>()
            .map(|px| Some(OverlayOffset::Pixels(px)))
            .map_err(|_| format!("Invalid overlay offset '{}'", value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    pub bucket: String,
    pub key: String,
    pub left: Option<OverlayOffset>,
    pub top: Option<OverlayOffset>,
    /// Transparency in percent (0 = opaque, 100 = invisible).
    pub alpha: f32,
    pub width_ratio: Option<f32>,
    pub height_ratio: Option<f32>,
}

/// One step of an edit plan.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOperation {
    Resize(ResizeSpec),
    Rotate {
        degrees: f32,
    },
    Flip,
    Flop,
    Grayscale,
    Negate,
    Blur {
        sigma: f32,
    },
    Sharpen {
        sigma: f32,
    },
    Crop(CropRect),
    Format {
        target: Option<OutputFormat>,
        quality: Option<u8>,
    },
    Overlay(OverlaySpec),
    /// Resolved into a `Crop` before execution.
    SmartCrop {
        face_index: Option<usize>,
        padding_percent: Option<f32>,
    },
    /// Resolved into a `Blur` or removed before execution.
    ContentModeration {
        min_confidence: Option<f32>,
        blur: Option<f32>,
        labels: Vec<String>,
    },
}

impl EditOperation {
    pub fn name(&self) -> &'static str {
        match self {
            EditOperation::Resize(_) => "resize",
            EditOperation::Rotate { .. } => "rotate",
            EditOperation::Flip => "flip",
            EditOperation::Flop => "flop",
            EditOperation::Grayscale => "grayscale",
            EditOperation::Negate => "negate",
            EditOperation::Blur { .. } => "blur",
            EditOperation::Sharpen { .. } => "sharpen",
            EditOperation::Crop(_) => "crop",
            EditOperation::Format { .. } => "format",
            EditOperation::Overlay(_) => "overlay",
            EditOperation::SmartCrop { .. } => "smartCrop",
            EditOperation::ContentModeration { .. } => "contentModeration",
        }
    }

    /// Whether the operation still needs detection results.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            EditOperation::SmartCrop { .. } | EditOperation::ContentModeration { .. }
        )
    }
}

/// Ordered, validated edit pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditPlan {
    pub operations: Vec<EditOperation>,
    /// Custom response headers requested by the client.
    pub headers: BTreeMap<String, String>,
}

impl EditPlan {
    pub fn new(operations: Vec<EditOperation>) -> Self {
        Self {
            operations,
            headers: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn needs_faces(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, EditOperation::SmartCrop { .. }))
    }

    pub fn needs_labels(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, EditOperation::ContentModeration { .. }))
    }

    /// Explicitly requested output format, last one wins.
    pub fn target_format(&self) -> Option<OutputFormat> {
        self.operations.iter().rev().find_map(|op| match op {
            EditOperation::Format { target, .. } => *target,
            _ => None,
        })
    }

    pub fn overlays(&self) -> impl Iterator<Item = &OverlaySpec> {
        self.operations.iter().filter_map(|op| match op {
            EditOperation::Overlay(spec) => Some(spec),
            _ => None,
        })
    }

    pub fn operation_names(&self) -> Vec<&'static str> {
        self.operations.iter().map(EditOperation::name).collect()
    }
}
