//! Shared types and enums used across prodshot.
//! Includes the background `RemovalMode`, the padding and perimeter gating
//! modes, `OutputFormat`, merge placement enums and the batch `BatchMode`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Every near-white pixel becomes transparent.
    Full,
    /// Only near-white pixels connected to the border become transparent.
    Edges,
}

impl std::fmt::Display for RemovalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemovalMode::Full => "full",
            RemovalMode::Edges => "edges",
        };
        write!(f, "{}", s)
    }
}

/// When the padding stage runs.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingMode {
    Never,
    Always,
    IfWhite,
    IfNotWhite,
}

impl std::fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaddingMode::Never => write!(f, "never"),
            PaddingMode::Always => write!(f, "always"),
            PaddingMode::IfWhite => write!(f, "if_white"),
            PaddingMode::IfNotWhite => write!(f, "if_not_white"),
        }
    }
}

/// Perimeter condition under which background removal is allowed.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerimeterMode {
    IfWhite,
    IfNotWhite,
}

impl PerimeterMode {
    /// Whether a perimeter with the given whiteness satisfies this mode.
    pub fn admits(self, perimeter_is_white: bool) -> bool {
        match self {
            PerimeterMode::IfWhite => perimeter_is_white,
            PerimeterMode::IfNotWhite => !perimeter_is_white,
        }
    }
}

impl std::fmt::Display for PerimeterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerimeterMode::IfWhite => write!(f, "if_white"),
            PerimeterMode::IfNotWhite => write!(f, "if_not_white"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[serde(alias = "jpeg")]
    Jpg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePosition {
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl std::fmt::Display for MergePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergePosition::Center => "center",
            MergePosition::Top => "top",
            MergePosition::Bottom => "bottom",
            MergePosition::Left => "left",
            MergePosition::Right => "right",
        };
        write!(f, "{}", s)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayOrder {
    PhotoOverTemplate,
    TemplateOverPhoto,
}

impl std::fmt::Display for OverlayOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayOrder::PhotoOverTemplate => write!(f, "photo_over_template"),
            OverlayOrder::TemplateOverPhoto => write!(f, "template_over_photo"),
        }
    }
}

/// What a worker hands back for each item.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Encode and save every image, reply with its destination path.
    Individual,
    /// Reply with PNG bytes for later collage assembly.
    Collage,
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchMode::Individual => write!(f, "Individual"),
            BatchMode::Collage => write!(f, "Collage"),
        }
    }
}

/// Output file naming.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum RenameRule {
    /// Keep the input file stem.
    #[default]
    Keep,
    /// `<name>.<ext>` for the first item, `<name>_<index>.<ext>` for the rest.
    Article { name: String },
}
