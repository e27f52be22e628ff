use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layout geometry: a 120x100 shape per person, 160 horizontal advance
/// between single slots, 150 between generation rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub shape_width: f32,
    pub shape_height: f32,
    /// Center-to-center advance between two single slots. Couples advance by
    /// two shape widths plus this gap.
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    pub top_margin: f32,
    pub canvas_padding: f32,
    pub min_canvas_width: f32,
    pub min_canvas_height: f32,
    /// Center line the anchor generation is laid out around.
    pub center_x: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            shape_width: 120.0,
            shape_height: 100.0,
            horizontal_gap: 160.0,
            vertical_gap: 150.0,
            top_margin: 40.0,
            canvas_padding: 40.0,
            min_canvas_width: 1000.0,
            min_canvas_height: 800.0,
            center_x: 500.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    shape_width: Option<f32>,
    shape_height: Option<f32>,
    horizontal_gap: Option<f32>,
    vertical_gap: Option<f32>,
    top_margin: Option<f32>,
    canvas_padding: Option<f32>,
    min_canvas_width: Option<f32>,
    min_canvas_height: Option<f32>,
    center_x: Option<f32>,
}

/// Loads a layout config, applying any fields present in the JSON file on
/// top of the defaults. No path means plain defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let mut config = LayoutConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;

    if let Some(v) = parsed.shape_width {
        config.shape_width = v;
    }
    if let Some(v) = parsed.shape_height {
        config.shape_height = v;
    }
    if let Some(v) = parsed.horizontal_gap {
        config.horizontal_gap = v;
    }
    if let Some(v) = parsed.vertical_gap {
        config.vertical_gap = v;
    }
    if let Some(v) = parsed.top_margin {
        config.top_margin = v;
    }
    if let Some(v) = parsed.canvas_padding {
        config.canvas_padding = v;
    }
    if let Some(v) = parsed.min_canvas_width {
        config.min_canvas_width = v;
    }
    if let Some(v) = parsed.min_canvas_height {
        config.min_canvas_height = v;
    }
    if let Some(v) = parsed.center_x {
        config.center_x = v;
    }

    Ok(config)
}
