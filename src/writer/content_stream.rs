//! Content stream operators.
//!
//! Thin emitters for the handful of PDF content operators the stream
//! writer offers helpers for. Anything else can be written with
//! [`ContentStreamOp::Raw`] or directly through the stream writer.

use super::object_serializer::escape_name;

/// Operations that can be added to a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Concatenate a matrix to the CTM (cm)
    Transform(f64, f64, f64, f64, f64, f64),
    /// Paint an XObject from the page resources (Do)
    PaintXObject(String),
    /// Rectangle path (re)
    Rectangle(f64, f64, f64, f64),
    /// Move to (m)
    MoveTo(f64, f64),
    /// Line to (l)
    LineTo(f64, f64),
    /// Set line width (w)
    SetLineWidth(f64),
    /// Set fill color gray (g)
    SetFillColorGray(f64),
    /// Set stroke color gray (G)
    SetStrokeColorGray(f64),
    /// Set fill color RGB (rg)
    SetFillColorRGB(f64, f64, f64),
    /// Fill (f)
    Fill,
    /// Stroke (S)
    Stroke,
    /// Raw operator text, written as is
    Raw(String),
}

impl ContentStreamOp {
    /// The four operators that paint image `name` into the rectangle
    /// `(x, y, width, height)`: `q`, a scaling `cm`, `Do`, `Q`.
    pub fn draw_image(name: &str, x: f64, y: f64, width: f64, height: f64) -> [ContentStreamOp; 4] {
        [
            ContentStreamOp::SaveState,
            ContentStreamOp::Transform(width, 0.0, 0.0, height, x, y),
            ContentStreamOp::PaintXObject(name.to_string()),
            ContentStreamOp::RestoreState,
        ]
    }

    /// Operator text, terminated by a newline.
    pub fn encode(&self) -> String {
        let nums = |values: &[f64]| {
            values
                .iter()
                .map(|&v| format_number(v))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut line = match self {
            ContentStreamOp::SaveState => "q".to_string(),
            ContentStreamOp::RestoreState => "Q".to_string(),
            ContentStreamOp::Transform(a, b, c, d, e, f) => {
                format!("{} cm", nums(&[*a, *b, *c, *d, *e, *f]))
            },
            ContentStreamOp::PaintXObject(name) => format!("{} Do", escape_name(name.as_bytes())),
            ContentStreamOp::Rectangle(x, y, w, h) => format!("{} re", nums(&[*x, *y, *w, *h])),
            ContentStreamOp::MoveTo(x, y) => format!("{} m", nums(&[*x, *y])),
            ContentStreamOp::LineTo(x, y) => format!("{} l", nums(&[*x, *y])),
            ContentStreamOp::SetLineWidth(w) => format!("{} w", format_number(*w)),
            ContentStreamOp::SetFillColorGray(g) => format!("{} g", format_number(*g)),
            ContentStreamOp::SetStrokeColorGray(g) => format!("{} G", format_number(*g)),
            ContentStreamOp::SetFillColorRGB(r, g, b) => format!("{} rg", nums(&[*r, *g, *b])),
            ContentStreamOp::Fill => "f".to_string(),
            ContentStreamOp::Stroke => "S".to_string(),
            ContentStreamOp::Raw(text) => text.clone(),
        };
        line.push('\n');
        line
    }
}

/// Format a coordinate: integers without a decimal point, everything else
/// with at most four decimals and no trailing zeros.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return (value as i64).to_string();
    }
    let formatted = format!("{:.4}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}
