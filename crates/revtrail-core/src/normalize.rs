//! Textual normal form of field values.
//!
//! Every value, including an absent one, has a string form so that a
//! character diff can always be computed between the old and new value.

use crate::model::FieldValue;

/// Render a value as comparable text.
///
/// | value | text |
/// |-------|------|
/// | absent, null | `""` |
/// | `true` / `false` | `"1"` / `"0"` |
/// | text | itself |
/// | number | decimal, exponent form outside `[1e-6, 1e21)`; NaN as `""` |
/// | date | epoch milliseconds |
/// | object, array | compact JSON |
pub fn normalize(value: Option<&FieldValue>) -> String {
    match value {
        None | Some(FieldValue::Null) => String::new(),
        Some(FieldValue::Bool(true)) => "1".to_string(),
        Some(FieldValue::Bool(false)) => "0".to_string(),
        Some(FieldValue::Text(s)) => s.clone(),
        Some(FieldValue::Number(n)) => format_number(*n),
        Some(FieldValue::Date(d)) => d.timestamp_millis().to_string(),
        Some(nested @ (FieldValue::Object(_) | FieldValue::Array(_))) => {
            serde_json::to_string(&nested.to_json()).unwrap_or_default()
        }
    }
}

fn format_number(n: f64) -> String {
    let magnitude = n.abs();
    if n.is_nan() {
        String::new()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if magnitude != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        exponent_form(n)
    } else if n.fract() == 0.0 {
        // -0 renders as "0"
        format!("{}", n as i128)
    } else {
        n.to_string()
    }
}

/// Shortest mantissa with a signed exponent: `1e+21`, `1.5e-7`
fn exponent_form(n: f64) -> String {
    let text = format!("{:e}", n);
    match text.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => text,
    }
}
