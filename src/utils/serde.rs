/*!
 * Lenient value helpers for broker payloads.
 *
 * Broker alerts and lightcurve items are loosely typed JSON: numeric fields
 * sometimes arrive as strings, and absent values arrive as `null`. Cache
 * files are CSV, so pass-through columns travel as text. These helpers
 * convert between the two representations consistently.
 */

use serde_json::Value;

/// Read a JSON value as a float, accepting numbers and numeric strings.
///
/// `null`, booleans, non-numeric strings and containers yield `None`, as do
/// non-finite results.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Read a JSON value as an integer, accepting integral floats and numeric strings.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Render a JSON value as a CSV cell (`null` becomes an empty cell)
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Parse a CSV cell back into a JSON value (numbers first, then text)
pub fn cell_to_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&json!(42.5)), Some(42.5));
        assert_eq!(value_as_f64(&json!("60123.25")), Some(60123.25));
        assert_eq!(value_as_f64(&json!(null)), None);
        assert_eq!(value_as_f64(&json!("n/a")), None);
        assert_eq!(value_as_f64(&json!([1.0])), None);
    }

    #[test]
    fn test_value_as_i64() {
        assert_eq!(value_as_i64(&json!(2345678901234_i64)), Some(2345678901234));
        assert_eq!(value_as_i64(&json!(7.0)), Some(7));
        assert_eq!(value_as_i64(&json!(7.5)), None);
        assert_eq!(value_as_i64(&json!("12")), Some(12));
    }

    #[test]
    fn test_cell_conversions() {
        assert_eq!(cell_to_value(""), Value::Null);
        assert_eq!(cell_to_value("3"), json!(3));
        assert_eq!(cell_to_value("3.25"), json!(3.25));
        assert_eq!(cell_to_value("ZTF23aaaaaaa"), json!("ZTF23aaaaaaa"));
        assert_eq!(value_to_cell(&json!(null)), "");
        assert_eq!(value_to_cell(&json!("abc")), "abc");
        assert_eq!(value_to_cell(&json!(1.5)), "1.5");
    }
}
