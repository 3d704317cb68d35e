//! Rendering helpers: depth-limited JSON and plain aligned tables.
//!
//! Output is for operators; no machine-checked schema is promised.

use serde_json::Value;

/// Clone a value, replacing everything below `max_depth` with a short
/// placeholder summary.
pub fn clip_depth(value: &Value, max_depth: usize) -> Value {
    fn go(value: &Value, depth: usize, max: usize) -> Value {
        if depth >= max {
            return match value {
                Value::Object(map) if !map.is_empty() => {
                    Value::String(format!("{{... {} fields}}", map.len()))
                }
                Value::Array(items) if !items.is_empty() => {
                    Value::String(format!("[... {} items]", items.len()))
                }
                other => other.clone(),
            };
        }

        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), go(v, depth + 1, max)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| go(v, depth + 1, max)).collect())
            }
            other => other.clone(),
        }
    }

    go(value, 0, max_depth)
}

/// Pretty-print a labeled JSON payload, clipped to `max_depth`.
pub fn print_json(label: &str, value: &Value, max_depth: usize) {
    let clipped = clip_depth(value, max_depth);
    let rendered =
        serde_json::to_string_pretty(&clipped).unwrap_or_else(|_| clipped.to_string());
    println!("\n=== {label} ===\n{rendered}");
}

/// Render rows under headers with space-aligned columns.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    let render_row = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    out.push_str(&render_row(&header_cells));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in rows {
        out.push('\n');
        out.push_str(&render_row(row));
    }
    out
}

/// Print a labeled table.
pub fn print_table(label: &str, headers: &[&str], rows: &[Vec<String>]) {
    println!("\n=== {label} ===\n{}", render_table(headers, rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clip_depth_replaces_deep_values() {
        let value = json!({"a": {"b": {"c": 1}}, "n": 5});
        let clipped = clip_depth(&value, 2);

        assert_eq!(clipped["n"], 5);
        assert_eq!(clipped["a"]["b"], "{... 1 fields}");
    }

    #[test]
    fn test_clip_depth_keeps_scalars_at_limit() {
        let value = json!({"a": {"b": 1, "empty": {}}});
        let clipped = clip_depth(&value, 2);

        assert_eq!(clipped["a"]["b"], 1);
        assert_eq!(clipped["a"]["empty"], json!({}));
    }

    #[test]
    fn test_render_table_alignment() {
        let rows = vec![
            vec!["allow-office".to_string(), "10.0.0.1".to_string()],
            vec!["ci".to_string(), "10.20.30.40".to_string()],
        ];
        let table = render_table(&["NAME", "START"], &rows);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[2].starts_with("allow-office  10.0.0.1"));
        assert!(lines[3].starts_with("ci            10.20.30.40"));
    }
}
