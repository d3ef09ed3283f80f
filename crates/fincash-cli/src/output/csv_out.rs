use serde_json::{Map, Value};
use std::io::{self, Write};

/// Write output as CSV to stdout.
///
/// Scalar fields of the result become `field,value` rows (nested objects
/// use dotted names such as `key_ratios.revenue_multiple`). Every list of
/// records found on the way (`schedule`, `projections`, `discounted_flows`,
/// `coupon_schedule`, sensitivity points) follows as its own block: a line
/// with the dotted name, a header row, then one row per record.
pub fn print_csv(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    write_csv(stdout.lock(), value)
}

fn write_csv<W: Write>(out: W, value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            let mut fields = Vec::new();
            let mut blocks = Vec::new();
            flatten("", body, &mut fields, &mut blocks);

            wtr.write_record(["field", "value"])?;
            for (name, val) in &fields {
                wtr.write_record([name.as_str(), val.as_str()])?;
            }
            for (name, rows) in blocks {
                wtr.write_record([""])?;
                wtr.write_record([name.as_str()])?;
                write_rows(&mut wtr, rows)?;
            }
        }
        Value::Array(rows) => write_rows(&mut wtr, rows)?,
        other => wtr.write_record([format_csv_value(other)])?,
    }

    wtr.flush()?;
    Ok(())
}

/// Split an object into dotted scalar fields and record lists.
fn flatten<'a>(
    prefix: &str,
    map: &'a Map<String, Value>,
    fields: &mut Vec<(String, String)>,
    blocks: &mut Vec<(String, &'a [Value])>,
) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten(&name, inner, fields, blocks),
            Value::Array(rows) if rows.first().is_some_and(Value::is_object) => {
                blocks.push((name, rows.as_slice()));
            }
            _ => fields.push((name, format_csv_value(val))),
        }
    }
}

fn write_rows<W: Write>(
    wtr: &mut csv::Writer<W>,
    rows: &[Value],
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([format_csv_value(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    wtr.write_record(&headers)?;
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                .collect();
            wtr.write_record(&row)?;
        }
    }
    Ok(())
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(format_csv_value)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: &Value) -> String {
        let mut buf = Vec::new();
        write_csv(&mut buf, value).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_schedule_rows_become_a_block() {
        let envelope = json!({
            "result": {
                "initial_payment": "1010",
                "schedule": [
                    { "period": 1, "payment": "510", "remaining_balance": "500" },
                    { "period": 2, "payment": "505", "remaining_balance": "0" }
                ]
            },
            "warnings": []
        });
        let text = render(&envelope);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "field,value");
        assert_eq!(lines[1], "initial_payment,1010");
        assert!(lines.contains(&"schedule"));
        // Record keys come out in map order
        assert!(lines.contains(&"payment,period,remaining_balance"));
        assert!(lines.contains(&"505,2,0"));
        assert!(!text.contains("warnings"));
    }

    #[test]
    fn test_nested_objects_use_dotted_names() {
        let envelope = json!({
            "result": {
                "key_ratios": { "revenue_multiple": "2.5" },
                "sensitivity": {
                    "growth_rate": {
                        "variable": "growth_rate",
                        "points": [{ "tested_value": "0.03", "output": "100" }]
                    }
                },
                "recommendations": ["a", "b"]
            }
        });
        let text = render(&envelope);
        assert!(text.contains("key_ratios.revenue_multiple,2.5"));
        assert!(text.contains("sensitivity.growth_rate.variable,growth_rate"));
        assert!(text.contains("sensitivity.growth_rate.points\n"));
        assert!(text.contains("recommendations,a; b"));
    }

    #[test]
    fn test_top_level_list_of_models() {
        let models = json!([
            { "kind": "dcf", "parameters": ["growth_rate", "discount_rate"] },
            { "kind": "black_scholes", "parameters": ["volatility"] }
        ]);
        let text = render(&models);
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec!["kind,parameters", "dcf,growth_rate; discount_rate", "black_scholes,volatility"]
        );
    }
}
