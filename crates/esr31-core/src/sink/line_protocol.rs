use super::{FieldValue, SinkRecord};

/// Render records as InfluxDB line protocol, one point per line.
///
/// No timestamp is written; the database stamps points on arrival.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
///
/// use esr31_core::{FieldValue, SinkRecord, line_protocol};
///
/// let record = SinkRecord {
///     measurement: "SOLART1".to_string(),
///     fields: BTreeMap::from([("temp".to_string(), FieldValue::Float(23.4))]),
/// };
/// assert_eq!(line_protocol::render(&[record]), "SOLART1 temp=23.4\n");
/// ```
pub fn render(records: &[SinkRecord]) -> String {
    let mut out = String::new();
    for record in records {
        if record.fields.is_empty() {
            continue;
        }
        out.push_str(&escape(&record.measurement, &[',', ' ']));
        out.push(' ');
        let fields = record
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), format_value(value)))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&fields);
        out.push('\n');
    }
    out
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Float(v) => format!("{v}"),
        FieldValue::Integer(v) => format!("{v}i"),
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '\\' || special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::render;
    use crate::sink::{FieldValue, SinkRecord};

    fn record(name: &str, key: &str, value: FieldValue) -> SinkRecord {
        SinkRecord {
            measurement: name.to_string(),
            fields: BTreeMap::from([(key.to_string(), value)]),
        }
    }

    #[test]
    fn renders_float_and_integer_fields() {
        let body = render(&[
            record("SOLART1", "temp", FieldValue::Float(-5.0)),
            record("SOLARO1", "state", FieldValue::Integer(0)),
        ]);
        assert_eq!(body, "SOLART1 temp=-5\nSOLARO1 state=0i\n");
    }

    #[test]
    fn escapes_special_characters() {
        let body = render(&[record("a b,c", "k=v", FieldValue::Integer(1))]);
        assert_eq!(body, "a\\ b\\,c k\\=v=1i\n");
    }

    #[test]
    fn record_without_fields_is_skipped() {
        let empty = SinkRecord {
            measurement: "X".to_string(),
            fields: BTreeMap::new(),
        };
        assert_eq!(render(&[empty]), "");
    }
}
