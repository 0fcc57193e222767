//! Attribute value validation
//!
//! Checks a typed value against its definition's kind and constraints,
//! collecting every failing check rather than stopping at the first.

use crate::core::value::AttributeValue;

use super::attribute::AttributeDefinition;

/// Validate a value against its definition.
///
/// Returns the normalized value (currently: multiselect entries de-duplicated,
/// order preserved) or the full list of failure reasons. A kind mismatch is
/// reported alone, since the per-kind checks are meaningless against the
/// wrong shape.
pub fn validate_value(
    def: &AttributeDefinition,
    value: &AttributeValue,
) -> Result<AttributeValue, Vec<String>> {
    if value.kind() != def.kind {
        return Err(vec![format!(
            "attribute '{}' expects a {} value, got {}",
            def.code,
            def.kind,
            value.kind()
        )]);
    }

    let c = &def.constraints;
    let mut reasons = Vec::new();
    let mut normalized = value.clone();

    match value {
        AttributeValue::Text(s) => {
            let len = s.chars().count();
            if let Some(min) = c.min_length {
                if len < min {
                    reasons.push(format!(
                        "attribute '{}' must be at least {} characters (got {})",
                        def.code, min, len
                    ));
                }
            }
            if let Some(max) = c.max_length {
                if len > max {
                    reasons.push(format!(
                        "attribute '{}' must be at most {} characters (got {})",
                        def.code, max, len
                    ));
                }
            }
            if let Some(pattern) = &c.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) => {
                        if !re.is_match(s) {
                            reasons.push(format!(
                                "attribute '{}' must match pattern '{}'",
                                def.code, pattern
                            ));
                        }
                    }
                    Err(e) => reasons.push(format!(
                        "attribute '{}' has an invalid pattern constraint: {}",
                        def.code, e
                    )),
                }
            }
        }

        AttributeValue::Number(n) => {
            // Bounds compare on the coerced numeric value, never on a string
            // rendering of it.
            let n = *n;
            if let Some(min) = c.min_value {
                if n < min {
                    reasons.push(format!(
                        "attribute '{}' must be >= {} (got {})",
                        def.code, min, n
                    ));
                }
            }
            if let Some(max) = c.max_value {
                if n > max {
                    reasons.push(format!(
                        "attribute '{}' must be <= {} (got {})",
                        def.code, max, n
                    ));
                }
            }
            if c.integer && n.fract() != 0.0 {
                reasons.push(format!(
                    "attribute '{}' must be an integer (got {})",
                    def.code, n
                ));
            }
            if c.positive && n <= 0.0 {
                reasons.push(format!(
                    "attribute '{}' must be positive (got {})",
                    def.code, n
                ));
            }
            if c.negative && n >= 0.0 {
                reasons.push(format!(
                    "attribute '{}' must be negative (got {})",
                    def.code, n
                ));
            }
            if c.nonzero && n == 0.0 {
                reasons.push(format!("attribute '{}' must not be zero", def.code));
            }
            if let Some(digits) = c.digits {
                let count = integer_digits(n);
                if count != digits {
                    reasons.push(format!(
                        "attribute '{}' must have exactly {} digits (got {})",
                        def.code, digits, count
                    ));
                }
            }
        }

        AttributeValue::Date(d) => {
            if let Some(min) = c.min_date {
                if *d < min {
                    reasons.push(format!(
                        "attribute '{}' must be on or after {} (got {})",
                        def.code, min, d
                    ));
                }
            }
            if let Some(max) = c.max_date {
                if *d > max {
                    reasons.push(format!(
                        "attribute '{}' must be on or before {} (got {})",
                        def.code, max, d
                    ));
                }
            }
        }

        AttributeValue::Boolean(_) => {}

        AttributeValue::Select(s) => {
            if !def.options.is_empty() && !def.options.contains(s) {
                reasons.push(format!(
                    "attribute '{}' value '{}' is not one of the declared options",
                    def.code, s
                ));
            }
        }

        AttributeValue::MultiSelect(values) => {
            let mut deduped: Vec<String> = Vec::with_capacity(values.len());
            for v in values {
                if !deduped.contains(v) {
                    deduped.push(v.clone());
                }
                if !def.options.is_empty() && !def.options.contains(v) {
                    reasons.push(format!(
                        "attribute '{}' value '{}' is not one of the declared options",
                        def.code, v
                    ));
                }
            }
            let count = deduped.len();
            if let Some(min) = c.min_selected {
                if count < min {
                    reasons.push(format!(
                        "attribute '{}' requires at least {} selections (got {})",
                        def.code, min, count
                    ));
                }
            }
            if let Some(max) = c.max_selected {
                if count > max {
                    reasons.push(format!(
                        "attribute '{}' allows at most {} selections (got {})",
                        def.code, max, count
                    ));
                }
            }
            normalized = AttributeValue::MultiSelect(deduped);
        }

        AttributeValue::Table(rows) => {
            if !c.columns.is_empty() {
                for (i, row) in rows.iter().enumerate() {
                    for col in row.keys() {
                        if !c.columns.contains(col) {
                            reasons.push(format!(
                                "attribute '{}' row {} has undeclared column '{}'",
                                def.code, i, col
                            ));
                        }
                    }
                }
            }
            if let Some(min) = c.min_rows {
                if rows.len() < min {
                    reasons.push(format!(
                        "attribute '{}' requires at least {} rows (got {})",
                        def.code,
                        min,
                        rows.len()
                    ));
                }
            }
            if let Some(max) = c.max_rows {
                if rows.len() > max {
                    reasons.push(format!(
                        "attribute '{}' allows at most {} rows (got {})",
                        def.code,
                        max,
                        rows.len()
                    ));
                }
            }
        }
    }

    if reasons.is_empty() {
        Ok(normalized)
    } else {
        Err(reasons)
    }
}

/// Count of integer digits of the truncated absolute value (0 has one digit)
fn integer_digits(n: f64) -> u32 {
    let mut t = n.abs().trunc();
    if t < 1.0 {
        return 1;
    }
    let mut count = 0;
    while t >= 1.0 {
        t /= 10.0;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::attribute::AttributeDefinition;
    use crate::core::value::AttributeKind;

    fn number_attr(code: &str) -> AttributeDefinition {
        AttributeDefinition::new(code.into(), AttributeKind::Number, true, "test")
    }

    #[test]
    fn test_kind_mismatch_short_circuits() {
        let def = number_attr("screen_size");
        let err = validate_value(&def, &AttributeValue::Text("42".into())).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err[0].contains("expects a number value"));
    }

    #[test]
    fn test_numeric_bounds_on_coerced_value() {
        let mut def = number_attr("screen_size");
        def.constraints.min_value = Some(10.0);
        def.constraints.max_value = Some(100.0);

        // "9" < "10" lexically is false; numerically 9 < 10 must fail the bound
        let err = validate_value(&def, &AttributeValue::Number(9.0)).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(validate_value(&def, &AttributeValue::Number(55.0)).is_ok());
    }

    #[test]
    fn test_number_constraint_reasons_accumulate() {
        let mut def = number_attr("qty");
        def.constraints.integer = true;
        def.constraints.positive = true;
        let err = validate_value(&def, &AttributeValue::Number(-1.5)).unwrap_err();
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn test_digit_count() {
        let mut def = number_attr("year");
        def.constraints.digits = Some(4);
        assert!(validate_value(&def, &AttributeValue::Number(2024.0)).is_ok());
        assert!(validate_value(&def, &AttributeValue::Number(202.0)).is_err());
    }

    #[test]
    fn test_text_pattern_and_length() {
        let mut def = AttributeDefinition::new("sku".into(), AttributeKind::Text, true, "test");
        def.constraints.pattern = Some("^[A-Z]{3}-\\d+$".into());
        def.constraints.max_length = Some(10);

        assert!(validate_value(&def, &AttributeValue::Text("ABC-123".into())).is_ok());
        let err = validate_value(&def, &AttributeValue::Text("abc-123".into())).unwrap_err();
        assert!(err[0].contains("pattern"));
    }

    #[test]
    fn test_select_must_match_options() {
        let mut def = AttributeDefinition::new("panel".into(), AttributeKind::Select, true, "test");
        def.options = vec!["led".into(), "oled".into()];
        assert!(validate_value(&def, &AttributeValue::Select("led".into())).is_ok());
        assert!(validate_value(&def, &AttributeValue::Select("plasma".into())).is_err());
    }

    #[test]
    fn test_multiselect_dedup_and_bounds() {
        let mut def =
            AttributeDefinition::new("ports".into(), AttributeKind::MultiSelect, true, "test");
        def.options = vec!["hdmi".into(), "usb".into(), "vga".into()];
        def.constraints.max_selected = Some(2);

        let v = AttributeValue::MultiSelect(vec!["hdmi".into(), "hdmi".into(), "usb".into()]);
        let normalized = validate_value(&def, &v).unwrap();
        assert_eq!(
            normalized,
            AttributeValue::MultiSelect(vec!["hdmi".into(), "usb".into()])
        );
    }

    #[test]
    fn test_table_shape_and_rows() {
        let mut def = AttributeDefinition::new("specs".into(), AttributeKind::Table, true, "test");
        def.constraints.columns = vec!["key".into(), "value".into()];
        def.constraints.max_rows = Some(1);

        let mut row = crate::core::value::TableRow::new();
        row.insert("key".into(), serde_json::json!("weight"));
        row.insert("extra".into(), serde_json::json!("x"));
        let err = validate_value(&def, &AttributeValue::Table(vec![row.clone(), row])).unwrap_err();
        assert!(err.iter().any(|r| r.contains("undeclared column")));
        assert!(err.iter().any(|r| r.contains("at most 1 rows")));
    }

    #[test]
    fn test_date_bounds() {
        let mut def = AttributeDefinition::new("launch".into(), AttributeKind::Date, true, "test");
        def.constraints.min_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 1);
        let early = chrono::NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        assert!(validate_value(&def, &AttributeValue::Date(early)).is_err());
    }
}
