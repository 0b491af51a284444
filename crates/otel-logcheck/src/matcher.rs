//! Field-by-field comparison of an expected attribute set with a record.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Result, ValidationError};
use crate::expectation::ExpectedAttributeSet;
use crate::flatten::{stringify, FlatRecord};
use crate::path::FieldPath;

/// Checks every expected key against the retrieved record, in order.
///
/// Each expected value is a regular expression that must match somewhere
/// in the stringified actual value. Expected arrays are checked element by
/// element under indexed keys. The first failing key ends the check.
///
/// # Errors
///
/// - [`ValidationError::ExpectedLogNotFound`] if a key is missing
/// - [`ValidationError::DataModelMismatch`] if a value does not match
/// - [`ValidationError::InvalidPattern`] if an expected value is not a regex
pub fn match_attributes(expected: &ExpectedAttributeSet, actual: &FlatRecord) -> Result<()> {
    for (key, value) in expected.iter() {
        match value {
            Value::Array(items) if !items.is_empty() => {
                let path = FieldPath::parse_flat_key(key)
                    .map_err(|e| ValidationError::InvalidExpectation(e.to_string()))?;
                match_array(&path, items, actual)?;
            }
            Value::Array(_) => {
                require(key, actual)?;
            }
            pattern => match_value(key, pattern, actual)?,
        }
    }
    debug!(keys = expected.len(), "all expected attributes matched");
    Ok(())
}

fn match_array(path: &FieldPath, items: &[Value], actual: &FlatRecord) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        let element = path.clone().index(index);
        match item {
            Value::Object(fields) => {
                for (sub_key, sub_value) in fields {
                    let sub_path = FieldPath::parse_flat_key(sub_key)
                        .map_err(|e| ValidationError::InvalidExpectation(e.to_string()))?;
                    let nested = FieldPath::from_segments(
                        element
                            .segments()
                            .iter()
                            .chain(sub_path.segments())
                            .cloned()
                            .collect(),
                    );
                    match sub_value {
                        Value::Array(inner) if !inner.is_empty() => {
                            match_array(&nested, inner, actual)?;
                        }
                        pattern => match_value(&nested.to_flat_key(), pattern, actual)?,
                    }
                }
            }
            Value::Array(inner) if !inner.is_empty() => match_array(&element, inner, actual)?,
            pattern => match_value(&element.to_flat_key(), pattern, actual)?,
        }
    }
    Ok(())
}

fn require<'a>(key: &str, actual: &'a FlatRecord) -> Result<&'a Value> {
    actual.resolve(key).ok_or_else(|| {
        error!(key, "expected key missing from retrieved log");
        ValidationError::missing_key(key)
    })
}

fn match_value(key: &str, expected: &Value, actual: &FlatRecord) -> Result<()> {
    let found = require(key, actual)?;
    let pattern = stringify(expected);
    let regex = Regex::new(&pattern).map_err(|source| ValidationError::InvalidPattern {
        key: key.to_string(),
        source,
    })?;

    let actual_text = stringify(found);
    if regex.is_match(&actual_text) {
        Ok(())
    } else {
        error!(key, expected = %pattern, actual = %actual_text, "log attribute mismatch");
        Err(ValidationError::DataModelMismatch {
            key: key.to_string(),
            expected: pattern,
            actual: actual_text,
            filter: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::{flatten, FlattenMode};
    use serde_json::json;
    use test_case::test_case;

    fn expected(doc: &Value) -> ExpectedAttributeSet {
        ExpectedAttributeSet::new(flatten(doc, FlattenMode::KeepArrays))
    }

    fn actual(doc: &Value, mode: FlattenMode) -> FlatRecord {
        flatten(doc, mode)
    }

    #[test]
    fn literal_and_regex_values_match() {
        let exp = expected(&json!({
            "Service": "orders",
            "Operation": "GET /items",
            "Latency": "^\\d+(\\.\\d+)?$"
        }));
        let act = actual(
            &json!({"Service": "orders", "Operation": "GET /items", "Latency": 12.5, "Extra": 1}),
            FlattenMode::Exploded,
        );
        assert!(match_attributes(&exp, &act).is_ok());
    }

    #[test]
    fn pattern_is_found_not_fully_matched() {
        let exp = expected(&json!({"Operation": "items"}));
        let act = actual(&json!({"Operation": "GET /items/{id}"}), FlattenMode::Exploded);
        assert!(match_attributes(&exp, &act).is_ok());
    }

    #[test]
    fn missing_key_is_not_found() {
        let exp = expected(&json!({"Service": "orders", "RemoteService": "payments"}));
        let act = actual(&json!({"Service": "orders"}), FlattenMode::Exploded);

        assert!(matches!(
            match_attributes(&exp, &act),
            Err(ValidationError::ExpectedLogNotFound { key: Some(ref k), filter: None })
                if k == "RemoteService"
        ));
    }

    #[test]
    fn mismatch_reports_key_and_values() {
        let exp = expected(&json!({"Service": "orders", "Operation": "^POST"}));
        let act = actual(&json!({"Service": "orders", "Operation": "GET /items"}), FlattenMode::Exploded);

        assert!(matches!(
            match_attributes(&exp, &act),
            Err(ValidationError::DataModelMismatch { ref key, ref expected, ref actual, .. })
                if key == "Operation" && expected == "^POST" && actual == "GET /items"
        ));
    }

    #[test]
    fn first_failing_key_wins() {
        let exp = expected(&json!({"A": "x", "B": "y"}));
        let act = actual(&json!({"A": "nope"}), FlattenMode::Exploded);
        assert!(matches!(
            match_attributes(&exp, &act),
            Err(ValidationError::DataModelMismatch { ref key, .. }) if key == "A"
        ));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let exp = expected(&json!({"Operation": "GET /items/(unclosed"}));
        let act = actual(&json!({"Operation": "GET /items/(unclosed"}), FlattenMode::Exploded);
        assert!(matches!(
            match_attributes(&exp, &act),
            Err(ValidationError::InvalidPattern { ref key, .. }) if key == "Operation"
        ));
    }

    #[test_case(json!(9), "^9$" ; "number")]
    #[test_case(json!(true), "true" ; "boolean")]
    #[test_case(json!(null), "null" ; "null")]
    #[test_case(json!({"k": 1}), "\\{\"k\":1\\}" ; "object")]
    fn non_string_actuals_are_stringified(value: Value, pattern: &str) {
        let exp = expected(&json!({"field": pattern}));
        let act: FlatRecord = [("field", value)].into_iter().collect();
        assert!(match_attributes(&exp, &act).is_ok());
    }

    #[test]
    fn span_attribute_keys_match() {
        let exp = expected(&json!({"attributes": {"aws.local.operation": "GET /items"}}));
        let act = actual(
            &json!({"attributes": {"aws.local.operation": "GET /items", "aws.local.service": "orders"}}),
            FlattenMode::Exploded,
        );
        assert!(match_attributes(&exp, &act).is_ok());
    }

    #[test]
    fn expected_arrays_compare_element_wise() {
        let exp = expected(&json!({
            "body": {
                "input": {"messages": [{"role": "user", "content": "^What"}]},
                "output": {"messages": [{"role": "assistant"}]}
            }
        }));
        let act = actual(
            &json!({
                "body": {
                    "input": {"messages": [{"role": "user", "content": "What is the weather?"}]},
                    "output": {"messages": [{"role": "assistant", "content": "Sunny"}]}
                }
            }),
            FlattenMode::KeepArrays,
        );
        assert!(match_attributes(&exp, &act).is_ok());
    }

    #[test]
    fn missing_array_element_names_indexed_key() {
        let exp = expected(&json!({"body": {"input": {"messages": [{"role": "user"}, {"role": "tool"}]}}}));
        let act = actual(
            &json!({"body": {"input": {"messages": [{"role": "user"}]}}}),
            FlattenMode::KeepArrays,
        );

        assert!(matches!(
            match_attributes(&exp, &act),
            Err(ValidationError::ExpectedLogNotFound { key: Some(ref k), .. })
                if k == "body.input.messages[1].role"
        ));
    }

    #[test]
    fn scalar_arrays_compare_by_index() {
        let exp = expected(&json!({"tags": ["^a", "b$"]}));
        let ok = actual(&json!({"tags": ["abc", "xyb"]}), FlattenMode::KeepArrays);
        assert!(match_attributes(&exp, &ok).is_ok());

        let bad = actual(&json!({"tags": ["abc", "bxy"]}), FlattenMode::KeepArrays);
        assert!(matches!(
            match_attributes(&exp, &bad),
            Err(ValidationError::DataModelMismatch { ref key, .. }) if key == "tags[1]"
        ));
    }

    #[test]
    fn empty_expected_array_only_requires_key() {
        let exp = expected(&json!({"tags": []}));
        let present = actual(&json!({"tags": ["x"]}), FlattenMode::KeepArrays);
        assert!(match_attributes(&exp, &present).is_ok());

        let absent = actual(&json!({"other": 1}), FlattenMode::KeepArrays);
        assert!(matches!(
            match_attributes(&exp, &absent),
            Err(ValidationError::ExpectedLogNotFound { key: Some(ref k), .. }) if k == "tags"
        ));
    }
}
