use crate::error::{Result, SnipqError};
use crate::value::{Params, Value};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// A trigger split into its lookup key and query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTrigger {
    pub trigger: String,
    pub params: BTreeMap<String, String>,
}

/// Split a raw trigger at the first `?` and decode the query part.
pub fn parse_trigger(raw: &str) -> Result<ParsedTrigger> {
    let (trigger_part, query_part) = match raw.split_once('?') {
        Some((trigger, query)) => (trigger, Some(query)),
        None => (raw, None),
    };

    let mut params = BTreeMap::new();
    if let Some(query) = query_part {
        check_percent_encoding(query).map_err(|reason| SnipqError::Parse {
            trigger: raw.to_string(),
            reason,
        })?;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            // First occurrence of a repeated key wins
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }

    Ok(ParsedTrigger {
        trigger: normalize_trigger(trigger_part),
        params,
    })
}

/// `form_urlencoded` decodes leniently, so reject stray `%` up front.
fn check_percent_encoding(query: &str) -> std::result::Result<(), String> {
    let bytes = query.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(bytes.len());
                return Err(format!(
                    "invalid URL escape \"{}\"",
                    String::from_utf8_lossy(&bytes[i..end])
                ));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Overlay parameters: global defaults < snippet defaults < query params.
pub fn merge_params(
    query_params: &BTreeMap<String, String>,
    snippet_defaults: &Params,
    global_defaults: &Params,
) -> Params {
    let mut result = global_defaults.clone();

    for (key, value) in snippet_defaults {
        result.insert(key.clone(), value.clone());
    }

    for (key, value) in query_params {
        result.insert(key.clone(), coerce_query_value(value));
    }

    result
}

/// Query values arrive as strings; recognise the usual boolean spellings.
pub fn coerce_query_value(value: &str) -> Value {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Value::Bool(true),
        "false" | "0" | "no" | "off" => Value::Bool(false),
        _ => Value::Str(value.to_string()),
    }
}

pub fn normalize_trigger(trigger: &str) -> String {
    trigger.trim().to_string()
}

/// A trigger is usable when it is non-empty and has no whitespace.
pub fn validate_trigger(trigger: &str) -> bool {
    !trigger.is_empty() && !trigger.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_trigger_with_query() {
        let parsed = parse_trigger(":ty?lang=vi&tone=casual").unwrap();
        assert_eq!(parsed.trigger, ":ty");
        assert_eq!(parsed.params, params(&[("lang", "vi"), ("tone", "casual")]));
    }

    #[test]
    fn test_parse_trigger_without_query() {
        let parsed = parse_trigger("  :hello  ").unwrap();
        assert_eq!(parsed.trigger, ":hello");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_parse_trigger_empty_value_is_present() {
        let parsed = parse_trigger(":date?format=").unwrap();
        assert_eq!(parsed.params, params(&[("format", "")]));
    }

    #[test]
    fn test_parse_trigger_key_without_equals() {
        let parsed = parse_trigger(":sig?formal").unwrap();
        assert_eq!(parsed.params, params(&[("formal", "")]));
    }

    #[test]
    fn test_parse_trigger_first_value_wins() {
        let parsed = parse_trigger(":x?a=1&a=2").unwrap();
        assert_eq!(parsed.params["a"], "1");
    }

    #[test]
    fn test_parse_trigger_percent_decoding() {
        let parsed = parse_trigger(":date?format=Mon%2C%2002%20Jan&who=a+b").unwrap();
        assert_eq!(parsed.params["format"], "Mon, 02 Jan");
        assert_eq!(parsed.params["who"], "a b");
    }

    #[test]
    fn test_parse_trigger_splits_at_first_question_mark() {
        let parsed = parse_trigger(":q?text=why?").unwrap();
        assert_eq!(parsed.trigger, ":q");
        assert_eq!(parsed.params["text"], "why?");
    }

    #[test]
    fn test_parse_trigger_malformed_escape() {
        let err = parse_trigger(":x?a=%zz").unwrap_err();
        assert!(matches!(err, SnipqError::Parse { .. }));

        let err = parse_trigger(":x?a=50%").unwrap_err();
        assert!(matches!(err, SnipqError::Parse { .. }));
    }

    #[test]
    fn test_merge_params_priority() {
        let mut global = Params::new();
        global.insert("lang".into(), Value::from("en"));
        global.insert("tone".into(), Value::from("neutral"));
        global.insert("locale".into(), Value::from("en-US"));

        let mut defaults = Params::new();
        defaults.insert("lang".into(), Value::from("fr"));
        defaults.insert("tone".into(), Value::from("formal"));

        let merged = merge_params(&params(&[("lang", "vi")]), &defaults, &global);
        assert_eq!(merged["lang"], Value::from("vi"));
        assert_eq!(merged["tone"], Value::from("formal"));
        assert_eq!(merged["locale"], Value::from("en-US"));
    }

    #[test]
    fn test_merge_params_boolean_coercion() {
        let merged = merge_params(
            &params(&[("upper", "true"), ("a", "YES"), ("b", "off"), ("c", "0"), ("d", "maybe")]),
            &Params::new(),
            &Params::new(),
        );
        assert_eq!(merged["upper"], Value::Bool(true));
        assert_eq!(merged["a"], Value::Bool(true));
        assert_eq!(merged["b"], Value::Bool(false));
        assert_eq!(merged["c"], Value::Bool(false));
        assert_eq!(merged["d"], Value::from("maybe"));
    }

    #[test]
    fn test_validate_trigger() {
        assert!(validate_trigger(":ty"));
        assert!(!validate_trigger(""));
        assert!(!validate_trigger(":t y"));
        assert!(!validate_trigger(":ty\n"));
        assert!(!validate_trigger("\t:ty"));
    }
}
