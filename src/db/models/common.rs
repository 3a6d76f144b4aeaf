//! Types and helpers shared across models.

use serde::{Deserialize, Serialize};

/// One entry of a psychologist's education history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Education {
    pub year: i32,
    /// Kind of study ("университет", "курс", ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub title: String,
    /// Diplomas count toward the education tally, everything else is a course
    #[serde(default)]
    pub is_diploma: bool,
}

/// Helper to parse a JSON string array column
pub fn parse_string_list(json: Option<&str>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Helper to serialize a string list for a JSON TEXT column
pub fn serialize_string_list(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        serde_json::to_string(items).ok()
    }
}

/// Helper to parse the education JSON column
pub fn parse_education(json: Option<&str>) -> Vec<Education> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Helper to serialize education entries for the JSON TEXT column
pub fn serialize_education(entries: &[Education]) -> Option<String> {
    if entries.is_empty() {
        None
    } else {
        serde_json::to_string(entries).ok()
    }
}

/// Partition education entries into (diplomas, courses) counts
pub fn education_counts(entries: &[Education]) -> (i64, i64) {
    let diplomas = entries.iter().filter(|e| e.is_diploma).count() as i64;
    (diplomas, entries.len() as i64 - diplomas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(is_diploma: bool) -> Education {
        Education {
            year: 2015,
            kind: "университет".to_string(),
            organization: "МГУ".to_string(),
            title: "Клиническая психология".to_string(),
            is_diploma,
        }
    }

    #[test]
    fn education_counts_partition_on_diploma_flag() {
        let entries = vec![entry(true), entry(false), entry(true), entry(false)];
        let (diplomas, courses) = education_counts(&entries);
        assert_eq!(diplomas, 2);
        assert_eq!(courses, 2);
        assert_eq!(diplomas + courses, entries.len() as i64);
    }

    #[test]
    fn education_round_trips_through_json_column() {
        let entries = vec![entry(true), entry(false)];
        let json = serialize_education(&entries).unwrap();
        assert_eq!(parse_education(Some(&json)), entries);
    }

    #[test]
    fn education_accepts_form_field_names() {
        let parsed = parse_education(Some(
            r#"[{"year": 2020, "type": "курс", "title": "КПТ", "is_diploma": false}]"#,
        ));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, "курс");
        assert!(!parsed[0].is_diploma);
    }

    #[test]
    fn malformed_json_columns_parse_as_empty() {
        assert!(parse_string_list(Some("not json")).is_empty());
        assert!(parse_string_list(None).is_empty());
        assert!(parse_education(Some("{broken")).is_empty());
    }

    #[test]
    fn empty_lists_serialize_as_null_columns() {
        assert_eq!(serialize_string_list(&[]), None);
        assert_eq!(serialize_education(&[]), None);
    }
}
