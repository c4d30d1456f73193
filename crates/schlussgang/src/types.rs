use std::collections::BTreeSet;
use std::fmt::Display;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const NAME_KEY: &str = "Name";

/// One scraped portrait: label/value pairs in the order they appeared on the page.
///
/// The `Name` field is set on construction and can never be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    fields: Vec<(String, String)>,
}

impl SubjectRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            fields: vec![(NAME_KEY.to_string(), name.into())],
        }
    }

    pub fn name(&self) -> &str {
        self.get(NAME_KEY).unwrap_or_default()
    }

    /// Inserts a field, replacing the value in place when the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for SubjectRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl Display for SubjectRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "┌─ {}", self.name())?;
        for (k, v) in self.iter().filter(|(k, _)| *k != NAME_KEY) {
            writeln!(f, "│  {}: {}", k, v)?;
        }
        write!(f, "└─ {} field(s)", self.len())
    }
}

/// All records collected during one run, in scrape order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<SubjectRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SubjectRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubjectRecord> {
        self.records.iter()
    }

    /// Union of every record's keys: `Name` first, the rest sorted ascending.
    pub fn columns(&self) -> Vec<String> {
        let rest: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|r| r.keys())
            .filter(|k| *k != NAME_KEY)
            .collect();

        std::iter::once(NAME_KEY.to_string())
            .chain(rest.into_iter().map(str::to_string))
            .collect()
    }

    /// One row per record aligned to [`ResultSet::columns`]; missing fields are blank.
    pub fn rows(&self, columns: &[String]) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).unwrap_or_default().to_string())
                    .collect()
            })
            .collect()
    }
}

impl FromIterator<SubjectRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = SubjectRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_always_has_name() {
        let record = SubjectRecord::new("N/A");
        assert_eq!(record.name(), "N/A");
        assert_eq!(record.len(), 1);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = SubjectRecord::new("Samuel Giger");
        record.insert("Wohnort", "Ottoberg");
        record.insert("Grösse (cm)", "193");
        record.insert("Wohnort", "Weinfelden");

        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, vec!["Name", "Wohnort", "Grösse (cm)"]);
        assert_eq!(record.get("Wohnort"), Some("Weinfelden"));
        assert_eq!(record.get("Hobbys"), None);
    }

    #[test]
    fn test_columns_name_first_then_sorted_union() {
        let mut a = SubjectRecord::new("A");
        a.insert("Wohnort", "Bern");
        a.insert("Beruf", "Landwirt");
        let mut b = SubjectRecord::new("B");
        b.insert("Alter", "25");
        b.insert("Wohnort", "Thun");

        let set: ResultSet = vec![a, b].into_iter().collect();
        assert_eq!(set.columns(), vec!["Name", "Alter", "Beruf", "Wohnort"]);
    }

    #[test]
    fn test_rows_leave_missing_fields_blank() {
        let mut a = SubjectRecord::new("A");
        a.insert("Wohnort", "Bern");
        let b = SubjectRecord::new("B");

        let set: ResultSet = vec![a, b].into_iter().collect();
        let columns = set.columns();
        let rows = set.rows(&columns);
        assert_eq!(rows[0], vec!["A", "Bern"]);
        assert_eq!(rows[1], vec!["B", ""]);
    }

    #[test]
    fn test_record_serializes_as_ordered_object() {
        let mut record = SubjectRecord::new("Joel Wicki");
        record.insert("Wohnort", "Sörenberg");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Name":"Joel Wicki","Wohnort":"Sörenberg"}"#);
    }

    #[test]
    fn test_record_display_lists_fields_under_name() {
        let mut record = SubjectRecord::new("Joel Wicki");
        record.insert("Wohnort", "Sörenberg");
        record.insert("Grösse (cm)", "183");

        assert_eq!(
            record.to_string(),
            "┌─ Joel Wicki\n│  Wohnort: Sörenberg\n│  Grösse (cm): 183\n└─ 3 field(s)"
        );
    }

    #[test]
    fn test_result_set_serializes_as_array() {
        let set: ResultSet = vec![SubjectRecord::new("A"), SubjectRecord::new("B")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"[{"Name":"A"},{"Name":"B"}]"#);
    }
}
