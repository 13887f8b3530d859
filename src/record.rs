use serde::ser::{Serialize, SerializeMap, Serializer};

pub const FLIXABLE_URL: &str = "flixable_url";
pub const TITLE: &str = "Title";
pub const YEAR: &str = "Year";
pub const MPAA_RATING: &str = "mpaa_rating";
pub const ADDED_TO_NETFLIX: &str = "added_to_netflix";

/// One output row: field name -> value, in insertion order.
///
/// Re-inserting an existing field replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichedRecord {
    fields: Vec<(String, String)>,
}

impl EnrichedRecord {
    /// A degraded record: only the detail URL.
    pub fn url_only(url: &str) -> Self {
        let mut record = Self::default();
        record.insert(FLIXABLE_URL, url);
        record
    }

    pub fn from_fields(fields: Vec<(String, String)>) -> Self {
        let mut record = Self::default();
        for (key, value) in fields {
            record.insert(key, value);
        }
        record
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
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

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn url(&self) -> Option<&str> {
        self.get(FLIXABLE_URL)
    }

    pub fn is_degraded(&self) -> bool {
        self.len() == 1 && self.url().is_some()
    }
}

impl Serialize for EnrichedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut r = EnrichedRecord::from_fields(vec![
            ("Title".into(), "X".into()),
            ("Genre".into(), "Drama".into()),
        ]);
        r.insert(TITLE, "Y");
        r.insert(FLIXABLE_URL, "https://flixable.com/title/y/");
        assert_eq!(r.keys().collect::<Vec<_>>(), vec!["Title", "Genre", "flixable_url"]);
        assert_eq!(r.get(TITLE), Some("Y"));
    }

    #[test]
    fn url_only_is_degraded() {
        let r = EnrichedRecord::url_only("https://flixable.com/title/x/");
        assert!(r.is_degraded());
        assert_eq!(r.url(), Some("https://flixable.com/title/x/"));
    }

    #[test]
    fn serializes_as_ordered_json_object() {
        let mut r = EnrichedRecord::default();
        r.insert("b", "2");
        r.insert("a", "1");
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"b":"2","a":"1"}"#);
    }
}
