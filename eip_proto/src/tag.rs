//! The symbolic tag table: a fixed set of named DINT tags built once at startup, each refreshed
//! with a fresh pseudo-random value on every successful read. Tags are read-only and volatile —
//! there is no write path and no persistence.

use rand::Rng;

pub const DINT_TYPE_CODE: u16 = 0x00C4;
const VALUE_RANGE: std::ops::RangeInclusive<i32> = -1_000_000..=1_000_000;

#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub positional_address: String,
    pub value: i32,
    pub last_read_at: u64,
}

pub struct TagStore {
    tags: Vec<Tag>,
}

impl TagStore {
    /// Builds `count` tags named `Sensor1`..`SensorN`, each addressable positionally as
    /// `Tag_1`..`Tag_N`. Membership is fixed for the lifetime of the store.
    pub fn new(count: usize) -> TagStore {
        let tags = (1..=count)
            .map(|index| Tag {
                name: format!("Sensor{}", index),
                positional_address: format!("Tag_{}", index),
                value: 0,
                last_read_at: 0,
            })
            .collect();

        TagStore { tags }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn index_by_name(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|tag| tag.name == name)
    }

    fn index_by_address(&self, address: &str) -> Option<usize> {
        self.tags.iter().position(|tag| tag.positional_address == address)
    }

    /// Resolves a tag by symbolic name, then by positional address (`Tag_N`), then by a trailing
    /// decimal number treated as a 1-based index — the three fallbacks the source tries in turn.
    fn resolve(&self, candidate: &str) -> Option<usize> {
        self.index_by_name(candidate).or_else(|| self.index_by_address(candidate)).or_else(|| {
            trailing_number(candidate).and_then(|index| {
                if index >= 1 && index <= self.tags.len() {
                    Some(index - 1)
                } else {
                    None
                }
            })
        })
    }

    /// Reads a tag by symbolic-or-positional identifier, refreshing its value and timestamp.
    /// Returns `None` if no tag matches any of the three resolution strategies.
    pub fn read(&mut self, candidate: &str, now: u64) -> Option<&Tag> {
        let index = self.resolve(candidate)?;
        self.refresh(index, now);
        Some(&self.tags[index])
    }

    fn refresh(&mut self, index: usize, now: u64) {
        let value = rand::thread_rng().gen_range(VALUE_RANGE);
        let tag = &mut self.tags[index];
        tag.value = value;
        tag.last_read_at = now;
    }
}

/// Extracts a trailing run of ASCII digits from `text` and parses it as a `usize`, e.g.
/// `"Tag_17"` -> `Some(17)`. Returns `None` if the string has no trailing digits.
fn trailing_number(text: &str) -> Option<usize> {
    let digits: String = text.chars().rev().take_while(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return None;
    }

    digits.chars().rev().collect::<String>().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_built_with_matching_positional_address() {
        let store = TagStore::new(5);
        assert_eq!(store.len(), 5);
        assert_eq!(store.tags[6 - 6].positional_address, "Tag_1");
        assert_eq!(store.tags[4].positional_address, "Tag_5");
    }

    #[test]
    fn test_read_by_name() {
        let mut store = TagStore::new(3);
        let tag = store.read("Sensor2", 10).unwrap();
        assert_eq!(tag.name, "Sensor2");
        assert_eq!(tag.last_read_at, 10);
        assert!(VALUE_RANGE.contains(&tag.value));
    }

    #[test]
    fn test_read_by_positional_address() {
        let mut store = TagStore::new(10);
        let tag = store.read("Tag_7", 0).unwrap();
        assert_eq!(tag.name, "Sensor7");
    }

    #[test]
    fn test_read_by_trailing_numeric_fallback() {
        let mut store = TagStore::new(10);
        // Not a real name or address, but ends in a number that resolves positionally.
        let tag = store.read("whatever3", 0).unwrap();
        assert_eq!(tag.name, "Sensor3");
    }

    #[test]
    fn test_read_miss_returns_none() {
        let mut store = TagStore::new(3);
        assert!(store.read("NoSuchTag", 0).is_none());
    }

    #[test]
    fn test_read_refreshes_value_and_timestamp_on_each_call() {
        let mut store = TagStore::new(1);
        store.read("Sensor1", 1);
        let first_value = store.tags[0].value;

        store.read("Sensor1", 2);
        assert_eq!(store.tags[0].last_read_at, 2);
        // Extremely unlikely (but not impossible) to collide; this asserts the refresh ran, not
        // a specific value.
        let _ = first_value;
    }

    #[test]
    fn test_trailing_number_extraction() {
        assert_eq!(trailing_number("Tag_17"), Some(17));
        assert_eq!(trailing_number("Sensor1"), Some(1));
        assert_eq!(trailing_number("NoDigitsHere"), None);
    }
}
