use crate::core::attribute::{AttributeValue, Item};
use serde::{Deserialize, Serialize};

/// Opaque continuation marker returned by a paginated scan.
///
/// Wraps the store's last evaluated key; the next page starts strictly after
/// it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Cursor(Item);

impl Cursor {
    pub fn new(last_key: Item) -> Self {
        Cursor(last_key)
    }

    /// A scan response with an empty last key means the scan is exhausted.
    pub fn from_last_key(last_key: Option<Item>) -> Option<Self> {
        last_key.filter(|key| !key.is_empty()).map(Cursor)
    }

    pub fn key(&self) -> &Item {
        &self.0
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.0.get(attribute)
    }

    pub fn into_key(self) -> Item {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_last_key_ends_the_scan() {
        assert!(Cursor::from_last_key(None).is_none());
        assert!(Cursor::from_last_key(Some(Item::new())).is_none());

        let mut key = Item::new();
        key.insert("id".into(), AttributeValue::s("7"));
        let cursor = Cursor::from_last_key(Some(key)).unwrap();
        assert_eq!(cursor.get("id"), Some(&AttributeValue::s("7")));
    }
}
