//! Where decoded parameters end up.

use crate::objects::ObjectType;
use crate::parameters::Parameter;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// One decoded parameter along with the bytes it was decoded from.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ResultItem {
    pub category: String,
    pub parameter: Parameter,
    pub value: String,
    #[serde(serialize_with = "serialize_hex")]
    pub raw: Vec<u8>,
}

fn serialize_hex<S: serde::Serializer>(raw: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(raw))
}

impl ResultItem {
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Collects result items, or hands each of them to a callback as soon as it is produced.
#[derive(Default)]
pub struct ResultSink<'a> {
    items: Vec<ResultItem>,
    forward: Option<Box<dyn FnMut(ResultItem) + 'a>>,
}

impl<'a> ResultSink<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that keeps nothing and passes every item on to `callback`.
    pub fn forwarding(callback: impl FnMut(ResultItem) + 'a) -> Self {
        Self { items: Vec::new(), forward: Some(Box::new(callback)) }
    }

    pub fn push(&mut self, item: ResultItem) {
        match &mut self.forward {
            Some(forward) => forward(item),
            None => self.items.push(item),
        }
    }

    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ResultItem> {
        self.items
    }

    /// Collected items grouped by category, in the order the categories first appeared.
    pub fn by_category(&self) -> Vec<(&str, Vec<&ResultItem>)> {
        let mut groups: Vec<(&str, Vec<&ResultItem>)> = Vec::new();
        for item in &self.items {
            match groups.iter_mut().find(|(c, _)| *c == item.category) {
                Some((_, group)) => group.push(item),
                None => groups.push((item.category.as_str(), vec![item])),
            }
        }
        groups
    }
}

/// Labels result items with the category they are produced under.
///
/// Repeated object types get numbered categories: the second application program object ends
/// up in `Application Program 2`.
#[derive(Debug, Default)]
pub struct CategoryCursor {
    current: String,
    instances: BTreeMap<ObjectType, u16>,
    announced: BTreeSet<String>,
}

impl CategoryCursor {
    pub fn enter(&mut self, category: impl Into<String>) {
        self.current = category.into();
    }

    /// Enters the category of the next instance of `object_type`.
    pub fn enter_object(&mut self, object_type: ObjectType) {
        let instance = self.instances.entry(object_type).or_default();
        *instance += 1;
        self.current = match *instance {
            1 => object_type.to_string(),
            n => format!("{object_type} {n}"),
        };
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Notes that an item is about to be produced under the current category.
    ///
    /// Returns `true` the first time a category is used.
    pub fn announce(&mut self) -> bool {
        if self.announced.contains(&self.current) {
            return false;
        }
        info!(message = "reading category", category = %self.current);
        self.announced.insert(self.current.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::CommonParameter;

    fn item(category: &str, value: &str) -> ResultItem {
        ResultItem {
            category: category.to_string(),
            parameter: CommonParameter::LoadStateControl.into(),
            value: value.to_string(),
            raw: vec![0x01],
        }
    }

    #[test]
    fn numbers_repeated_object_types() {
        let mut cursor = CategoryCursor::default();
        cursor.enter_object(ObjectType::ApplicationProgram);
        assert_eq!(cursor.current(), "Application Program");
        cursor.enter_object(ObjectType::InterfaceProgram);
        assert_eq!(cursor.current(), "Interface Program");
        cursor.enter_object(ObjectType::ApplicationProgram);
        assert_eq!(cursor.current(), "Application Program 2");
        cursor.enter("General");
        assert_eq!(cursor.current(), "General");
    }

    #[test]
    fn announces_each_category_once() {
        let mut cursor = CategoryCursor::default();
        cursor.enter("General");
        assert!(cursor.announce());
        assert!(!cursor.announce());
        cursor.enter_object(ObjectType::Device);
        assert!(cursor.announce());
        cursor.enter("General");
        assert!(!cursor.announce());
    }

    #[test]
    fn groups_by_first_appearance() {
        let mut sink = ResultSink::new();
        sink.push(item("General", "a"));
        sink.push(item("Device", "b"));
        sink.push(item("General", "c"));
        let groups = sink.by_category();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "General");
        assert_eq!(groups[0].1.iter().map(|i| i.value.as_str()).collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(groups[1].0, "Device");
    }

    #[test]
    fn forwards_instead_of_collecting() {
        let mut seen = Vec::new();
        let mut sink = ResultSink::forwarding(|item: ResultItem| seen.push(item.value));
        sink.push(item("General", "a"));
        sink.push(item("General", "b"));
        assert!(sink.items().is_empty());
        drop(sink);
        assert_eq!(seen, ["a", "b"]);
    }

    #[test]
    fn serializes_raw_bytes_as_hex() {
        let json = serde_json::to_string(&item("General", "Loaded")).unwrap();
        assert_eq!(
            json,
            r#"{"category":"General","parameter":"Load State Control","value":"Loaded","raw":"01"}"#
        );
    }
}
