//! (De)serializes a JSON object of `id -> entry` into a `Vec` that keeps document order.
//!
//! Flow documents rely on object key order: the first matching connection wins and
//! container sub-nodes run in the order they are written.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// An entry that is stored under its own key in the document.
pub trait Keyed {
    /// Called with the object key. Entries that already carry an id keep it.
    fn assign_key(&mut self, key: String);
    fn key(&self) -> &str;
}

pub fn serialize<S, T>(entries: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Keyed + Serialize,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for entry in entries {
        map.serialize_entry(entry.key(), entry)?;
    }
    map.end()
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Keyed + Deserialize<'de>,
{
    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

struct OrderedVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for OrderedVisitor<T>
where
    T: Keyed + Deserialize<'de>,
{
    type Value = Vec<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object keyed by id")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, mut entry)) = access.next_entry::<String, T>()? {
            entry.assign_key(key);
            entries.push(entry);
        }
        Ok(entries)
    }
}
