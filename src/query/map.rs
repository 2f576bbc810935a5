//! Map query engine and nested-map assembly.
//!
//! A storage map read yields (composite key, value) pairs. Composite
//! keys become one nesting level per tuple element; keys that parse as
//! integers are normalized to integers, and every level is ordered
//! ascending (integers first, numerically). The result is deterministic
//! regardless of the ledger's native key encoding.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::query::single::QueryEngine;
use crate::query::QueryArgs;
use crate::store::StoreError;

/// One level of a map key: integer-normalized when the key text parses
/// as an integer. Orders integers before strings, each ascending.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Int(i64),
    Str(String),
}

impl MapKey {
    /// Normalize one raw key element.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => MapKey::Int(i),
                None => MapKey::Str(n.to_string()),
            },
            Value::String(s) => Self::from_text(s),
            other => MapKey::Str(other.to_string()),
        }
    }

    fn from_text(text: &str) -> Self {
        match text.parse::<i64>() {
            Ok(i) => MapKey::Int(i),
            Err(_) => MapKey::Str(text.to_string()),
        }
    }

    /// The key as text, as it appears in serialized form.
    pub fn as_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(i) => write!(f, "{i}"),
            MapKey::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for MapKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = MapKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map key string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<MapKey, E> {
                Ok(MapKey::from_text(v))
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}

/// A node of an assembled map query result: either a further nesting
/// level or a terminal value.
///
/// The serialized form tags each node, since an object-valued terminal
/// is otherwise indistinguishable from a nesting level and a cache read
/// would rebuild a different structure than the cold fetch produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MapNode {
    Map(BTreeMap<MapKey, MapNode>),
    Leaf(Value),
}

impl MapNode {
    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, MapNode>> {
        match self {
            MapNode::Map(m) => Some(m),
            MapNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            MapNode::Leaf(v) => Some(v),
            MapNode::Map(_) => None,
        }
    }
}

/// Assemble raw (composite key, value) pairs into nested maps, one
/// level per tuple element.
pub fn assemble(pairs: Vec<(Vec<Value>, Value)>) -> BTreeMap<MapKey, MapNode> {
    let mut root = BTreeMap::new();
    for (key_tuple, value) in pairs {
        let keys: Vec<MapKey> = key_tuple.iter().map(MapKey::from_value).collect();
        if keys.is_empty() {
            continue;
        }
        insert_nested(&mut root, &keys, value);
    }
    root
}

fn insert_nested(map: &mut BTreeMap<MapKey, MapNode>, keys: &[MapKey], value: Value) {
    let (first, rest) = match keys.split_first() {
        Some(split) => split,
        None => return,
    };
    if rest.is_empty() {
        map.insert(first.clone(), MapNode::Leaf(value));
        return;
    }
    let entry = map
        .entry(first.clone())
        .or_insert_with(|| MapNode::Map(BTreeMap::new()));
    if let MapNode::Leaf(_) = entry {
        // A shorter tuple landed here earlier; the deeper write wins
        *entry = MapNode::Map(BTreeMap::new());
    }
    if let MapNode::Map(inner) = entry {
        insert_nested(inner, rest, value);
    }
}

impl QueryEngine {
    /// Read a storage map, assembled into nested, key-normalized maps.
    ///
    /// Same cache and retry discipline as [`QueryEngine::query`]; the
    /// cached form tags every nesting level, so a warm hit rebuilds
    /// exactly the structure the cold fetch assembled.
    pub async fn query_map(&self, args: &QueryArgs) -> Result<BTreeMap<MapKey, MapNode>> {
        let plan = self.plan(args);

        if let Some(hit) = self.cache.get(&plan.path, args.max_age, args.update)? {
            return serde_json::from_value(hit)
                .map_err(|e| ClientError::Store(StoreError::Serde(e)));
        }

        let pairs = {
            let this = self.clone();
            let plan = plan.clone();
            self.retry
                .with_attempts(plan.trials)
                .run("query_map", move || {
                    let this = this.clone();
                    let plan = plan.clone();
                    async move { this.attempt_map(&plan).await }
                })
                .await?
        };

        tracing::debug!(
            storage = %plan.what(),
            network = %plan.network,
            pairs = pairs.len(),
            "assembling map query result"
        );
        let root = assemble(pairs);

        let cached = serde_json::to_value(&root).map_err(StoreError::from)?;
        self.cache.put(&plan.path, &cached)?;
        Ok(root)
    }

    async fn attempt_map(
        &self,
        plan: &crate::query::single::QueryPlan,
    ) -> Result<Vec<(Vec<Value>, Value)>> {
        let conn = self.acquire(plan).await?;
        let block_hash = self.pin_block(&*conn, plan).await?;
        conn.query_storage_map(&plan.module, &plan.name, &plan.params, block_hash.as_deref())
            .await
            .map_err(|source| ClientError::Query {
                what: plan.what(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_normalization() {
        assert_eq!(MapKey::from_value(&json!(3)), MapKey::Int(3));
        assert_eq!(MapKey::from_value(&json!("17")), MapKey::Int(17));
        assert_eq!(MapKey::from_value(&json!("-4")), MapKey::Int(-4));
        assert_eq!(
            MapKey::from_value(&json!("5Gabc")),
            MapKey::Str("5Gabc".into())
        );
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            MapKey::Str("b".into()),
            MapKey::Int(10),
            MapKey::Int(2),
            MapKey::Str("a".into()),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                MapKey::Int(2),
                MapKey::Int(10),
                MapKey::Str("a".into()),
                MapKey::Str("b".into()),
            ]
        );
    }

    #[test]
    fn test_assembly_of_composite_keys() {
        let pairs = vec![
            (vec![json!(1), json!("a")], json!(10)),
            (vec![json!(1), json!("b")], json!(20)),
            (vec![json!(2), json!("a")], json!(30)),
        ];
        let root = assemble(pairs);

        let top: Vec<&MapKey> = root.keys().collect();
        assert_eq!(top, vec![&MapKey::Int(1), &MapKey::Int(2)]);

        let one = root.get(&MapKey::Int(1)).unwrap().as_map().unwrap();
        assert_eq!(
            one.get(&MapKey::Str("a".into())).unwrap().as_leaf(),
            Some(&json!(10))
        );
        assert_eq!(
            one.get(&MapKey::Str("b".into())).unwrap().as_leaf(),
            Some(&json!(20))
        );

        let two = root.get(&MapKey::Int(2)).unwrap().as_map().unwrap();
        assert_eq!(two.len(), 1);
        assert_eq!(
            two.get(&MapKey::Str("a".into())).unwrap().as_leaf(),
            Some(&json!(30))
        );
    }

    #[test]
    fn test_single_level_keys() {
        let pairs = vec![
            (vec![json!("10")], json!("x")),
            (vec![json!("2")], json!("y")),
        ];
        let root = assemble(pairs);
        // Numeric ordering, not lexicographic
        let keys: Vec<&MapKey> = root.keys().collect();
        assert_eq!(keys, vec![&MapKey::Int(2), &MapKey::Int(10)]);
    }

    #[test]
    fn test_json_roundtrip_preserves_structure() {
        let pairs = vec![
            (vec![json!(1), json!("a")], json!(10)),
            (vec![json!(2), json!("a")], json!(30)),
        ];
        let root = assemble(pairs);
        let as_json = serde_json::to_value(&root).unwrap();
        let back: BTreeMap<MapKey, MapNode> = serde_json::from_value(as_json).unwrap();
        assert_eq!(back, root);
    }

    #[test]
    fn test_object_valued_leaf_round_trips_as_leaf() {
        let account = json!({"free": 42, "reserved": 7});
        let root = assemble(vec![(vec![json!(0)], account.clone())]);
        let as_json = serde_json::to_value(&root).unwrap();

        let back: BTreeMap<MapKey, MapNode> = serde_json::from_value(as_json).unwrap();
        assert_eq!(back, root);
        assert_eq!(back.get(&MapKey::Int(0)).unwrap().as_leaf(), Some(&account));
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let pairs = vec![
            (vec![json!(1)], json!("old")),
            (vec![json!(1)], json!("new")),
        ];
        let root = assemble(pairs);
        assert_eq!(
            root.get(&MapKey::Int(1)).unwrap().as_leaf(),
            Some(&json!("new"))
        );
    }
}
