//! Snapshots - flat, cycle-free text form of a live state graph.
//!
//! A snapshot has two parts:
//! - `state`: the state tree with every record replaced by a
//!   `{"_constructor": <type>, "_id": <id>}` [`Token`]
//! - `models`: the [`Pool`], holding each record's serialized fields exactly once
//!
//! ```text
//! {
//!   "state":  { "users": { "u1": {"_constructor": "User", "_id": "u1"} } },
//!   "models": { "User": { "u1": { "id": "u1", "friend": {"_constructor": "User", "_id": "u2"} },
//!                         "u2": { ... } } }
//! }
//! ```
//!
//! [`GraphSerializer`] produces snapshots from live values, [`GraphDeserializer`]
//! rebuilds live values with the original sharing topology.

mod deserializer;
mod serializer;

pub use deserializer::GraphDeserializer;
pub use serializer::GraphSerializer;

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use crate::error::{StoreError, StoreResult};
use crate::record::RecordKey;

const CONSTRUCTOR_KEY: &str = "_constructor";
const ID_KEY: &str = "_id";

/// Serialized fields of one record or one plain mapping.
pub type SerialFields = BTreeMap<String, SerialValue>;

/// `type -> id -> serialized fields`.
pub type Pool = BTreeMap<String, BTreeMap<String, SerialFields>>;

/// Stand-in for a record inside a serialized tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    #[serde(rename = "_constructor")]
    pub type_tag: String,
    #[serde(rename = "_id")]
    pub id: String,
}

impl Token {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.type_tag, &self.id)
    }

    fn from_object(object: &Map<String, serde_json::Value>) -> Result<Self, String> {
        let type_tag = match object.get(CONSTRUCTOR_KEY) {
            Some(serde_json::Value::String(tag)) => tag.clone(),
            other => return Err(format!("token has non-string _constructor: {:?}", other)),
        };
        let id = match object.get(ID_KEY) {
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(serde_json::Value::Number(id)) => id.to_string(),
            other => {
                return Err(format!(
                    "token for {} has unusable _id: {:?}",
                    type_tag, other
                ))
            }
        };
        Ok(Token { type_tag, id })
    }
}

impl From<&RecordKey> for Token {
    fn from(key: &RecordKey) -> Self {
        Token {
            type_tag: key.type_tag.clone(),
            id: key.id.clone(),
        }
    }
}

/// A node of a serialized tree. Unlike a live value it is always acyclic.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SerialValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<SerialValue>),
    Token(Token),
    Map(SerialFields),
}

impl SerialValue {
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            SerialValue::Token(token) => Some(token),
            _ => None,
        }
    }
}

/// An object is a reference token only when it names a constructor.
fn is_token_object(object: &serde_json::Map<String, serde_json::Value>) -> bool {
    matches!(object.get(CONSTRUCTOR_KEY), Some(serde_json::Value::String(tag)) if !tag.is_empty())
}

impl TryFrom<serde_json::Value> for SerialValue {
    type Error = String;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match json {
            serde_json::Value::Null => SerialValue::Null,
            serde_json::Value::Bool(b) => SerialValue::Bool(b),
            serde_json::Value::Number(n) => SerialValue::Number(n),
            serde_json::Value::String(s) => SerialValue::Text(s),
            serde_json::Value::Array(items) => SerialValue::List(
                items
                    .into_iter()
                    .map(SerialValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(object) if is_token_object(&object) => {
                SerialValue::Token(Token::from_object(&object)?)
            }
            serde_json::Value::Object(object) => SerialValue::Map(
                object
                    .into_iter()
                    .map(|(key, value)| SerialValue::try_from(value).map(|value| (key, value)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl<'de> Deserialize<'de> for SerialValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        SerialValue::try_from(json).map_err(de::Error::custom)
    }
}

/// The complete serialized form of a store's state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: SerialFields,
    pub models: Pool,
}

impl Snapshot {
    /// Parse snapshot text. Fails before any graph walking if the shape is wrong.
    pub fn from_json(text: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Pooled fields for one record.
    pub fn pooled(&self, type_tag: &str, id: &str) -> Option<&SerialFields> {
        self.models.get(type_tag).and_then(|records| records.get(id))
    }

    /// Number of records held in the pool.
    pub fn pooled_count(&self) -> usize {
        self.models.values().map(BTreeMap::len).sum()
    }

    /// Check that every token in `state` and in the pool resolves to a pool entry.
    pub fn validate(&self) -> StoreResult<()> {
        self.state
            .values()
            .chain(self.models.values().flat_map(|records| {
                records.values().flat_map(|fields| fields.values())
            }))
            .try_for_each(|value| self.check_tokens(value))
    }

    fn check_tokens(&self, value: &SerialValue) -> StoreResult<()> {
        match value {
            SerialValue::Token(token) => match self.pooled(&token.type_tag, &token.id) {
                Some(_) => Ok(()),
                None => Err(StoreError::unresolved(&token.type_tag, &token.id)),
            },
            SerialValue::List(items) => items.iter().try_for_each(|v| self.check_tokens(v)),
            SerialValue::Map(fields) => fields.values().try_for_each(|v| self.check_tokens(v)),
            SerialValue::Null
            | SerialValue::Bool(_)
            | SerialValue::Number(_)
            | SerialValue::Text(_) => Ok(()),
        }
    }
}
