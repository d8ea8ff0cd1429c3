//! Decoding a resolved field map into a caller's record type.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::{Map, Value};

#[derive(Debug)]
pub(crate) enum LoadError {
    /// The target asked for something other than a struct or map.
    NotARecord,
    Decode(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotARecord => f.write_str("target is not a record"),
            LoadError::Decode(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for LoadError {}

impl de::Error for LoadError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        LoadError::Decode(msg.to_string())
    }
}

/// Hands a field map only to targets that deserialize as a struct or a map.
pub(crate) struct RecordDeserializer {
    map: Map<String, Value>,
}

impl RecordDeserializer {
    pub(crate) fn new(map: Map<String, Value>) -> Self {
        Self { map }
    }
}

impl<'de> Deserializer<'de> for RecordDeserializer {
    type Error = LoadError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, LoadError> {
        Err(LoadError::NotARecord)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, LoadError> {
        Value::Object(self.map)
            .deserialize_map(visitor)
            .map_err(|e| LoadError::Decode(e.to_string()))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, LoadError> {
        Value::Object(self.map)
            .deserialize_struct(name, fields, visitor)
            .map_err(|e| LoadError::Decode(e.to_string()))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    fn sample() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("host".into(), Value::from("localhost"));
        map.insert("port".into(), Value::from(8080));
        map
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Web {
        host: String,
        port: u16,
    }

    #[test]
    fn test_struct_target() {
        let web = Web::deserialize(RecordDeserializer::new(sample())).unwrap();
        assert_eq!(
            web,
            Web {
                host: "localhost".into(),
                port: 8080
            }
        );
    }

    #[test]
    fn test_map_target() {
        let map = HashMap::<String, Value>::deserialize(RecordDeserializer::new(sample())).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_scalar_and_sequence_targets_rejected() {
        assert!(matches!(
            i64::deserialize(RecordDeserializer::new(sample())),
            Err(LoadError::NotARecord)
        ));
        assert!(matches!(
            Vec::<String>::deserialize(RecordDeserializer::new(sample())),
            Err(LoadError::NotARecord)
        ));
    }

    #[test]
    fn test_shape_mismatch_is_decode_error() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrong {
            host: u32,
        }
        assert!(matches!(
            Wrong::deserialize(RecordDeserializer::new(sample())),
            Err(LoadError::Decode(_))
        ));
    }
}
