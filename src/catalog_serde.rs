// catalog_serde.rs
// Custom serialization for HashMap<DocumentId, u64> to preserve DocumentId types in JSON

use std::collections::HashMap;
use serde::{Serializer, Deserializer};
use serde::ser::SerializeSeq;
use serde::de::{SeqAccess, Visitor};
use crate::document::DocumentId;

/// Serialize HashMap<DocumentId, u64> as an array of [value, offset] pairs.
pub fn serialize<S>(catalog: &HashMap<DocumentId, u64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(catalog.len()))?;
    for (doc_id, offset) in catalog {
        seq.serialize_element(&(doc_id.value(), *offset))?;
    }
    seq.end()
}

/// Deserialize an array of [value, offset] pairs back to HashMap<DocumentId, u64>.
pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<DocumentId, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CatalogVisitor;

    impl<'de> Visitor<'de> for CatalogVisitor {
        type Value = HashMap<DocumentId, u64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an array of [id, offset] pairs")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut catalog = HashMap::new();

            while let Some((id, offset)) = seq.next_element::<(i64, u64)>()? {
                catalog.insert(DocumentId(id), offset);
            }

            Ok(catalog)
        }
    }

    deserializer.deserialize_seq(CatalogVisitor)
}
