//! Lenient deserializers for fields the API sends in more than one shape.

use serde::{de, Deserialize};

/// Deserialize a string or number as `Option<String>`.
/// HEMIS ids arrive as numbers, Mongo ids as strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumberVisitor;

    impl<'de> de::Visitor<'de> for StringOrNumberVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            if v.is_empty() {
                Ok(None)
            } else {
                Ok(Some(v.to_string()))
            }
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

/// Deserialize a count that may be missing, null, or a numeric string.
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct CountVisitor;

    impl<'de> de::Visitor<'de> for CountVisitor {
        type Value = Option<u32>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a non-negative number, numeric string or null")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            u32::try_from(v).map(Some).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u32::try_from(v).map(Some).map_err(E::custom)
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            if v.is_finite() && v >= 0.0 {
                Ok(Some(v as u32))
            } else {
                Ok(None)
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed.parse().map(Some).map_err(E::custom)
            }
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(CountVisitor)
}

/// Deserialize a counter where missing, null or unparseable text means zero.
pub(crate) fn count_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct CounterVisitor;

    impl<'de> de::Visitor<'de> for CounterVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number, numeric string or null")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(u32::try_from(v).unwrap_or(0))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(u32::try_from(v).unwrap_or(0))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(if v.is_finite() && v >= 0.0 { v as u32 } else { 0 })
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.trim().parse().unwrap_or(0))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(0)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(CounterVisitor)
}

/// Deserialize a flag that may be null, a number or a `"true"`/`"false"` string.
/// Anything that is not recognisably true is false.
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct BoolVisitor;

    impl<'de> de::Visitor<'de> for BoolVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a boolean, number, string or null")
        }

        fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v != 0)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v != 0)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(matches!(v.trim(), "true" | "1"))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(false)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(BoolVisitor)
}

/// Deserialize a number that may arrive as numeric text or null. Zero otherwise.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct F64Visitor;

    impl<'de> de::Visitor<'de> for F64Visitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number, numeric string or null")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(if v.is_finite() { v } else { 0.0 })
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(0.0)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(F64Visitor)
}

/// Deserialize `null` as the type's default instead of failing.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A record the API either populates or leaves as a bare id.
pub(crate) trait FromId {
    fn from_id(id: String) -> Self;
}

/// Deserialize a reference that arrives populated (an object) or unpopulated
/// (just its id).
pub(crate) fn ref_or_id<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + FromId,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RefOrId<R> {
        Id(String),
        Populated(R),
    }

    Ok(match Option::<RefOrId<T>>::deserialize(deserializer)? {
        Some(RefOrId::Id(id)) if id.is_empty() => None,
        Some(RefOrId::Id(id)) => Some(T::from_id(id)),
        Some(RefOrId::Populated(value)) => Some(value),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::FromId;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "super::string_or_number")]
        id: Option<String>,
        #[serde(default, deserialize_with = "super::lenient_count")]
        count: Option<u32>,
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Owner {
        #[serde(rename = "_id", default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    }

    impl FromId for Owner {
        fn from_id(id: String) -> Self {
            Owner { id: Some(id), name: None }
        }
    }

    #[derive(Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "super::lenient_bool")]
        flag: bool,
        #[serde(default, deserialize_with = "super::lenient_f64")]
        ratio: f64,
        #[serde(default, deserialize_with = "super::count_or_zero")]
        total: u32,
        #[serde(default, deserialize_with = "super::ref_or_id")]
        owner: Option<Owner>,
        #[serde(default, deserialize_with = "super::null_as_default")]
        tags: Vec<String>,
    }

    #[test]
    fn test_string_or_number() {
        let p: Sample = serde_json::from_str(r#"{"id": 42}"#).expect("number id");
        assert_eq!(p.id.as_deref(), Some("42"));
        let p: Sample = serde_json::from_str(r#"{"id": "65a1f"}"#).expect("string id");
        assert_eq!(p.id.as_deref(), Some("65a1f"));
        let p: Sample = serde_json::from_str(r#"{"id": null}"#).expect("null id");
        assert_eq!(p.id, None);
    }

    #[test]
    fn test_lenient_count() {
        let p: Sample = serde_json::from_str(r#"{"count": "20"}"#).expect("string count");
        assert_eq!(p.count, Some(20));
        let p: Sample = serde_json::from_str(r#"{"count": null}"#).expect("null count");
        assert_eq!(p.count, None);
        let p: Sample = serde_json::from_str(r#"{}"#).expect("missing count");
        assert_eq!(p.count, None);
        assert!(serde_json::from_str::<Sample>(r#"{"count": -3}"#).is_err());
    }

    #[test]
    fn test_lenient_scalars() {
        let l: Loose = serde_json::from_str(r#"{"flag": null, "ratio": "87.5", "total": null}"#).expect("nulls");
        assert!(!l.flag);
        assert_eq!(l.ratio, 87.5);
        assert_eq!(l.total, 0);

        let l: Loose = serde_json::from_str(r#"{"flag": "true", "ratio": null, "total": "4"}"#).expect("strings");
        assert!(l.flag);
        assert_eq!(l.ratio, 0.0);
        assert_eq!(l.total, 4);

        let l: Loose = serde_json::from_str(r#"{"flag": 1, "ratio": "n/a", "total": "lots"}"#).expect("odd values");
        assert!(l.flag);
        assert_eq!(l.ratio, 0.0);
        assert_eq!(l.total, 0);
    }

    #[test]
    fn test_ref_or_id() {
        let l: Loose = serde_json::from_str(r#"{"owner": "65aa01"}"#).expect("bare id");
        assert_eq!(l.owner, Some(Owner::from_id("65aa01".to_string())));

        let l: Loose = serde_json::from_str(r#"{"owner": {"_id": "65aa01", "name": "Chess"}}"#).expect("populated");
        assert_eq!(l.owner.and_then(|o| o.name).as_deref(), Some("Chess"));

        let l: Loose = serde_json::from_str(r#"{"owner": null, "tags": null}"#).expect("nulls");
        assert_eq!(l.owner, None);
        assert!(l.tags.is_empty());
    }
}
