//! Record-shape check for handler request and response types.
//!
//! Every operation must take one record and return one record. Arity is
//! fixed by the handler's type signature; the "record" part is checked here
//! by driving a type's `Deserialize` impl against [`ShapeInspector`], a
//! deserializer that only observes which entry point was called. Derived
//! structs call `deserialize_struct`, everything else (primitives, strings,
//! sequences, maps, options, enums, tuples, newtypes) calls something else.
//!
//! Structs using `#[serde(flatten)]` deserialize through a map and are
//! therefore rejected.

use std::any::type_name;
use std::fmt;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::forward_to_deserialize_any;

/// Outcome of an inspection, carried through serde's error channel.
#[derive(Debug)]
enum Verdict {
    Record,
    NotRecord(&'static str),
    Custom(String),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Record => f.write_str("a record"),
            Verdict::NotRecord(kind) => f.write_str(kind),
            Verdict::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Verdict {}

impl de::Error for Verdict {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Verdict::Custom(msg.to_string())
    }
}

struct ShapeInspector;

macro_rules! reject {
    ($($method:ident => $kind:literal),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Verdict> {
                Err(Verdict::NotRecord($kind))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for ShapeInspector {
    type Error = Verdict;

    reject! {
        deserialize_any => "a primitive",
        deserialize_str => "a string",
        deserialize_string => "a string",
        deserialize_bytes => "a byte string",
        deserialize_byte_buf => "a byte string",
        deserialize_option => "an option",
        deserialize_unit => "the unit type",
        deserialize_seq => "a sequence",
        deserialize_map => "a map",
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char
        identifier ignored_any
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Verdict> {
        Err(Verdict::Record)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Verdict> {
        Err(Verdict::Record)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Verdict> {
        Err(Verdict::NotRecord("a newtype struct"))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value, Verdict> {
        Err(Verdict::NotRecord("a tuple"))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Verdict> {
        Err(Verdict::NotRecord("a tuple struct"))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Verdict> {
        Err(Verdict::NotRecord("an enum"))
    }
}

/// Check that `T` deserializes as a record (a struct with named fields or a
/// unit struct).
///
/// Returns a human readable reason on rejection.
pub(crate) fn check_record<T: DeserializeOwned>() -> Result<(), String> {
    match T::deserialize(ShapeInspector) {
        Err(Verdict::Record) => Ok(()),
        Err(Verdict::NotRecord(kind)) => Err(format!("{} is {}, not a record", type_name::<T>(), kind)),
        Err(Verdict::Custom(msg)) => Err(format!("{}: {}", type_name::<T>(), msg)),
        Ok(_) => Err(format!("{} accepted an empty input", type_name::<T>())),
    }
}
