//! [`serde_with`] helpers.

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

/// JSON-RPC quantity: `0x`-prefixed hex with no leading zeros (`"0x0"`, `"0x1a"`).
pub struct HexQuantity;

macro_rules! hex_quantity_impl {
    ($($t:ty)+) => {
        $(
            impl SerializeAs<$t> for HexQuantity {
                fn serialize_as<S>(source: &$t, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    serializer.collect_str(&format_args!("{:#x}", source))
                }
            }
            impl<'de> DeserializeAs<'de, $t> for HexQuantity {
                fn deserialize_as<D>(deserializer: D) -> Result<$t, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                    let digits = s
                        .strip_prefix("0x")
                        .ok_or_else(|| D::Error::custom(format!("quantity `{}` missing `0x`", s)))?;
                    if digits.is_empty() {
                        return Err(D::Error::custom("empty quantity"));
                    }
                    <$t>::from_str_radix(digits, 16).map_err(D::Error::custom)
                }
            }
        )+
    };
}
hex_quantity_impl!(u64 u128);

/// Byte string as `0x`-prefixed hex (`"0x"` for empty).
pub struct HexBytes;
impl SerializeAs<Vec<u8>> for HexBytes {
    fn serialize_as<S>(source: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&format_args!("0x{}", hex::encode(source)))
    }
}
impl<'de> DeserializeAs<'de, Vec<u8>> for HexBytes {
    fn deserialize_as<D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| D::Error::custom(format!("data `{}` missing `0x`", s)))?;
        hex::decode(digits).map_err(D::Error::custom)
    }
}
