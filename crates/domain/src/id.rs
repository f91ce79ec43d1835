//! Identifiers.
//!
//! Device ids come from the surrounding console and are only ever parsed or
//! wrapped here. Alert ids are minted when an alert is first raised.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text that does not hold a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id {raw:?}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub raw: String,
}

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh random (v4) id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn from_uuid(raw: Uuid) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(raw: Uuid) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $kind,
                        raw: raw.to_string(),
                    })
            }
        }
    };
}

uuid_newtype!(
    /// A metered device (single or three phase power meter with a relay).
    DeviceId,
    "device"
);

uuid_newtype!(
    /// An [`Alert`](crate::alert::Alert).
    AlertId,
    "alert"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_mint_distinct_alert_ids() {
        assert_ne!(AlertId::new(), AlertId::new());
    }

    #[test]
    fn should_parse_device_id_from_console_text() {
        let raw = "6f1c1a5e-8c1b-4a9e-9d57-0b7f2a4c3e11";
        let id: DeviceId = format!("  {raw}\n").parse().unwrap();
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn should_name_the_id_kind_when_parsing_fails() {
        let err = "meter-42".parse::<DeviceId>().unwrap_err();
        assert_eq!(err.kind, "device");
        assert_eq!(err.to_string(), "invalid device id \"meter-42\"");
    }

    #[test]
    fn should_serialize_as_plain_uuid_string() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_value(AlertId::from(uuid)).unwrap();
        assert_eq!(json, serde_json::Value::String(uuid.to_string()));
        let back: AlertId = serde_json::from_value(json).unwrap();
        assert_eq!(back.as_uuid(), uuid);
    }
}
