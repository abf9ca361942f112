//! Common types and utilities shared across models.

/// Declares a fieldless enum stored as a fixed lowercase string, with
/// `as_str`, `Display`, strict `FromStr` and serde using the same strings.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    _ => Err(format!("Unknown {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

pub(crate) use string_enum;

string_enum! {
    /// Formal address used on leads and user profiles
    Salutation {
        Herr => "herr",
        Frau => "frau",
    }
}

/// Helper to parse a JSON document column
pub fn parse_json<T: serde::de::DeserializeOwned>(json: Option<&str>) -> Option<T> {
    json.and_then(|s| match serde_json::from_str(s) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed JSON column");
            None
        }
    })
}

/// Helper to serialize a JSON document column
pub fn to_json<T: serde::Serialize>(value: Option<&T>) -> Option<String> {
    value.and_then(|v| serde_json::to_string(v).ok())
}
