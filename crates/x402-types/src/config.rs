//! Configuration values that may come from the environment.
//!
//! Secrets such as a wallet key should not live in a config file. A
//! [`LiteralOrEnv`] field accepts either the literal value or a reference to
//! an environment variable:
//!
//! ```json
//! {
//!   "facilitator": "https://x402.org/facilitator/",   // Literal value
//!   "privateKey": "$EVM_PRIVATE_KEY",                 // Simple env var
//!   "maxValue": "${X402_MAX_VALUE}"                   // Braced env var
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;

/// A value resolved from an environment variable during deserialization
/// when written as `$VAR` or `${VAR}`, parsed as `T` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if `s` is `$VAR` or `${VAR}`.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            return (!braced.is_empty()).then_some(braced);
        }
        let bare = s.strip_prefix('$')?;
        let valid = !bare.is_empty() && bare.chars().all(|c| c.is_alphanumeric() || c == '_');
        valid.then_some(bare)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = match Self::parse_env_var_syntax(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?,
            None => s,
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_syntax() {
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$KEY"), Some("KEY"));
        assert_eq!(
            LiteralOrEnv::<String>::parse_env_var_syntax("${SOME_KEY}"),
            Some("SOME_KEY")
        );
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$"), None);
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("${}"), None);
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$a-b"), None);
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("literal"), None);
    }

    #[test]
    fn test_literal_is_parsed() {
        let value: LiteralOrEnv<u64> = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(*value, 42);
    }

    #[test]
    fn test_missing_env_var_fails() {
        let result: Result<LiteralOrEnv<String>, _> =
            serde_json::from_str("\"$X402_TYPES_TEST_SURELY_UNSET_VARIABLE\"");
        assert!(result.is_err());
    }
}
