use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Reuse unchanged subtrees of an old tree when one is passed to the parser.
    pub incremental: bool,
    /// Error recovery steps allowed in a single parse before the parser gives up
    /// and wraps everything in an `ERROR` root.
    pub max_recoveries: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            incremental: true,
            max_recoveries: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ParserConfig = serde_json::from_str(r#"{ "incremental": false }"#).unwrap();

        assert_eq!(
            ParserConfig {
                incremental: false,
                max_recoveries: 256
            },
            config
        );
    }
}
