use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Trims a raw search box value and collapses internal whitespace runs.
/// Whitespace-only input normalises to the empty string.
pub fn normalize_query(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned()
}

// Helpers for the lenient parts of the wire format
pub(crate) mod wire {
    use serde::{Deserialize, Deserializer};

    use crate::models::Artist;

    /// Accepts integer or fractional milliseconds. Fractions are truncated,
    /// negative and non-finite values become 0.
    pub fn lenient_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Ok(millis_from_f64(value))
    }

    pub fn millis_from_f64(value: f64) -> u64 {
        if value.is_finite() && value > 0.0 {
            value as u64
        } else {
            0
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ArtistRepr {
        Name(String),
        Object { name: String },
    }

    /// Artists arrive either as bare names or as `{ "name": ... }` objects.
    pub fn artists<'de, D>(deserializer: D) -> Result<Vec<Artist>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<ArtistRepr>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|repr| match repr {
                ArtistRepr::Name(name) | ArtistRepr::Object { name } => Artist { name },
            })
            .collect())
    }
}
