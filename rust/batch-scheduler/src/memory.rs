//! Parsing of the Java style memory strings Spark accepts for `spark.{driver,executor}.memory`
//! and the matching overhead settings, e.g. `512m`, `2g` or `1.5gb`.
//!
//! Unlike Kubernetes quantities, all suffixes are binary multiples and case does not matter.

use std::sync::LazyLock;

use regex::Regex;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::quantity::{self, Quantity};

static JAVA_MEMORY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([a-z]+)?$").expect("memory pattern is a valid regex"));
static JAVA_FRACTION_MEMORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+\.[0-9]+)([a-z]+)?$").expect("fraction memory pattern is a valid regex")
});

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display(
        "could not parse string '{value}' as a Java-style memory value. Examples: 100kb, 1.5mb, 1g"
    ))]
    InvalidJavaMemoryString { value: String },

    #[snafu(display("failed to convert Java-style memory value '{value}' to a quantity"))]
    ConvertToQuantity {
        source: quantity::Error,
        value: String,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Maps a (lower case) Java memory suffix to the matching Kubernetes binary suffix.
fn binary_suffix(java_suffix: &str) -> Option<&'static str> {
    match java_suffix {
        "" | "b" => Some(""),
        "k" | "kb" => Some("Ki"),
        "m" | "mb" => Some("Mi"),
        "g" | "gb" => Some("Gi"),
        "t" | "tb" => Some("Ti"),
        "p" | "pb" => Some("Pi"),
        _ => None,
    }
}

pub fn parse_java_memory_string(value: &str) -> Result<Quantity> {
    let lower = value.to_lowercase();
    let captures = JAVA_MEMORY_PATTERN
        .captures(&lower)
        .or_else(|| JAVA_FRACTION_MEMORY_PATTERN.captures(&lower))
        .context(InvalidJavaMemoryStringSnafu { value })?;

    let number = &captures[1];
    let suffix = binary_suffix(captures.get(2).map_or("", |m| m.as_str()))
        .context(InvalidJavaMemoryStringSnafu { value })?;

    format!("{number}{suffix}")
        .parse()
        .context(ConvertToQuantitySnafu { value })
}
