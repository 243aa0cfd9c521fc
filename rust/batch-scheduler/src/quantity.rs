//! Exact resource quantities using the Kubernetes quantity notation.
//!
//! Values are stored as nano units in an [`i128`], which keeps additions exact for every
//! amount of CPU or memory a pod can realistically ask for. Anything more precise than a nano
//! unit is rounded up, the same way the Kubernetes API server does it.
//!
//! The canonical string representation follows the Kubernetes rules as well: binary quantities
//! are printed with the largest `Ki`..`Ei` suffix that keeps the number integral, decimal
//! quantities use the `n`..`E` suffixes in steps of three orders of magnitude.

use std::{
    cmp::Ordering,
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
    sync::LazyLock,
};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use regex::Regex;
use snafu::{OptionExt, Snafu};

const NANOS_PER_UNIT: i128 = 1_000_000_000;

const BINARY_SUFFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

static QUANTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<sign>[+-])?(?P<number>[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?P<suffix>[eE][+-]?[0-9]+|[KMGTPE]i|[numkMGTPE])?$",
    )
    .expect("quantity pattern is a valid regex")
});

#[derive(Snafu, Debug, PartialEq, Eq)]
pub enum Error {
    #[snafu(display("{value:?} is not a valid quantity"))]
    InvalidQuantity { value: String },

    #[snafu(display("quantity {value:?} is out of range"))]
    QuantityOverflow { value: String },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// The notation a quantity was written in. It only influences how the quantity is printed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    /// e.g. `12e6`
    DecimalExponent,
    /// e.g. `12Mi`
    BinarySI,
    /// e.g. `12M`
    #[default]
    DecimalSI,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Quantity {
    nanos: i128,
    format: Format,
}

impl Quantity {
    pub fn new(value: i64, format: Format) -> Self {
        Self {
            nanos: i128::from(value) * NANOS_PER_UNIT,
            format,
        }
    }

    pub fn new_milli(milli_value: i64, format: Format) -> Self {
        Self {
            nanos: i128::from(milli_value) * (NANOS_PER_UNIT / 1000),
            format,
        }
    }

    /// The value rounded up to the next integer, saturating at the bounds of an [`i64`].
    pub fn value(&self) -> i64 {
        let units = self.nanos / NANOS_PER_UNIT
            + i128::from(self.nanos % NANOS_PER_UNIT > 0);
        i64::try_from(units).unwrap_or(if units > 0 { i64::MAX } else { i64::MIN })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        // A zero value has no meaningful notation of its own
        if self.is_zero() {
            self.format = rhs.format;
        }
        self.nanos = self.nanos.saturating_add(rhs.nanos);
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Quantity::default(), Add::add)
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let captures = QUANTITY_PATTERN
            .captures(value)
            .context(InvalidQuantitySnafu { value })?;

        let (integer, fraction) = captures["number"]
            .split_once('.')
            .unwrap_or((&captures["number"], ""));
        let (binary_exponent, decimal_exponent, format) =
            parse_suffix(captures.name("suffix").map_or("", |m| m.as_str()))
                .context(QuantityOverflowSnafu { value })?;

        let digits = format!("{integer}{fraction}");
        let mantissa = if digits.is_empty() {
            0
        } else {
            digits
                .parse::<i128>()
                .ok()
                .context(QuantityOverflowSnafu { value })?
        };

        let magnitude = mantissa
            .checked_mul(1 << binary_exponent)
            .context(QuantityOverflowSnafu { value })?;
        let nano_exponent = i64::from(decimal_exponent) + 9 - fraction.len() as i64;
        let magnitude = if nano_exponent >= 0 {
            u32::try_from(nano_exponent)
                .ok()
                .and_then(|exponent| 10i128.checked_pow(exponent))
                .and_then(|scale| magnitude.checked_mul(scale))
                .context(QuantityOverflowSnafu { value })?
        } else {
            match u32::try_from(-nano_exponent)
                .ok()
                .and_then(|exponent| 10i128.checked_pow(exponent))
            {
                Some(divisor) => {
                    magnitude / divisor + i128::from(magnitude % divisor != 0)
                }
                // Smaller than a nano unit, rounded up
                None => i128::from(magnitude != 0),
            }
        };

        let nanos = match captures.name("sign") {
            Some(sign) if sign.as_str() == "-" => -magnitude,
            _ => magnitude,
        };

        Ok(Self { nanos, format })
    }
}

/// Returns the power of two, the power of ten and the notation a suffix stands for.
fn parse_suffix(suffix: &str) -> Option<(u32, i32, Format)> {
    let decimal = |exponent| Some((0, exponent, Format::DecimalSI));
    match suffix {
        "" => decimal(0),
        "n" => decimal(-9),
        "u" => decimal(-6),
        "m" => decimal(-3),
        "k" => decimal(3),
        "M" => decimal(6),
        "G" => decimal(9),
        "T" => decimal(12),
        "P" => decimal(15),
        "E" => decimal(18),
        _ => {
            if let Some(position) = BINARY_SUFFIXES[1..].iter().position(|s| *s == suffix) {
                Some((10 * (position as u32 + 1), 0, Format::BinarySI))
            } else {
                // The pattern only lets exponents through at this point
                suffix[1..]
                    .parse::<i32>()
                    .ok()
                    .map(|exponent| (0, exponent, Format::DecimalExponent))
            }
        }
    }
}

fn decimal_suffix(exponent: i32) -> &'static str {
    match exponent {
        -9 => "n",
        -6 => "u",
        -3 => "m",
        3 => "k",
        6 => "M",
        9 => "G",
        12 => "T",
        15 => "P",
        18 => "E",
        _ => "",
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }

        // Small or fractional binary quantities are easier to read in decimal notation
        let format = match self.format {
            Format::BinarySI
                if self.nanos.abs() < 1024 * NANOS_PER_UNIT || self.nanos % NANOS_PER_UNIT != 0 =>
            {
                Format::DecimalSI
            }
            format => format,
        };

        match format {
            Format::BinarySI => {
                let mut value = self.nanos / NANOS_PER_UNIT;
                let mut exponent = 0;
                while exponent < BINARY_SUFFIXES.len() - 1 && value % 1024 == 0 {
                    value /= 1024;
                    exponent += 1;
                }
                write!(f, "{value}{}", BINARY_SUFFIXES[exponent])
            }
            Format::DecimalSI | Format::DecimalExponent => {
                let mut mantissa = self.nanos;
                let mut exponent = -9;
                while exponent < 18 && mantissa % 1000 == 0 {
                    mantissa /= 1000;
                    exponent += 3;
                }
                match format {
                    Format::DecimalExponent if exponent != 0 => {
                        write!(f, "{mantissa}e{exponent}")
                    }
                    Format::DecimalExponent => write!(f, "{mantissa}"),
                    _ => write!(f, "{mantissa}{}", decimal_suffix(exponent)),
                }
            }
        }
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = Error;

    fn try_from(quantity: &K8sQuantity) -> Result<Self> {
        quantity.0.parse()
    }
}
