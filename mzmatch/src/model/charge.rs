use serde::{Deserialize, Serialize};

/// The sign of a charge
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ChargeSign {
    /// Positive mode
    #[default]
    Positive,
    /// Negative mode
    Negative,
}

/// A charge state, always present on an assumption.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Charge {
    sign: ChargeSign,
    magnitude: u32,
}

impl Charge {
    /// Create a new charge
    pub const fn new(sign: ChargeSign, magnitude: u32) -> Self {
        Self { sign, magnitude }
    }

    /// A positive charge with the given magnitude
    pub const fn positive(magnitude: u32) -> Self {
        Self::new(ChargeSign::Positive, magnitude)
    }

    /// Interpret a signed number, engines write negative mode charges as negative numbers
    pub const fn from_signed(value: i32) -> Self {
        if value < 0 {
            Self::new(ChargeSign::Negative, value.unsigned_abs())
        } else {
            Self::new(ChargeSign::Positive, value.unsigned_abs())
        }
    }

    /// The sign
    pub const fn sign(&self) -> ChargeSign {
        self.sign
    }

    /// The magnitude
    pub const fn magnitude(&self) -> u32 {
        self.magnitude
    }

    /// The charge as a signed number
    pub const fn value(&self) -> i64 {
        match self.sign {
            ChargeSign::Positive => self.magnitude as i64,
            ChargeSign::Negative => -(self.magnitude as i64),
        }
    }
}

impl std::fmt::Display for Charge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sign {
            ChargeSign::Positive => write!(f, "{}+", self.magnitude),
            ChargeSign::Negative => write!(f, "{}-", self.magnitude),
        }
    }
}

impl std::str::FromStr for Charge {
    type Err = std::num::ParseIntError;
    /// Parse `2`, `+2`, `-2`, `2+`, `2-`, or `2.0` (some engines write charges as floats)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_suffix(".0").unwrap_or(s);
        if let Some(number) = s.strip_suffix('+') {
            number.parse::<u32>().map(Self::positive)
        } else if let Some(number) = s.strip_suffix('-') {
            number
                .parse::<u32>()
                .map(|m| Self::new(ChargeSign::Negative, m))
        } else {
            s.parse::<i32>().map(Self::from_signed)
        }
    }
}
