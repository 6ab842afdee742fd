use serde::{Deserialize, Serialize};

/// Unit a reward program pays out in. Cashback programs are pinned at
/// 1.0 cents per unit ("1 percent = 1 cent per dollar"); see catalog
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardUnit {
    Points,
    Miles,
    Cashback,
}

impl RewardUnit {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Miles => "miles",
            Self::Cashback => "cashback",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "points" => Ok(Self::Points),
            "miles" => Ok(Self::Miles),
            "cashback" => Ok(Self::Cashback),
            other => anyhow::bail!("unknown reward unit: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Discover,
}

impl CardNetwork {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "visa" => Ok(Self::Visa),
            "mastercard" => Ok(Self::Mastercard),
            "amex" => Ok(Self::Amex),
            "discover" => Ok(Self::Discover),
            other => anyhow::bail!("unknown card network: {other}"),
        }
    }
}

/// A points/miles/cashback currency with its configured valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardProgram {
    pub id: String,
    pub name: String,
    pub unit: RewardUnit,
    /// Value of one reward unit, in cents.
    pub cents_per_unit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapPeriod {
    Month,
    Quarter,
    Year,
}

impl CapPeriod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            other => anyhow::bail!("unknown cap period: {other}"),
        }
    }

    /// Length of the period in months, for scaling a monthly spend
    /// assumption to the cap's period.
    pub const fn months(self) -> f64 {
        match self {
            Self::Month => 1.0,
            Self::Quarter => 3.0,
            Self::Year => 12.0,
        }
    }
}

/// Limit on how much spend earns a rule's elevated multiplier per period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpendCap {
    /// Dollars of spend per period at the elevated rate. Must be > 0.
    pub amount: f64,
    pub period: CapPeriod,
}

/// One reward clause of a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningRule {
    pub card_id: String,
    /// Normalized category this rule applies to. `None` means the rule
    /// applies to all spend (the card's base rate).
    pub category: Option<String>,
    /// Reward units earned per dollar (5.0 means 5% for cashback).
    pub multiplier: f64,
    pub cap: Option<SpendCap>,
    /// Category activation changes over time. Informational only: the
    /// engine treats a rotating rule as active.
    #[serde(default)]
    pub rotating: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardProduct {
    pub id: String,
    pub name: String,
    pub issuer: String,
    pub network: CardNetwork,
    pub annual_fee: f64,
    /// Reward program this card earns into.
    pub program_id: String,
    /// Earning multiplier on uncategorized spend, 0.0 when the card
    /// defines none. Used as the out-of-cap rate when blending.
    #[serde(default)]
    pub base_multiplier: f64,
}
