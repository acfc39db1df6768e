use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Inr,
    Aed,
    Cad,
}

impl Currency {
    pub const ALL: [Currency; 6] =
        [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Inr, Currency::Aed, Currency::Cad];

    pub fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Inr => "INR",
            Self::Aed => "AED",
            Self::Cad => "CAD",
        }
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|currency| currency.code() == normalized)
            .ok_or_else(|| DomainError::UnknownCurrency(value.to_string()))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::Currency;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!("eur".parse::<Currency>(), Ok(Currency::Eur));
        assert_eq!(" AED ".parse::<Currency>(), Ok(Currency::Aed));
        assert!("JPY".parse::<Currency>().is_err());
    }

    #[test]
    fn defaults_to_usd() {
        assert_eq!(Currency::default(), Currency::Usd);
        assert_eq!(serde_json::to_string(&Currency::Inr).expect("serialize"), "\"INR\"");
    }
}
