//! Brazilian postal code (CEP) lookups, the stock use of the race client.

use std::{fmt, str::FromStr};

use crate::config::ProviderConfig;

/// CEP looked up when none is given.
pub const DEFAULT_CEP: &str = "01153000";

pub const BRASILAPI_URL: &str = "https://brasilapi.com.br/api/cep/v1/{key}";
pub const VIACEP_URL: &str = "http://viacep.com.br/ws/{key}/json/";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid CEP {0:?}: expected 8 digits, optionally as 00000-000")]
pub struct InvalidCep(pub String);

/// An 8-digit Brazilian postal code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cep(String);

impl Cep {
    /// Accepts `01153000` or `01153-000`, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Result<Self, InvalidCep> {
        let trimmed = raw.trim();
        let digits = match trimmed.split_once('-') {
            Some((head, tail)) if head.len() == 5 && tail.len() == 3 => format!("{head}{tail}"),
            Some(_) => return Err(InvalidCep(raw.to_string())),
            None => trimmed.to_string(),
        };

        if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidCep(raw.to_string()));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cep {
    type Err = InvalidCep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// BrasilAPI and ViaCEP, the two public CEP services.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("BrasilAPI", BRASILAPI_URL),
        ProviderConfig::new("ViaCEP", VIACEP_URL),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_hyphenated() {
        assert_eq!(Cep::parse("01153000").unwrap().as_str(), "01153000");
        assert_eq!(Cep::parse(" 01153-000 ").unwrap().to_string(), "01153000");
        assert_eq!("70040-010".parse::<Cep>().unwrap().as_str(), "70040010");
    }

    #[test]
    fn rejects_malformed_codes() {
        for raw in ["", "0115300", "011530000", "0115-3000", "01153-00a", "abcdefgh"] {
            assert_eq!(Cep::parse(raw), Err(InvalidCep(raw.to_string())), "{raw}");
        }
    }

    #[test]
    fn default_providers_resolve_the_key() {
        let targets: Vec<_> = default_providers()
            .iter()
            .map(|p| p.target(DEFAULT_CEP))
            .collect();
        assert_eq!(
            targets,
            vec![
                "https://brasilapi.com.br/api/cep/v1/01153000",
                "http://viacep.com.br/ws/01153000/json/",
            ]
        );
    }
}
