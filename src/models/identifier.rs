use std::fmt;

use crate::errors::{LookbackError, Result};

/// 종목 식별자
///
/// The remote source treats the two schemes differently: a short code can
/// resolve to an unrelated instrument where the ISIN would not. The scheme is
/// therefore chosen by configuration and never inferred from the code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Isin(String),
    ShortCode(String),
}

impl Identifier {
    /// Build an ISIN identifier, validating its shape and check digit
    pub fn isin(code: &str) -> Result<Self> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LookbackError::InvalidIdentifier(format!(
                "ISIN must be 12 alphanumeric characters: '{}'",
                code
            )));
        }
        if !code[..2].chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LookbackError::InvalidIdentifier(format!(
                "ISIN must start with a two-letter country code: '{}'",
                code
            )));
        }

        let expected = isin_check_digit(&code[..11]);
        let actual = code.as_bytes()[11];
        if actual != b'0' + expected {
            return Err(LookbackError::InvalidIdentifier(format!(
                "ISIN check digit mismatch for '{}': expected {}",
                code, expected
            )));
        }

        Ok(Identifier::Isin(code))
    }

    /// Build a market-local short code identifier (e.g. `003230`)
    pub fn short_code(code: &str) -> Result<Self> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() || code.len() > 9 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LookbackError::InvalidIdentifier(format!(
                "short code must be 1-9 alphanumeric characters: '{}'",
                code
            )));
        }
        Ok(Identifier::ShortCode(code))
    }

    pub fn code(&self) -> &str {
        match self {
            Identifier::Isin(code) | Identifier::ShortCode(code) => code,
        }
    }

    /// Query parameter name the API expects for this scheme
    pub fn param_name(&self) -> &'static str {
        match self {
            Identifier::Isin(_) => "isinCd",
            Identifier::ShortCode(_) => "srtnCd",
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Isin(code) => write!(f, "ISIN {}", code),
            Identifier::ShortCode(code) => write!(f, "short code {}", code),
        }
    }
}

// Letters expand to two digits (A=10 .. Z=35), then Luhn over the digit string.
fn isin_check_digit(body: &str) -> u8 {
    let digits: Vec<u32> = body
        .chars()
        .filter_map(|c| c.to_digit(36))
        .flat_map(|v| {
            if v >= 10 {
                vec![v / 10, v % 10]
            } else {
                vec![v]
            }
        })
        .collect();

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    ((10 - sum % 10) % 10) as u8
}
