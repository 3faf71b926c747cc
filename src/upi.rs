//! UPI payment requests and the `upi://pay` URI they encode to.

use std::fmt;

use thiserror::Error;

/// The amount was not a non-negative decimal numeral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amount provided")]
pub struct InvalidAmount;

/// A validated amount, kept as the caller wrote it so the URI carries the exact digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(String);

impl Amount {
    /// Accepts ASCII digits with at most one `.` and at least one digit.
    ///
    /// ```rust
    /// use upi_qr::upi::Amount;
    ///
    /// assert!(Amount::parse("99.50").is_ok());
    /// assert!(Amount::parse("-5").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, InvalidAmount> {
        let mut digits = 0usize;
        let mut dots = 0usize;
        for b in s.bytes() {
            match b {
                b'0'..=b'9' => digits += 1,
                b'.' => dots += 1,
                _ => return Err(InvalidAmount),
            }
        }
        if digits == 0 || dots > 1 {
            return Err(InvalidAmount);
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything that goes into one payment URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub payee_id: String,
    pub payee_name: String,
    pub currency_code: String,
    pub amount: Option<Amount>,
}

impl PaymentRequest {
    /// Builds a request, validating the amount.
    ///
    /// An empty amount string counts as no amount at all.
    pub fn new(
        payee_id: impl Into<String>,
        payee_name: impl Into<String>,
        currency_code: impl Into<String>,
        amount: Option<&str>,
    ) -> Result<Self, InvalidAmount> {
        let amount = match amount {
            Some(a) if !a.is_empty() => Some(Amount::parse(a)?),
            _ => None,
        };
        Ok(Self {
            payee_id: payee_id.into(),
            payee_name: payee_name.into(),
            currency_code: currency_code.into(),
            amount,
        })
    }

    /// Renders `upi://pay?pa=<id>&pn=<name>&cu=<currency>[&am=<amount>]`.
    ///
    /// Name and currency are written as given, except that `%`, `&`, `=` and `#` are
    /// percent-encoded so user text cannot end the parameter early or add new ones. Spaces and
    /// other characters pass through unchanged. The payee id is service configuration and is
    /// emitted as is.
    pub fn to_uri(&self) -> String {
        let mut uri = format!(
            "upi://pay?pa={}&pn={}&cu={}",
            self.payee_id,
            encode_component(&self.payee_name),
            encode_component(&self.currency_code),
        );
        if let Some(amount) = &self.amount {
            uri.push_str("&am=");
            uri.push_str(amount.as_str());
        }
        uri
    }
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}
