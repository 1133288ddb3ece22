//! Contact details used for shipping addresses and the payment modal prefill.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`] or [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty.
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not `local@domain.tld`.
    #[error("email must look like name@domain.tld")]
    MalformedEmail,
    /// The phone number has characters other than digits, spaces, dashes or a leading `+`.
    #[error("phone number may only contain digits, spaces, dashes and a leading +")]
    InvalidPhoneCharacter,
    /// The phone number has too few or too many digits.
    #[error("phone number must have between {min} and {max} digits")]
    PhoneLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// A normalized (trimmed, lowercased) email address.
///
/// ```
/// use bazaar_core::Email;
///
/// assert_eq!(Email::parse(" Buyer@Example.COM ").unwrap().as_str(), "buyer@example.com");
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 254 characters, or
    /// does not have exactly one `@` followed by a dotted domain.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty("email"));
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let mut parts = s.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ContactError::MalformedEmail);
        };

        let domain_ok = domain
            .split('.')
            .all(|label| !label.is_empty() && !label.contains(char::is_whitespace))
            && domain.contains('.');
        if local.is_empty() || !domain_ok {
            return Err(ContactError::MalformedEmail);
        }

        Ok(Self(s.to_lowercase()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// A phone number, stored as digits with an optional leading `+`.
///
/// Spaces and dashes are stripped on parse so `+91 98765-43210` and
/// `+919876543210` compare equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    const MIN_DIGITS: usize = 7;
    const MAX_DIGITS: usize = 15;

    /// Parse a `Phone` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, unexpected characters, or a digit
    /// count outside 7..=15 (E.164).
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty("phone number"));
        }

        let (prefix, rest) = s
            .strip_prefix('+')
            .map_or(("", s), |rest| ("+", rest));

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' => {}
                _ => return Err(ContactError::InvalidPhoneCharacter),
            }
        }

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(ContactError::PhoneLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(format!("{prefix}{digits}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalizes_case_and_whitespace() {
        let email = Email::parse("  Seller@Shop.IN ").expect("valid email");
        assert_eq!(email.as_str(), "seller@shop.in");
    }

    #[test]
    fn test_email_rejects_malformed() {
        assert_eq!(Email::parse(""), Err(ContactError::Empty("email")));
        assert_eq!(Email::parse("a@b@c.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("@shop.in"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("buyer@shop."), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("buyer@shop"), Err(ContactError::MalformedEmail));
    }

    #[test]
    fn test_email_deserialize_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"a@b.co\"");
        assert!(ok.is_ok());

        let bad: Result<Email, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_phone_strips_separators() {
        let phone = Phone::parse("+91 98765-43210").expect("valid phone");
        assert_eq!(phone.as_str(), "+919876543210");
        assert_eq!(phone, Phone::parse("+919876543210").expect("valid phone"));
    }

    #[test]
    fn test_phone_rejects_letters_and_bad_length() {
        assert_eq!(
            Phone::parse("98765abc"),
            Err(ContactError::InvalidPhoneCharacter)
        );
        assert!(matches!(
            Phone::parse("12345"),
            Err(ContactError::PhoneLength { .. })
        ));
        assert!(matches!(
            Phone::parse("1234567890123456"),
            Err(ContactError::PhoneLength { .. })
        ));
    }
}
