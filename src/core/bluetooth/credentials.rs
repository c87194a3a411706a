//! Credential validation
//! SSID and password must be non-empty ASCII of at most 16 bytes before
//! they can be turned into a command.

use std::fmt;

use crate::core::bluetooth::constants::MAX_CREDENTIAL_LEN;
use crate::core::bluetooth::errors::{CredentialField, ProvisionError, ValidationError};

/// A string that satisfies the protocol constraints.
/// The only way to obtain one is through [`validate`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// Keeps passwords out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({} bytes)", self.0.len())
    }
}

/// Validates a raw SSID or password.
pub fn validate(raw: &str) -> Result<Credential, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !raw.is_ascii() {
        return Err(ValidationError::NotAscii);
    }
    if raw.len() > MAX_CREDENTIAL_LEN {
        return Err(ValidationError::TooLong {
            len: raw.len(),
            max: MAX_CREDENTIAL_LEN,
        });
    }
    Ok(Credential(raw.to_string()))
}

/// A validated SSID / password pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: Credential,
    pub password: Credential,
}

impl Credentials {
    /// Validates both fields. The SSID is checked first.
    pub fn new(ssid: &str, password: &str) -> Result<Self, ProvisionError> {
        let ssid = validate(ssid).map_err(|source| ProvisionError::InvalidCredential {
            field: CredentialField::Ssid,
            source,
        })?;
        let password = validate(password).map_err(|source| ProvisionError::InvalidCredential {
            field: CredentialField::Password,
            source,
        })?;
        Ok(Self { ssid, password })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_one_to_sixteen_ascii_bytes() {
        for len in 1..=MAX_CREDENTIAL_LEN {
            let raw = "x".repeat(len);
            let credential = validate(&raw).unwrap();
            assert_eq!(credential.as_str(), raw);
            assert_eq!(credential.as_bytes().len(), len);
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(validate(""), Err(ValidationError::Empty));
    }

    #[test]
    fn rejects_more_than_sixteen_bytes() {
        for len in [17, 32, 255] {
            assert_eq!(
                validate(&"y".repeat(len)),
                Err(ValidationError::TooLong { len, max: 16 })
            );
        }
    }

    #[test]
    fn rejects_non_ascii() {
        assert_eq!(validate("caf\u{e9}"), Err(ValidationError::NotAscii));
    }

    #[test]
    fn credentials_report_the_failing_field() {
        match Credentials::new("", "secret") {
            Err(ProvisionError::InvalidCredential { field, source }) => {
                assert_eq!(field, CredentialField::Ssid);
                assert_eq!(source, ValidationError::Empty);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match Credentials::new("home", "this-password-is-too-long") {
            Err(ProvisionError::InvalidCredential { field, source }) => {
                assert_eq!(field, CredentialField::Password);
                assert!(matches!(source, ValidationError::TooLong { len: 25, .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn debug_output_hides_the_value() {
        let credential = validate("secret12").unwrap();
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("secret12"));
    }
}
