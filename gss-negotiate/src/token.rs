//! Base64 text form of negotiation tokens.
use base64::{engine::general_purpose::STANDARD, DecodeError, Engine as _};
use std::{ffi::CString, fmt};

/// An output token in standard base64 (RFC 4648, padded).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn encode(raw: &[u8]) -> Token {
        Token(STANDARD.encode(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>, DecodeError> {
        STANDARD.decode(&self.0)
    }

    /// NUL terminated copy for C callers.
    pub fn to_c_string(&self) -> CString {
        // the base64 alphabet has no NUL
        CString::new(self.0.as_bytes()).expect("base64 text contains no NUL bytes")
    }

    /// The value of an `Authorization` header carrying this token.
    pub fn authorization_header(&self) -> String {
        format!("Negotiate {}", self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} chars>)", self.0.len())
    }
}

impl From<Token> for String {
    fn from(token: Token) -> String {
        token.0
    }
}

/// Decode a server challenge. Surrounding whitespace and a trailing NUL are
/// ignored; an empty challenge means there is no input token.
pub fn decode_challenge(challenge: &str) -> Result<Option<Vec<u8>>, DecodeError> {
    let challenge = challenge.trim().trim_end_matches('\0').trim_end();
    if challenge.is_empty() {
        Ok(None)
    } else {
        STANDARD.decode(challenge).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn token_text_forms() {
        let token = Token::encode(b"\x60\x28\x06\x06");
        assert_eq!(token.as_str(), "YCgGBg==");
        assert_eq!(token.authorization_header(), "Negotiate YCgGBg==");
        assert_eq!(token.decode().unwrap(), b"\x60\x28\x06\x06");
        assert_eq!(token.to_c_string().as_bytes_with_nul(), b"YCgGBg==\0");
        assert_eq!(format!("{token:?}"), "Token(<8 chars>)");
    }

    #[rstest]
    #[case("", None)]
    #[case("   ", None)]
    #[case("\0", None)]
    #[case("YCgGBg==", Some(vec![0x60, 0x28, 0x06, 0x06]))]
    #[case(" YCgGBg==\0", Some(vec![0x60, 0x28, 0x06, 0x06]))]
    fn challenges(#[case] input: &str, #[case] expected: Option<Vec<u8>>) {
        assert_eq!(decode_challenge(input).unwrap(), expected);
    }

    #[rstest]
    #[case("not base64!")]
    #[case("YCgGBg=")]
    fn bad_challenges(#[case] input: &str) {
        assert!(decode_challenge(input).is_err());
    }
}
