//! RFC 4559 header helpers.
use crate::token::Token;

pub const NEGOTIATE_SCHEME: &str = "Negotiate";

/// Find the Negotiate challenge in a `WWW-Authenticate` value.
///
/// Returns the base64 challenge, `Some("")` for a bare `Negotiate` offer,
/// and `None` when the server does not offer Negotiate.
pub fn parse_negotiate_challenge(www_authenticate: &str) -> Option<&str> {
    www_authenticate.split(',').map(str::trim).find_map(|entry| {
        let (scheme, rest) = match entry.split_once(char::is_whitespace) {
            Some((scheme, rest)) => (scheme, rest.trim()),
            None => (entry, ""),
        };
        scheme
            .eq_ignore_ascii_case(NEGOTIATE_SCHEME)
            .then_some(rest)
    })
}

pub fn authorization_header(token: &Token) -> String {
    token.authorization_header()
}
