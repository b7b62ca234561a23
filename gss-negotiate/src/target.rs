//! Addressing for a negotiation.
//!
//! The primary scheme is a host specifier, `fqdn` or `fqdn:port`. The legacy
//! scheme names the service principal directly and lets the caller pick the
//! mechanism.
use crate::error::{NegotiateError, Result};
use std::{fmt, str::FromStr};

/// Port implied when a host specifier has none.
pub const DEFAULT_PORT: u16 = 80;

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// The Kerberos service used for HTTP Negotiate (RFC 4559 §4.1).
pub const HTTP_SERVICE: &str = "HTTP";

/// A validated `fqdn[:port]` target.
///
/// Host names are stored lowercase so two specifiers differing only in case
/// address the same cached ticket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostSpec {
    host: String,
    port: u16,
}

impl HostSpec {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let malformed = |reason| NegotiateError::MalformedHost {
            input: format!("{host}:{port}"),
            reason,
        };
        validate_host(host).map_err(malformed)?;
        if port == 0 {
            return Err(malformed("port 0 is not addressable"));
        }
        Ok(HostSpec {
            host: host.to_ascii_lowercase(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host-based service name `HTTP@host`. The port never takes part.
    pub fn service_name(&self) -> ServiceName {
        ServiceName {
            name: format!("{HTTP_SERVICE}@{}", self.host),
            kind: NameType::HostBasedService,
        }
    }
}

impl FromStr for HostSpec {
    type Err = NegotiateError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason| NegotiateError::MalformedHost {
            input: s.to_owned(),
            reason,
        };
        if s.is_empty() {
            return Err(malformed("empty host specifier"));
        }
        if s.contains("://") {
            return Err(malformed("scheme prefixes are not allowed"));
        }
        let (host, port) = match s.split_once(':') {
            None => (s, DEFAULT_PORT),
            Some((_, "")) => return Err(malformed("empty port")),
            Some((host, port)) => {
                if !port.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed("port is not a number"));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| malformed("port out of range"))?;
                (host, port)
            }
        };
        validate_host(host).map_err(malformed)?;
        if port == 0 {
            return Err(malformed("port 0 is not addressable"));
        }
        Ok(HostSpec {
            host: host.to_ascii_lowercase(),
            port,
        })
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == DEFAULT_PORT {
            f.write_str(&self.host)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn validate_host(host: &str) -> std::result::Result<(), &'static str> {
    if host.is_empty() {
        return Err("empty host name");
    }
    if host.len() > MAX_HOST_LEN {
        return Err("host name too long");
    }
    if host.contains('/') {
        return Err("paths are not allowed");
    }
    if !host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
    {
        return Err("invalid character in host name");
    }
    for label in host.split('.') {
        if label.is_empty() {
            return Err("empty label in host name");
        }
        if label.len() > MAX_LABEL_LEN {
            return Err("label too long");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("label starts or ends with '-'");
        }
    }
    Ok(())
}

/// GSS-API name types the engine imports target names as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameType {
    /// `service@host` (GSS_C_NT_HOSTBASED_SERVICE)
    HostBasedService,
    /// `service/host@REALM` (GSS_KRB5_NT_PRINCIPAL_NAME)
    KerberosPrincipal,
}

/// A target name together with the type it should be imported as.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceName {
    pub name: String,
    pub kind: NameType,
}

/// Negotiation mechanisms selectable through the legacy principal form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NegotiateMechanism {
    /// RFC 4178 SPNEGO, 1.3.6.1.5.5.2
    #[default]
    Spnego,
    /// Raw Kerberos v5, 1.2.840.113554.1.2.2
    Krb5,
}

impl NegotiateMechanism {
    /// BER encoded object identifier.
    pub fn oid(self) -> &'static [u8] {
        match self {
            NegotiateMechanism::Spnego => b"\x2b\x06\x01\x05\x05\x02",
            NegotiateMechanism::Krb5 => b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x02",
        }
    }
}

impl fmt::Display for NegotiateMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiateMechanism::Spnego => f.write_str("SPNEGO"),
            NegotiateMechanism::Krb5 => f.write_str("Kerberos v5"),
        }
    }
}

/// A service principal name: `service/host[:port][@REALM]` or `service@host`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServicePrincipal {
    raw: String,
    service: String,
    host: HostSpec,
    realm: Option<String>,
    kind: NameType,
}

impl ServicePrincipal {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The host part, used to find the cached ticket.
    pub fn host(&self) -> &HostSpec {
        &self.host
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn service_name(&self) -> ServiceName {
        ServiceName {
            name: self.raw.clone(),
            kind: self.kind,
        }
    }
}

impl FromStr for ServicePrincipal {
    type Err = NegotiateError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason| NegotiateError::MalformedPrincipal {
            input: s.to_owned(),
            reason,
        };
        let (service, host, realm, kind) = if let Some((service, rest)) = s.split_once('/') {
            match rest.split_once('@') {
                Some((_, "")) => return Err(malformed("empty realm")),
                Some((host, realm)) => {
                    (service, host, Some(realm.to_owned()), NameType::KerberosPrincipal)
                }
                None => (service, rest, None, NameType::KerberosPrincipal),
            }
        } else if let Some((service, host)) = s.split_once('@') {
            (service, host, None, NameType::HostBasedService)
        } else {
            return Err(malformed("expected service/host or service@host"));
        };
        if service.is_empty() {
            return Err(malformed("empty service"));
        }
        if !service
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
        {
            return Err(malformed("invalid character in service"));
        }
        let host = host
            .parse::<HostSpec>()
            .map_err(|_| malformed("invalid host"))?;
        Ok(ServicePrincipal {
            raw: s.to_owned(),
            service: service.to_owned(),
            host,
            realm,
            kind,
        })
    }
}

impl fmt::Display for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Who the token is for: resolved by host, or by principal name (legacy).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NegotiationTarget {
    Host(HostSpec),
    Principal {
        mechanism: NegotiateMechanism,
        name: ServicePrincipal,
    },
}

impl NegotiationTarget {
    /// The host whose cached ticket is used.
    pub fn host(&self) -> &HostSpec {
        match self {
            NegotiationTarget::Host(host) => host,
            NegotiationTarget::Principal { name, .. } => name.host(),
        }
    }

    /// Host targets always negotiate through SPNEGO.
    pub fn mechanism(&self) -> NegotiateMechanism {
        match self {
            NegotiationTarget::Host(_) => NegotiateMechanism::Spnego,
            NegotiationTarget::Principal { mechanism, .. } => *mechanism,
        }
    }

    pub fn service_name(&self) -> ServiceName {
        match self {
            NegotiationTarget::Host(host) => host.service_name(),
            NegotiationTarget::Principal { name, .. } => name.service_name(),
        }
    }
}

impl fmt::Display for NegotiationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationTarget::Host(host) => write!(f, "{host}"),
            NegotiationTarget::Principal { mechanism, name } => write!(f, "{name} ({mechanism})"),
        }
    }
}
