//! Channel bindings (RFC 2744 §3.11): tie a token to the transport
//! connection it travels over.
use bytes::{BufMut, Bytes, BytesMut};
use std::{
    io,
    net::{IpAddr, TcpStream},
};

/// A borrowed, connected transport socket.
#[cfg(unix)]
pub type RawTransport<'a> = std::os::fd::BorrowedFd<'a>;

/// A borrowed, connected transport socket.
#[cfg(windows)]
pub type RawTransport<'a> = std::os::windows::io::BorrowedSocket<'a>;

/// GSS-API address families (`GSS_C_AF_*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AddressFamily {
    Inet = 2,
    Inet6 = 24,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelAddress {
    pub family: AddressFamily,
    pub octets: Vec<u8>,
}

impl From<IpAddr> for ChannelAddress {
    fn from(ip: IpAddr) -> Self {
        match ip.to_canonical() {
            IpAddr::V4(v4) => ChannelAddress {
                family: AddressFamily::Inet,
                octets: v4.octets().to_vec(),
            },
            IpAddr::V6(v6) => ChannelAddress {
                family: AddressFamily::Inet6,
                octets: v6.octets().to_vec(),
            },
        }
    }
}

/// Mirrors `gss_channel_bindings_struct`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelBindings {
    pub initiator: Option<ChannelAddress>,
    pub acceptor: Option<ChannelAddress>,
    pub application_data: Option<Bytes>,
}

impl ChannelBindings {
    /// Read the local and peer addresses of a connected socket.
    ///
    /// The handle is duplicated and the duplicate closed afterwards; the
    /// caller's socket is left open.
    pub fn from_socket(socket: RawTransport<'_>) -> io::Result<ChannelBindings> {
        let stream = TcpStream::from(socket.try_clone_to_owned()?);
        let local = stream.local_addr()?;
        let peer = stream.peer_addr()?;
        trace!("binding to connection {local} -> {peer}");
        Ok(ChannelBindings {
            initiator: Some(local.ip().into()),
            acceptor: Some(peer.ip().into()),
            application_data: None,
        })
    }

    /// Add application data, e.g. an RFC 5929 `tls-server-end-point` value.
    pub fn with_application_data(mut self, data: impl Into<Bytes>) -> ChannelBindings {
        self.application_data = Some(data.into());
        self
    }

    /// Deterministic byte encoding: each address as family, length and
    /// octets (family 0 when absent), then the length-prefixed application
    /// data.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for address in [&self.initiator, &self.acceptor] {
            match address {
                Some(address) => {
                    buf.put_u32(address.family as u32);
                    buf.put_u32(address.octets.len() as u32);
                    buf.put_slice(&address.octets);
                }
                None => {
                    buf.put_u32(0);
                    buf.put_u32(0);
                }
            }
        }
        let data = self.application_data.as_deref().unwrap_or_default();
        buf.put_u32(data.len() as u32);
        buf.put_slice(data);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr, TcpListener};

    #[test]
    fn mapped_ipv4_addresses_are_canonicalised() {
        let mapped = IpAddr::V6(Ipv4Addr::new(192, 0, 2, 7).to_ipv6_mapped());
        let address = ChannelAddress::from(mapped);
        assert_eq!(address.family, AddressFamily::Inet);
        assert_eq!(address.octets, vec![192, 0, 2, 7]);
        let v6 = ChannelAddress::from(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(v6.family, AddressFamily::Inet6);
        assert_eq!(v6.octets.len(), 16);
    }

    #[test]
    fn encoding_distinguishes_application_data() {
        let plain = ChannelBindings {
            initiator: Some(IpAddr::V4(Ipv4Addr::LOCALHOST).into()),
            acceptor: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)).into()),
            application_data: None,
        };
        let with_data = plain.clone().with_application_data(&b"tls-server-end-point:abc"[..]);
        assert_ne!(plain.encode(), with_data.encode());
        assert_eq!(plain.encode(), plain.clone().encode());
        assert_eq!(ChannelBindings::default().encode().len(), 20);
    }

    #[cfg(unix)]
    #[test]
    fn socket_addresses_are_read_without_closing() {
        use std::os::fd::AsFd;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let _server = listener.accept().unwrap();
        let bindings = ChannelBindings::from_socket(client.as_fd()).unwrap();
        assert_eq!(bindings.initiator, Some(IpAddr::V4(Ipv4Addr::LOCALHOST).into()));
        assert_eq!(bindings.acceptor, Some(IpAddr::V4(Ipv4Addr::LOCALHOST).into()));
        // still usable after the duplicate was dropped
        assert!(client.peer_addr().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn unconnected_socket_fails() {
        use std::os::fd::AsFd;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        assert!(ChannelBindings::from_socket(listener.as_fd()).is_err());
    }
}
