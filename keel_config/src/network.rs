use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// An IP network: an address plus a prefix length, written `addr/prefix`
/// (e.g. `10.0.0.0/8`, `fd00::/64`). A bare address is a single-host network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

/// Represents the ways an [`IpNetwork`] may be invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpNetworkError {
    /// The address part is not an IP address.
    #[error("invalid IP address '{0}'")]
    Address(String),
    /// The prefix part is not a number.
    #[error("invalid network prefix '{0}'")]
    Prefix(String),
    /// The prefix is longer than the address.
    #[error("network prefix /{prefix} is too long for {addr}")]
    PrefixTooLong {
        /// The address
        addr: IpAddr,
        /// The rejected prefix length
        prefix: u8,
    },
}

impl IpNetwork {
    /// Creates a network, rejecting prefixes longer than the address.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, IpNetworkError> {
        if prefix > Self::max_prefix(&addr) {
            return Err(IpNetworkError::PrefixTooLong { addr, prefix });
        }

        Ok(Self { addr, prefix })
    }

    /// The address this network was written with.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The prefix length.
    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Reports whether the given address belongs to this network.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }

    fn max_prefix(addr: &IpAddr) -> u8 {
        match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = IpNetworkError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (addr, prefix) = match input.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (input, None),
        };

        let addr = IpAddr::from_str(addr).map_err(|_| IpNetworkError::Address(addr.to_string()))?;
        let prefix = match prefix {
            Some(prefix) => prefix
                .parse::<u8>()
                .map_err(|_| IpNetworkError::Prefix(prefix.to_string()))?,
            None => Self::max_prefix(&addr),
        };

        Self::new(addr, prefix)
    }
}

impl Display for IpNetwork {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

const _: () = {
    const FIELDS: &[&str] = &["addr", "prefix"];

    impl<'de> Deserialize<'de> for IpNetwork {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_struct("IpNetwork", FIELDS, IpNetworkVisitor)
        }
    }

    struct IpNetworkVisitor;

    impl<'de> Visitor<'de> for IpNetworkVisitor {
        type Value = IpNetwork;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("an IP network such as 10.0.0.0/8, or a map with addr and prefix")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            IpNetwork::from_str(value).map_err(E::custom)
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut addr: Option<IpAddr> = None;
            let mut prefix: Option<u8> = None;

            while let Some(key) = map.next_key::<String>()? {
                match key.as_str() {
                    "addr" => addr = Some(map.next_value()?),
                    "prefix" => prefix = Some(map.next_value()?),
                    _ => {
                        map.next_value::<de::IgnoredAny>()?;
                    }
                }
            }

            let addr = addr.ok_or_else(|| <A::Error as de::Error>::missing_field("addr"))?;
            let prefix = prefix.unwrap_or_else(|| IpNetwork::max_prefix(&addr));

            IpNetwork::new(addr, prefix).map_err(de::Error::custom)
        }
    }
};
