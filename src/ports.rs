use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

use crate::error::PortsError;

/// Ordered, duplicate-free list of ports.
///
/// Order matters: local and remote sets are paired by position, not sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ports(Vec<u16>);

impl Ports {
    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Two sets can be paired when they have the same number of ports.
    pub fn is_matchable(&self, other: &Ports) -> bool {
        self.len() == other.len()
    }

    /// Pair each port with the port at the same position in `other`.
    /// Returns `None` when the sets are not matchable.
    pub fn pair_with<'a>(&'a self, other: &'a Ports) -> Option<impl Iterator<Item = (u16, u16)> + 'a> {
        if !self.is_matchable(other) {
            return None;
        }
        Some(self.0.iter().copied().zip(other.0.iter().copied()))
    }

    fn checked(ports: Vec<u16>) -> Result<Self, PortsError> {
        let mut seen = HashSet::with_capacity(ports.len());
        for &p in &ports {
            if !seen.insert(p) {
                return Err(PortsError::Duplicate(p));
            }
        }
        Ok(Self(ports))
    }
}

fn parse_port(token: &str, spec: &str) -> Result<u16, PortsError> {
    let port: u16 = token
        .trim()
        .parse()
        .map_err(|_| PortsError::malformed(spec, format!("'{}' is not a port number", token.trim())))?;
    if port == 0 {
        return Err(PortsError::malformed(spec, "port 0 is not allowed"));
    }
    Ok(port)
}

impl FromStr for Ports {
    type Err = PortsError;

    /// Parse `"80,443,8000-8010"`. Ranges are inclusive and must not be
    /// inverted; duplicates are checked after every range is expanded.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut ports = Vec::new();
        for token in spec.split(',') {
            if let Some((start, end)) = token.split_once('-') {
                if end.contains('-') {
                    return Err(PortsError::malformed(spec, format!("bad range '{}'", token.trim())));
                }
                let start = parse_port(start, spec)?;
                let end = parse_port(end, spec)?;
                if start > end {
                    return Err(PortsError::malformed(
                        spec,
                        format!("range {}-{} is inverted", start, end),
                    ));
                }
                ports.extend(start..=end);
            } else {
                ports.push(parse_port(token, spec)?);
            }
        }
        Self::checked(ports)
    }
}

impl TryFrom<Vec<u16>> for Ports {
    type Error = PortsError;

    fn try_from(ports: Vec<u16>) -> Result<Self, Self::Error> {
        if ports.contains(&0) {
            return Err(PortsError::malformed("0", "port 0 is not allowed"));
        }
        Self::checked(ports)
    }
}

impl fmt::Display for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

fn port_from_i64<E: de::Error>(v: i64) -> Result<u16, E> {
    match u16::try_from(v) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(E::custom(PortsError::malformed(&v.to_string(), "out of range 1-65535"))),
    }
}

struct PortsVisitor;

impl<'de> Visitor<'de> for PortsVisitor {
    type Value = Ports;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a port list such as \"80,443,8000-8010\", an array of ports, or a single port")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Ports, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Ports, E> {
        let port = port_from_i64(v)?;
        Ok(Ports(vec![port]))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Ports, E> {
        let v = i64::try_from(v).unwrap_or(i64::MAX);
        self.visit_i64(v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Ports, A::Error> {
        let mut ports = Vec::new();
        while let Some(v) = seq.next_element::<i64>()? {
            ports.push(port_from_i64(v)?);
        }
        Ports::checked(ports).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Ports {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PortsVisitor)
    }
}
