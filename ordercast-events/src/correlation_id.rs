/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Correlation of HTTP requests, log entries and broker events.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/** Identifier that correlates everything one business request caused.

Minted at the edge when a request arrives without one, then propagated
verbatim: on the `X-Correlation-ID` header of every HTTP hop, in the
`correlation-id` property of every broker delivery and in the envelope of
every published event.

A freshly minted value is an unguessable 128-bit identifier rendered as 32
lowercase hex characters. Inbound values are accepted as-is when they are
printable ASCII of at most 64 characters; anything else is treated as absent
so a hostile header can not pollute logs or broker properties.
*/
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Upper bound on accepted inbound identifiers.
    pub const MAX_LEN: usize = 64;

    /// Mint a new unguessable identifier (32 hex chars).
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accept an inbound identifier if it is well formed, otherwise `None`.
    pub fn parse<S: AsRef<str>>(value: S) -> Option<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return None;
        }
        if !value.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Accept an inbound identifier or mint a fresh one.
    pub fn parse_or_mint(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_else(Self::mint)
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minted_id_is_32_hex_chars() {
        let correlation_id = CorrelationId::mint();
        assert_eq!(correlation_id.as_str().len(), 32);
        assert!(
            correlation_id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn inbound_values_are_filtered() {
        assert!(CorrelationId::parse("abc-123").is_some());
        assert!(CorrelationId::parse("").is_none());
        assert!(CorrelationId::parse("   ").is_none());
        assert!(CorrelationId::parse("a".repeat(65)).is_none());
        assert!(CorrelationId::parse("with space").is_none());
        assert!(CorrelationId::parse("smörgås").is_none());
    }

    #[test]
    fn present_header_is_echoed_byte_for_byte() {
        let correlation_id = CorrelationId::parse_or_mint(Some("client-chosen-id-42"));
        assert_eq!(correlation_id.as_str(), "client-chosen-id-42");
        let minted = CorrelationId::parse_or_mint(None);
        assert_eq!(minted.as_str().len(), 32);
    }
}
