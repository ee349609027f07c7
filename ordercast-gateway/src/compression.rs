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

//! Conditional compression of textual response bodies.

use std::io::Write;

/// Content types worth compressing. Everything else (images, archives,
/// binaries) is assumed to be compressed already.
const COMPRESSIBLE_CONTENT_TYPES: [&str; 5] = [
    "application/json",
    "text/",
    "application/xml",
    "application/javascript",
    "application/xhtml+xml",
];

/// Response encodings this gateway can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// Brotli, `Content-Encoding: br`.
    Brotli,
    /// Gzip, `Content-Encoding: gzip`.
    Gzip,
}

impl Encoding {
    /// Token used in `Accept-Encoding` and `Content-Encoding`.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "br" => Some(Self::Brotli),
            "gzip" => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Return `true` for content types in the compressible set. Parameters like
/// `; charset=utf-8` are ignored.
pub fn is_compressible_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    COMPRESSIBLE_CONTENT_TYPES
        .iter()
        .any(|compressible| match compressible.ends_with('/') {
            true => essence.starts_with(compressible),
            false => essence.eq(compressible),
        })
}

/** Select the encoding to apply.

Preference order: `br` when the client accepts it and the server enables
it, then `gzip`, then the configured default. A default outside the
supported token set means the response goes out uncompressed.
*/
pub fn select_encoding(
    accept_encoding: &str,
    supported_encodings: &[String],
    default_encoding: &str,
) -> Option<Encoding> {
    let accepted = accept_encoding
        .split(',')
        .map(|token| {
            // Strip quality values like `gzip;q=0.8`.
            token.split(';').next().unwrap_or_default().trim().to_lowercase()
        })
        .collect::<Vec<_>>();
    let server_supports =
        |token: &str| supported_encodings.iter().any(|supported| supported == token);
    let client_accepts = |token: &str| {
        accepted
            .iter()
            .any(|accepted_token| accepted_token == token || accepted_token == "*")
    };
    for candidate in [Encoding::Brotli, Encoding::Gzip] {
        if client_accepts(candidate.token()) && server_supports(candidate.token()) {
            return Some(candidate);
        }
    }
    Encoding::from_token(default_encoding).filter(|candidate| client_accepts(candidate.token()))
}

/// Compress a buffered body with the selected encoding.
pub fn compress(encoding: Encoding, body: &[u8]) -> Vec<u8> {
    match encoding {
        Encoding::Brotli => {
            let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, 5, 22);
            // Writing into a Vec cannot fail.
            writer.write_all(body).unwrap();
            writer.flush().unwrap();
            writer.into_inner()
        }
        Encoding::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(body).unwrap();
            encoder.finish().unwrap()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn compressible_set_matches_spec() {
        assert!(is_compressible_content_type("application/json"));
        assert!(is_compressible_content_type("application/json; charset=utf-8"));
        assert!(is_compressible_content_type("text/plain"));
        assert!(is_compressible_content_type("text/html; charset=utf-8"));
        assert!(is_compressible_content_type("application/xml"));
        assert!(is_compressible_content_type("application/javascript"));
        assert!(is_compressible_content_type("application/xhtml+xml"));
        assert!(!is_compressible_content_type("image/png"));
        assert!(!is_compressible_content_type("application/octet-stream"));
        assert!(!is_compressible_content_type("application/jsonx"));
    }

    fn supported(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|token| token.to_string()).collect()
    }

    #[test]
    fn brotli_is_preferred_then_gzip_then_default() {
        assert_eq!(
            select_encoding("gzip, br", &supported(&["br", "gzip"]), "gzip"),
            Some(Encoding::Brotli)
        );
        assert_eq!(
            select_encoding("gzip", &supported(&["br", "gzip"]), "gzip"),
            Some(Encoding::Gzip)
        );
        // Server does not enable brotli.
        assert_eq!(
            select_encoding("br, gzip", &supported(&["gzip"]), "gzip"),
            Some(Encoding::Gzip)
        );
        // Nothing matches and the default is not a known token.
        assert_eq!(
            select_encoding("deflate", &supported(&["br", "gzip"]), "identity"),
            None
        );
        // Default kicks in when the client accepts it via wildcard.
        assert_eq!(
            select_encoding("*", &supported(&[]), "gzip"),
            Some(Encoding::Gzip)
        );
    }

    #[test]
    fn quality_values_are_ignored_for_matching() {
        assert_eq!(
            select_encoding("gzip;q=0.5, br;q=1.0", &supported(&["br", "gzip"]), "gzip"),
            Some(Encoding::Brotli)
        );
    }

    #[test]
    fn gzip_round_trip() {
        let body = "x".repeat(4096);
        let compressed = compress(Encoding::Gzip, body.as_bytes());
        assert!(compressed.len() < body.len());
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, body);
    }

    #[test]
    fn brotli_output_is_smaller_for_repetitive_text() {
        let body = "{\"key\":\"value\"}".repeat(256);
        let compressed = compress(Encoding::Brotli, body.as_bytes());
        assert!(compressed.len() < body.len());
    }
}
