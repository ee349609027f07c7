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

//! Validate authentication with Bearer tokens.

use crossbeam_skiplist::SkipMap;
use crossbeam_skiplist::map::Entry;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use ordercast_core::CoreError;
use ordercast_core::CoreErrorKind;
use ordercast_core::conf::JwtConfig;
use ordercast_core::util::time::get_timestamp_micros;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Claim names probed for the subject, first match wins.
const SUBJECT_CLAIMS: [&str; 3] = ["nameidentifier", "sub", "userId"];

/// Identity extracted from a successfully validated bearer token.
#[derive(Debug)]
pub struct VerifiedIdentity {
    subject: Option<String>,
}

impl VerifiedIdentity {
    /// Subject claim of the token, if the token carried one.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

/** Validates authentication using Bearer tokens.

Tokens are HMAC-SHA256 signed by the platform's auth service with a shared
secret. Validation checks issuer, lifetime and signature with zero clock
skew; the audience claim is deliberately left unchecked so one token works
across all services behind the gateway.

Validated identities are cached by raw token until the token expires, so the
hot path of a busy client skips signature verification. A background task
purges entries whose token expired unused.
*/
pub struct BearerTokenChecker {
    decoding_key: DecodingKey,
    validation: Validation,
    identity_by_bearer_token: SkipMap<String, (u64, Arc<VerifiedIdentity>)>,
}

impl BearerTokenChecker {
    /// Interval between purge sweeps of expired cache entries.
    const PURGE_INTERVAL_MICROS: u64 = 60_000_000;

    /// Return a new instance.
    pub fn new(jwt_config: &JwtConfig) -> Arc<Self> {
        let decoding_key = DecodingKey::from_secret(jwt_config.secret_key().as_bytes());
        let validation = {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.leeway = 0;
            validation.validate_exp = true;
            validation.validate_aud = false;
            validation.set_issuer(&[jwt_config.issuer()]);
            validation.required_spec_claims.insert("iss".to_string());
            validation
        };
        Arc::new(Self {
            decoding_key,
            validation,
            identity_by_bearer_token: SkipMap::default(),
        })
        .init()
    }

    fn init(self: Arc<Self>) -> Arc<Self> {
        let self_clone = Arc::clone(&self);
        tokio::spawn(async move { self_clone.purge_expired_cached_identities().await });
        self
    }

    /// Purge old and expired bearer tokens from cache.
    ///
    /// Validity is still verified on use and expired tokens in use are
    /// removed; this only reclaims memory for tokens that went cold.
    async fn purge_expired_cached_identities(&self) {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_micros(
                Self::PURGE_INTERVAL_MICROS,
            ))
            .await;
            let now = get_timestamp_micros();
            for entry in self.identity_by_bearer_token.iter() {
                if entry.value().0 < now {
                    entry.remove();
                }
            }
        }
    }

    /// Validate a raw bearer token and return the identity it proves.
    pub fn verify(&self, bearer_token: &str) -> Result<Arc<VerifiedIdentity>, CoreError> {
        let now_micros = get_timestamp_micros();
        if let Some((expires_micros, identity)) = self
            .identity_by_bearer_token
            .get(bearer_token)
            .as_ref()
            .map(Entry::value)
        {
            if expires_micros >= &now_micros {
                return Ok(Arc::clone(identity));
            }
            self.identity_by_bearer_token.remove(bearer_token);
        }
        let token_data = jsonwebtoken::decode::<HashMap<String, Value>>(
            bearer_token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| {
            CoreErrorKind::AuthenticationFailure
                .error_with_msg(format!("Bearer token validation failed: {e}"))
        })?;
        let identity = Arc::new(VerifiedIdentity {
            subject: extract_subject(&token_data.claims).map(str::to_string),
        });
        if let Some(exp_seconds) = token_data.claims.get("exp").and_then(Value::as_u64) {
            self.identity_by_bearer_token.insert(
                bearer_token.to_owned(),
                (exp_seconds * 1_000_000, Arc::clone(&identity)),
            );
        }
        Ok(identity)
    }
}

/// Extract the subject from token claims: `nameidentifier`, then `sub`, then
/// `userId`.
pub fn extract_subject(claims: &HashMap<String, Value>) -> Option<&str> {
    SUBJECT_CLAIMS
        .iter()
        .find_map(|claim| claims.get(*claim).and_then(Value::as_str))
}

/// Strip the `Bearer` scheme off an `Authorization` header value.
pub fn strip_bearer_scheme(authorization_header: &str) -> Option<&str> {
    authorization_header
        .trim()
        .strip_prefix("Bearer")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;
    use jsonwebtoken::EncodingKey;
    use jsonwebtoken::Header;
    use serde_json::json;

    const SECRET: &str = "test-secret";
    const ISSUER: &str = "ecommerce-auth";

    fn checker() -> Arc<BearerTokenChecker> {
        BearerTokenChecker::new_for_test(SECRET, ISSUER)
    }

    impl BearerTokenChecker {
        fn new_for_test(secret: &str, issuer: &str) -> Arc<Self> {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.leeway = 0;
            validation.validate_exp = true;
            validation.validate_aud = false;
            validation.set_issuer(&[issuer]);
            validation.required_spec_claims.insert("iss".to_string());
            Arc::new(Self {
                decoding_key: DecodingKey::from_secret(secret.as_bytes()),
                validation,
                identity_by_bearer_token: SkipMap::default(),
            })
        }
    }

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future_exp() -> u64 {
        get_timestamp_micros() / 1_000_000 + 3600
    }

    #[tokio::test]
    async fn valid_token_yields_subject() {
        let token = sign(
            &json!({"iss": ISSUER, "exp": far_future_exp(), "sub": "user-42"}),
            SECRET,
        );
        let identity = checker().verify(&token).unwrap();
        assert_eq!(identity.subject(), Some("user-42"));
    }

    #[tokio::test]
    async fn wrong_issuer_and_wrong_signature_are_rejected() {
        let checker = checker();
        let wrong_issuer = sign(
            &json!({"iss": "someone-else", "exp": far_future_exp(), "sub": "user-42"}),
            SECRET,
        );
        assert!(checker.verify(&wrong_issuer).is_err());
        let wrong_signature = sign(
            &json!({"iss": ISSUER, "exp": far_future_exp(), "sub": "user-42"}),
            "other-secret",
        );
        assert!(checker.verify(&wrong_signature).is_err());
    }

    #[tokio::test]
    async fn expired_token_is_rejected_with_zero_skew() {
        let token = sign(
            &json!({"iss": ISSUER, "exp": get_timestamp_micros() / 1_000_000 - 1, "sub": "user-42"}),
            SECRET,
        );
        assert!(checker().verify(&token).is_err());
    }

    #[test]
    fn subject_claim_precedence() {
        let claims: HashMap<String, Value> = serde_json::from_value(json!({
            "nameidentifier": "nid-1",
            "sub": "sub-1",
            "userId": "uid-1",
        }))
        .unwrap();
        assert_eq!(extract_subject(&claims), Some("nid-1"));
        let claims: HashMap<String, Value> =
            serde_json::from_value(json!({"sub": "sub-1", "userId": "uid-1"})).unwrap();
        assert_eq!(extract_subject(&claims), Some("sub-1"));
        let claims: HashMap<String, Value> =
            serde_json::from_value(json!({"userId": "uid-1"})).unwrap();
        assert_eq!(extract_subject(&claims), Some("uid-1"));
        let claims: HashMap<String, Value> = serde_json::from_value(json!({})).unwrap();
        assert_eq!(extract_subject(&claims), None);
    }

    #[test]
    fn bearer_scheme_is_stripped() {
        assert_eq!(strip_bearer_scheme("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(strip_bearer_scheme("  Bearer   abc  "), Some("abc"));
        assert_eq!(strip_bearer_scheme("Basic abc"), None);
        assert_eq!(strip_bearer_scheme("Bearer "), None);
    }
}
