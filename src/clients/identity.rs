use std::time::{Duration, Instant};

use chrono::NaiveDate;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::AppError;
use crate::models::rider::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Rider,
    Driver,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Rider => "rider",
            UserType::Driver => "driver",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMetadata {
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub user_emergency_contact_name: Option<String>,
    pub user_emergency_contact_number: Option<String>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
}

impl PublicMetadata {
    pub fn date_of_birth(&self) -> Result<Option<NaiveDate>, AppError> {
        parse_date(self.date_of_birth.as_deref())
    }

    pub fn gender(&self) -> Result<Option<Gender>, AppError> {
        match non_blank(self.gender.as_deref()) {
            None => Ok(None),
            Some(raw) => Gender::parse(raw)
                .map(Some)
                .ok_or_else(|| AppError::InvalidInput(format!("unknown gender '{raw}'"))),
        }
    }
}

/// Verified token claims. Unknown claims are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    pub sub: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub user_type: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "public_metadata")]
    pub public_metadata: Option<PublicMetadata>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The claims every principal must carry.
#[derive(Debug, Clone)]
pub struct Profile {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub user_type: UserType,
}

impl IdentityClaims {
    pub fn require_profile(&self) -> Result<Profile, AppError> {
        let missing = || AppError::InvalidInput("required fields are missing".to_string());

        let external_id = non_blank(self.sub.as_deref()).ok_or_else(missing)?;
        let first_name = non_blank(self.first_name.as_deref()).ok_or_else(missing)?;
        let last_name = non_blank(self.last_name.as_deref()).ok_or_else(missing)?;
        let phone_number = non_blank(self.phone_number.as_deref()).ok_or_else(missing)?;
        let user_type = non_blank(self.user_type.as_deref()).ok_or_else(missing)?;

        let user_type = match user_type.to_ascii_lowercase().as_str() {
            "rider" => UserType::Rider,
            "driver" => UserType::Driver,
            other => {
                return Err(AppError::InvalidInput(format!("unknown userType '{other}'")));
            }
        };

        Ok(Profile {
            external_id: external_id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone_number: phone_number.to_string(),
            user_type,
        })
    }

    pub fn email(&self) -> Option<String> {
        non_blank(self.email.as_deref()).map(str::to_string)
    }

    pub fn metadata(&self) -> PublicMetadata {
        self.public_metadata.clone().unwrap_or_default()
    }
}

/// Verifies RS256 bearer tokens against the issuer's JWKS, caching the key set and
/// refreshing it when a token names a key id the cache does not know. Refreshes run one
/// at a time and at most once per `refresh_cooldown`.
pub struct IdentityVerifier {
    client: Client,
    jwks_url: String,
    keys: RwLock<Option<JwkSet>>,
    last_refresh: Mutex<Option<Instant>>,
    refresh_cooldown: Duration,
}

impl IdentityVerifier {
    pub fn new(
        jwks_url: String,
        timeout: Duration,
        refresh_cooldown: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build jwks client: {err}")))?;

        Ok(Self {
            client,
            jwks_url,
            keys: RwLock::new(None),
            last_refresh: Mutex::new(None),
            refresh_cooldown,
        })
    }

    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, AppError> {
        let token = strip_bearer(token);
        if token.is_empty() {
            return Err(AppError::Unauthenticated("missing bearer token".to_string()));
        }

        let header = decode_header(token)
            .map_err(|err| AppError::Unauthenticated(format!("malformed token: {err}")))?;
        let kid = header.kid.as_deref();

        let key = match self.cached_key(kid).await? {
            Some(key) => key,
            None => {
                self.refresh_on_miss(kid).await?;
                self.cached_key(kid).await?.ok_or_else(|| {
                    AppError::Unauthenticated(format!("no signing key for kid {kid:?}"))
                })?
            }
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        let data = decode::<IdentityClaims>(token, &key, &validation).map_err(|err| {
            tracing::warn!(error = %err, "token verification failed");
            AppError::Unauthenticated(format!("invalid or expired token: {err}"))
        })?;

        Ok(data.claims)
    }

    async fn cached_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, AppError> {
        let guard = self.keys.read().await;
        let Some(set) = guard.as_ref() else {
            return Ok(None);
        };

        let jwk = match kid {
            Some(kid) => set.find(kid),
            None if set.keys.len() == 1 => set.keys.first(),
            None => None,
        };

        jwk.map(|jwk| {
            DecodingKey::from_jwk(jwk)
                .map_err(|err| AppError::Unauthenticated(format!("unusable signing key: {err}")))
        })
        .transpose()
    }

    async fn refresh_on_miss(&self, kid: Option<&str>) -> Result<(), AppError> {
        let mut last_refresh = self.last_refresh.lock().await;

        // A concurrent miss may have loaded the key while we waited.
        if self.cached_key(kid).await?.is_some() {
            return Ok(());
        }
        if let Some(at) = *last_refresh {
            if at.elapsed() < self.refresh_cooldown {
                tracing::debug!(kid = ?kid, "jwks refreshed recently, not refetching");
                return Ok(());
            }
        }

        tracing::info!(kid = ?kid, "unknown signing key, refreshing jwks");
        *last_refresh = Some(Instant::now());
        self.refresh().await
    }

    async fn refresh(&self) -> Result<(), AppError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|err| AppError::Unauthenticated(format!("jwks fetch failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Unauthenticated(format!(
                "jwks fetch failed: {}",
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|err| AppError::Unauthenticated(format!("invalid jwks document: {err}")))?;

        tracing::debug!(keys = set.keys.len(), "jwks refreshed");
        *self.keys.write().await = Some(set);
        Ok(())
    }
}

fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    token.strip_prefix("Bearer ").unwrap_or(token).trim()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match non_blank(raw) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|err| AppError::InvalidInput(format!("invalid date '{raw}': {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{strip_bearer, IdentityClaims, IdentityVerifier, UserType};
    use crate::error::AppError;
    use crate::models::rider::Gender;

    fn claims(value: serde_json::Value) -> IdentityClaims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn profile_requires_every_identity_field() {
        let full = claims(json!({
            "sub": "user_1",
            "firstName": "Asha",
            "lastName": "Rao",
            "phoneNumber": "+919800000001",
            "userType": "driver"
        }));
        let profile = full.require_profile().unwrap();
        assert_eq!(profile.external_id, "user_1");
        assert_eq!(profile.user_type, UserType::Driver);

        let missing_phone = claims(json!({
            "sub": "user_1",
            "firstName": "Asha",
            "lastName": "Rao",
            "phoneNumber": "  ",
            "userType": "driver"
        }));
        assert!(matches!(
            missing_phone.require_profile(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn metadata_and_unknown_claims_are_parsed() {
        let parsed = claims(json!({
            "sub": "user_1",
            "exp": 1_900_000_000,
            "public_metadata": {
                "dateOfBirth": "1994-03-12",
                "gender": "Female",
                "referralCode": "ASHA10"
            }
        }));

        let metadata = parsed.metadata();
        assert_eq!(
            metadata.date_of_birth().unwrap(),
            NaiveDate::from_ymd_opt(1994, 3, 12)
        );
        assert_eq!(metadata.gender().unwrap(), Some(Gender::Female));
        assert_eq!(metadata.referral_code.as_deref(), Some("ASHA10"));
        assert_eq!(parsed.extra["exp"], 1_900_000_000);
    }

    #[test]
    fn malformed_metadata_is_invalid_input() {
        let parsed = claims(json!({
            "public_metadata": { "dateOfBirth": "12/03/1994", "gender": "robot" }
        }));
        let metadata = parsed.metadata();
        assert!(matches!(metadata.date_of_birth(), Err(AppError::InvalidInput(_))));
        assert!(matches!(metadata.gender(), Err(AppError::InvalidInput(_))));
    }

    fn unsigned_token(kid: &str) -> String {
        let encode = |value: serde_json::Value| URL_SAFE_NO_PAD.encode(value.to_string());
        format!(
            "{}.{}.c2ln",
            encode(json!({ "alg": "RS256", "typ": "JWT", "kid": kid })),
            encode(json!({ "sub": "user_1" }))
        )
    }

    #[tokio::test]
    async fn unknown_key_ids_refetch_at_most_once_per_cooldown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .mount(&server)
            .await;

        let verifier = IdentityVerifier::new(
            format!("{}/jwks", server.uri()),
            Duration::from_secs(2),
            Duration::from_secs(60),
        )
        .unwrap();

        for kid in ["ghost-1", "ghost-2", "ghost-3"] {
            let err = verifier.verify(&unsigned_token(kid)).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthenticated(_)));
        }

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zero_cooldown_refetches_on_every_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .mount(&server)
            .await;

        let verifier = IdentityVerifier::new(
            format!("{}/jwks", server.uri()),
            Duration::from_secs(2),
            Duration::ZERO,
        )
        .unwrap();

        for kid in ["ghost-1", "ghost-2"] {
            assert!(verifier.verify(&unsigned_token(kid)).await.is_err());
        }

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(strip_bearer("  abc.def.ghi "), "abc.def.ghi");
    }
}
