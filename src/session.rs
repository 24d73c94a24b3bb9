use crate::domain::Principal;
use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried inside an issued token
#[derive(Serialize, Deserialize, Debug)]
struct Claims {
    /// The user's ID
    sub: String,
    iat: i64,
    exp: i64,
}

/// A token handed to a user after logging in
pub struct SessionToken {
    pub token: String,
    pub expires_in: Duration,
}

/// Signs and checks bearer tokens with a shared secret
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, lifetime: Duration) -> TokenKeys {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    pub fn issue(&self, principal: Principal) -> Result<SessionToken, anyhow::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("signing a session token")?;

        Ok(SessionToken {
            token,
            expires_in: self.lifetime,
        })
    }

    /// Returns the principal a token was issued to, or [None] if the token is malformed,
    /// expired or was signed with a different secret
    pub fn verify(&self, token: &str) -> Option<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let decoded = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).ok()?;
        let user_id = decoded.claims.sub.parse::<i32>().ok()?;

        Some(Principal { user_id })
    }
}
