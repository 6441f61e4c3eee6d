use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::error::{forbidden, internal, unauthenticated};
use crate::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub user_role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            user_role: role,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

/// Authenticated principal, passed explicitly to every operation that needs one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(forbidden(
                "You don't have permission to perform this action",
            ));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.user_role == UserRole::Admin,
            role: value.user_role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret).map_err(|_| internal("Invalid session signing key"))
}

pub fn generate_jwt_session(
    user: &User,
    secret: &[u8],
    lifetime: Duration,
) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role, lifetime);

    claims
        .sign_with_key(&key)
        .map_err(|_| internal("Failed to sign session"))
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| unauthenticated("Invalid session; Invalid token"))?;

    if session.is_expired() {
        return Err(unauthenticated("Invalid session; Token expired"));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn user(role: UserRole) -> User {
        User {
            id: 7,
            username: String::from("cook"),
            email: String::from("cook@example.com"),
            first_name: String::from("Julia"),
            last_name: String::from("Child"),
            password: String::new(),
            role,
        }
    }

    #[test]
    fn session_round_trip() {
        let Ok(token) = generate_jwt_session(&user(UserRole::Admin), SECRET, Duration::hours(1))
        else {
            panic!("token should be signed");
        };
        let Ok(session) = verify_jwt_session(&token, SECRET) else {
            panic!("token should verify");
        };

        let session: SessionData = session.into();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "cook");
        assert!(session.is_admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let Ok(token) = generate_jwt_session(&user(UserRole::User), SECRET, Duration::hours(1))
        else {
            panic!("token should be signed");
        };
        assert!(verify_jwt_session(&token, b"another-secret").is_err());
        assert!(verify_jwt_session("not.a.token", SECRET).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let Ok(token) =
            generate_jwt_session(&user(UserRole::User), SECRET, Duration::seconds(-60))
        else {
            panic!("token should be signed");
        };
        assert!(verify_jwt_session(&token, SECRET).is_err());
    }
}
