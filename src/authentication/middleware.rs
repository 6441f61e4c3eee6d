use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{error::unauthenticated, server::rejection::reject};

/// Token part of `Authorization: Token <jwt>` or `Authorization: Bearer <jwt>`.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }

    match scheme {
        s if s.eq_ignore_ascii_case("token") || s.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

fn session_from_header(header: Option<String>, secret: &[u8]) -> Option<SessionData> {
    let header = header?;
    let token = parse_authorization(&header)?;

    match verify_jwt_session(token, secret) {
        Ok(data) => Some(data.into()),
        Err(_) => {
            log::debug!("Ignoring invalid session token");
            None
        }
    }
}

pub fn with_session(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            session_from_header(header, &secret).ok_or_else(|| {
                reject(unauthenticated(
                    "Authentication credentials were not provided",
                ))
            })
        }
    })
}

pub fn with_possible_session(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .map(move |header: Option<String>| session_from_header(header, &secret))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    const SECRET: &[u8] = b"middleware-secret";

    fn token() -> String {
        let user = User {
            id: 3,
            username: String::from("baker"),
            email: String::from("baker@example.com"),
            first_name: String::from("Paul"),
            last_name: String::from("Hollywood"),
            password: String::new(),
            role: UserRole::User,
        };
        match generate_jwt_session(&user, SECRET, Duration::hours(1)) {
            Ok(token) => token,
            Err(_) => panic!("token should be signed"),
        }
    }

    #[test]
    fn authorization_schemes() {
        assert_eq!(parse_authorization("Token abc"), Some("abc"));
        assert_eq!(parse_authorization("Bearer abc"), Some("abc"));
        assert_eq!(parse_authorization("bearer   abc "), Some("abc"));
        assert_eq!(parse_authorization("Basic abc"), None);
        assert_eq!(parse_authorization("Token"), None);
    }

    #[tokio::test]
    async fn possible_session_is_optional() {
        let filter = with_possible_session(Arc::from(SECRET));

        let anonymous = warp::test::request().filter(&filter).await;
        assert!(matches!(anonymous, Ok(None)));

        let garbage = warp::test::request()
            .header("authorization", "Token garbage")
            .filter(&filter)
            .await;
        assert!(matches!(garbage, Ok(None)));

        let session = warp::test::request()
            .header("authorization", format!("Token {}", token()))
            .filter(&filter)
            .await;
        match session {
            Ok(Some(session)) => assert_eq!(session.user_id, 3),
            _ => panic!("session expected"),
        }
    }

    #[tokio::test]
    async fn required_session_rejects_anonymous() {
        let filter = with_session(Arc::from(SECRET));

        assert!(warp::test::request().filter(&filter).await.is_err());

        let session = warp::test::request()
            .header("authorization", format!("Bearer {}", token()))
            .filter(&filter)
            .await;
        assert!(matches!(session, Ok(SessionData { user_id: 3, .. })));
    }
}
