use actix_web::HttpRequest;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 tokens carried in an http-only cookie.
#[derive(Clone)]
pub struct CookieJwt {
    secret: String,
    expiration_min: i64,
    cookie_name: String,
}

impl CookieJwt {
    pub fn new(secret: impl Into<String>, expiration_min: i64, cookie_name: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_min,
            cookie_name: cookie_name.into(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(&cfg.jwt_secret, cfg.jwt_expiration_min, &cfg.jwt_cookie_name)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn create_jwt(&self, subject: &str) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.expiration_min * 60,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn decode(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    pub fn verify_token(&self, token: &str) -> bool {
        self.decode(token).is_ok()
    }

    pub fn subject(&self, token: &str) -> Option<String> {
        self.decode(token).ok().map(|c| c.sub)
    }

    pub fn build_cookie(&self, subject: &str, secure: bool) -> anyhow::Result<Cookie<'static>> {
        let token = self.create_jwt(subject)?;
        Ok(Cookie::build(self.cookie_name.clone(), token)
            .path("/")
            .max_age(CookieDuration::minutes(self.expiration_min))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .finish())
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), "")
            .path("/")
            .max_age(CookieDuration::ZERO)
            .http_only(true)
            .finish()
    }

    pub fn token_from(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    fn jwt(expiration_min: i64) -> CookieJwt {
        CookieJwt::new("test-secret", expiration_min, "jwt")
    }

    #[test]
    fn token_round_trips_subject() {
        let jwt = jwt(60);
        let token = jwt.create_jwt("42").unwrap();
        assert!(jwt.verify_token(&token));
        assert_eq!(jwt.subject(&token).as_deref(), Some("42"));
    }

    #[test]
    fn rejects_expired_and_foreign_tokens() {
        let expired = jwt(-5).create_jwt("42").unwrap();
        assert!(!jwt(60).verify_token(&expired));

        let foreign = CookieJwt::new("other", 60, "jwt").create_jwt("42").unwrap();
        assert!(!jwt(60).verify_token(&foreign));
        assert!(!jwt(60).verify_token("not.a.token"));
    }

    #[test]
    fn cookies_carry_expected_attributes() {
        let jwt = jwt(30);
        let cookie = jwt.build_cookie("1", true).unwrap();
        assert_eq!(cookie.name(), "jwt");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::minutes(30)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));

        let removal = jwt.removal_cookie();
        assert_eq!(removal.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(removal.value(), "");
    }

    #[test]
    fn reads_token_from_cookie() {
        let jwt = jwt(30);
        let req = TestRequest::default()
            .cookie(Cookie::new("jwt", "abc"))
            .to_http_request();
        assert_eq!(jwt.token_from(&req).as_deref(), Some("abc"));
        assert_eq!(jwt.token_from(&TestRequest::default().to_http_request()), None);
    }
}
