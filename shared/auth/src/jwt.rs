use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use afrilingua_common::{AppError, JwtConfig, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: UserRole, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours as i64);

        Self {
            sub: user_id,
            email,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Fails with 403 unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[UserRole]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "This action requires role: {}",
                roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(" or ")
            )))
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_ref()),
            decoding_key: DecodingKey::from_secret(config.secret.as_ref()),
            validation,
            config: config.clone(),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, role: UserRole) -> Result<(String, DateTime<Utc>), AppError> {
        let claims = Claims::new(user_id, email.to_string(), role, &self.config);
        let token = self.generate_token(&claims)?;
        Ok((token, claims.expires_at()))
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            expiration_hours: 1,
            issuer: "afrilingua".to_string(),
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let service = JwtService::new(&config("secret"));
        let user_id = Uuid::new_v4();
        let (token, expires_at) = service.issue(user_id, "ada@example.com", UserRole::Tutor).unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.role, UserRole::Tutor);
        assert!(expires_at > Utc::now());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::new(&config("one"));
        let verifier = JwtService::new(&config("two"));
        let (token, _) = issuer.issue(Uuid::new_v4(), "a@b.c", UserRole::Student).unwrap();

        assert!(matches!(verifier.validate_token(&token), Err(AppError::Authentication(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new(&config("secret"));
        let mut claims = Claims::new(Uuid::new_v4(), "a@b.c".into(), UserRole::Student, &config("secret"));
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = service.generate_token(&claims).unwrap();

        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn require_role_reports_forbidden() {
        let claims = Claims::new(Uuid::new_v4(), "a@b.c".into(), UserRole::Student, &config("s"));
        assert!(claims.require_role(&[UserRole::Student, UserRole::Admin]).is_ok());
        assert!(matches!(
            claims.require_role(&[UserRole::Tutor]),
            Err(AppError::Authorization(_))
        ));
    }
}
