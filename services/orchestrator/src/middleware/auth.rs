use crate::errors::ApiError;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, ResponseError,
};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;

/// Caller identity attached to authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
}

/// Verify a bearer token and return its claims
pub fn verify_token(header: Option<&str>, secret: &str) -> Result<Claims, ApiError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims::<&str>(&[]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|err| {
            tracing::warn!("JWT validation failed: {:?}", err);
            ApiError::Unauthorized
        })?;

    if data.claims.sub.trim().is_empty() {
        tracing::warn!("JWT rejected: empty subject");
        return Err(ApiError::Unauthorized);
    }

    Ok(data.claims)
}

pub struct JwtAuth {
    secret: Rc<str>,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Rc::from(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            secret: self.secret.clone(),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    secret: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok());

        match verify_token(header, &self.secret) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);

                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                let response = req.into_response(err.error_response()).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("ada@example.com".to_string()),
            username: Some("ada".to_string()),
            exp: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let header = format!("Bearer {}", token("user-1", SECRET));
        let claims = verify_token(Some(&header), SECRET).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username.as_deref(), Some("ada"));
    }

    #[test]
    fn test_rejections() {
        assert!(verify_token(None, SECRET).is_err());
        assert!(verify_token(Some("Basic abc"), SECRET).is_err());

        let wrong_key = format!("Bearer {}", token("user-1", "other"));
        assert!(verify_token(Some(&wrong_key), SECRET).is_err());

        let no_subject = format!("Bearer {}", token("", SECRET));
        assert!(verify_token(Some(&no_subject), SECRET).is_err());
    }
}
