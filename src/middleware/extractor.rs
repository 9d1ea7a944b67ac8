use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use serde::Serialize;

use crate::{error::AppError, models::UserRole};

pub const ENTERPRISE_HEADER: &str = "x-enterprise-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const DEPARTMENT_HEADER: &str = "x-department-id";

/// Caller identity asserted by the upstream gateway.
///
/// Credentials are verified before requests reach this service; handlers only
/// see the tenant headers the gateway forwards.
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub enterprise_id: i32,
    pub user_id: i32,
    pub role: UserRole,
    pub department_id: Option<i32>,
}

impl TenantContext {
    pub fn can_manage_enterprise(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Manager)
    }

    /// Fail with 403 unless the caller holds a managing role
    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.can_manage_enterprise() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let enterprise_id = required_id(headers, ENTERPRISE_HEADER)?;
        let user_id = required_id(headers, USER_HEADER)?;

        let role = match header_str(headers, ROLE_HEADER) {
            Some(raw) => raw
                .parse::<UserRole>()
                .map_err(|_| AppError::Unauthorized(format!("Unknown role '{}'", raw)))?,
            None => UserRole::User,
        };

        let department_id = match header_str(headers, DEPARTMENT_HEADER) {
            Some(raw) => Some(
                raw.parse::<i32>()
                    .map_err(|_| AppError::Unauthorized(format!("Invalid {} header", DEPARTMENT_HEADER)))?,
            ),
            None => None,
        };

        Ok(Self {
            enterprise_id,
            user_id,
            role,
            department_id,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_id(headers: &HeaderMap, name: &str) -> Result<i32, AppError> {
    let raw = header_str(headers, name)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))?;
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Unauthorized(format!("Invalid {} header", name)))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        TenantContext::from_headers(&parts.headers)
    }
}

/// Request metadata for audit logging
#[derive(Debug, Clone, Serialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = header_str(headers, "x-forwarded-for")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| header_str(headers, "x-real-ip").map(str::to_string));

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Self {
            ip_address,
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestMeta::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_tenant_from_full_headers() {
        let map = headers(&[
            (ENTERPRISE_HEADER, "7"),
            (USER_HEADER, "42"),
            (ROLE_HEADER, "manager"),
            (DEPARTMENT_HEADER, "3"),
        ]);
        let tenant = TenantContext::from_headers(&map).unwrap();
        assert_eq!(tenant.enterprise_id, 7);
        assert_eq!(tenant.user_id, 42);
        assert_eq!(tenant.role, UserRole::Manager);
        assert_eq!(tenant.department_id, Some(3));
        assert!(tenant.can_manage_enterprise());
    }

    #[test]
    fn test_tenant_role_defaults_to_user() {
        let map = headers(&[(ENTERPRISE_HEADER, "1"), (USER_HEADER, "2")]);
        let tenant = TenantContext::from_headers(&map).unwrap();
        assert_eq!(tenant.role, UserRole::User);
        assert!(!tenant.can_manage_enterprise());
        assert!(matches!(tenant.require_manager(), Err(AppError::Forbidden)));
    }

    #[test]
    fn test_tenant_missing_enterprise_rejected() {
        let map = headers(&[(USER_HEADER, "2")]);
        let err = TenantContext::from_headers(&map).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg.contains(ENTERPRISE_HEADER)));
    }

    #[test]
    fn test_tenant_non_numeric_user_rejected() {
        let map = headers(&[(ENTERPRISE_HEADER, "1"), (USER_HEADER, "abc")]);
        assert!(TenantContext::from_headers(&map).is_err());
    }

    #[test]
    fn test_tenant_zero_id_rejected() {
        let map = headers(&[(ENTERPRISE_HEADER, "0"), (USER_HEADER, "1")]);
        assert!(TenantContext::from_headers(&map).is_err());
    }

    #[test]
    fn test_tenant_unknown_role_rejected() {
        let map = headers(&[
            (ENTERPRISE_HEADER, "1"),
            (USER_HEADER, "1"),
            (ROLE_HEADER, "superuser"),
        ]);
        assert!(TenantContext::from_headers(&map).is_err());
    }

    #[test]
    fn test_request_meta_prefers_first_forwarded_ip() {
        let map = headers(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("x-real-ip", "192.168.1.1"),
        ]);
        let meta = RequestMeta::from_headers(&map);
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_request_meta_falls_back_to_real_ip() {
        let map = headers(&[("x-real-ip", "192.168.1.1")]);
        let meta = RequestMeta::from_headers(&map);
        assert_eq!(meta.ip_address.as_deref(), Some("192.168.1.1"));
        assert!(meta.user_agent.is_none());
    }
}
