use crate::errors::IdentityError;
use http::header::{AUTHORIZATION, COOKIE, HeaderName};
use http::HeaderMap;
use std::fmt;

/// Credentials of the caller on whose behalf a request is forwarded.
///
/// Holds the credential headers exactly as they arrived and is only ever copied onto the
/// outbound request. `Debug` prints header names, never values.
#[derive(Clone, Default)]
pub struct CallerIdentity {
    headers: HeaderMap,
}

impl CallerIdentity {
    pub fn from_headers(mut headers: HeaderMap) -> Self {
        for value in headers.values_mut() {
            value.set_sensitive(true);
        }
        CallerIdentity { headers }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_anonymous(&self) -> bool {
        self.headers.is_empty()
    }
}

impl fmt::Debug for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerIdentity")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Produces the identity of the caller behind an inbound request.
pub trait IdentityProvider: Send + Sync {
    fn current_caller(&self, headers: &HeaderMap) -> Result<CallerIdentity, IdentityError>;
}

const CREDENTIAL_HEADERS: [HeaderName; 2] = [AUTHORIZATION, COOKIE];

/// Takes the caller's credentials from the `Authorization` and `Cookie` headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderIdentityProvider;

impl IdentityProvider for HeaderIdentityProvider {
    fn current_caller(&self, headers: &HeaderMap) -> Result<CallerIdentity, IdentityError> {
        let mut credentials = HeaderMap::new();
        for name in &CREDENTIAL_HEADERS {
            for value in headers.get_all(name) {
                credentials.append(name.clone(), value.clone());
            }
        }

        if credentials.is_empty() {
            return Err(IdentityError::Unauthenticated);
        }
        Ok(CallerIdentity::from_headers(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderValue, USER_AGENT};

    #[test]
    fn test_copies_only_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.append(COOKIE, HeaderValue::from_static("CADC_SSO=one"));
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let identity = HeaderIdentityProvider.current_caller(&headers).unwrap();
        assert!(!identity.is_anonymous());
        assert_eq!(identity.headers().len(), 3);
        assert_eq!(identity.headers().get_all(COOKIE).iter().count(), 2);
        assert!(identity.headers().get(USER_AGENT).is_none());

        let debug = format!("{identity:?}");
        assert!(debug.contains("authorization"));
        assert!(!debug.contains("abc123"));
        assert!(!debug.contains("CADC_SSO"));
    }

    #[test]
    fn test_no_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));

        assert!(matches!(
            HeaderIdentityProvider.current_caller(&headers),
            Err(IdentityError::Unauthenticated)
        ));
    }
}
