//! Per-request caller context
//!
//! The identity header is decoded once per request and paired with the
//! phase current at that moment; handlers then ask for the access they need.

use ajl_common::access::{route_access, AccessMode, GroupNumber, Phase, RouteId};
use ajl_common::identity::{Identity, IDENTITY_HEADER};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Option<Identity>,
    pub phase: Phase,
}

impl Caller {
    pub fn group(&self) -> Option<GroupNumber> {
        self.identity.as_ref().and_then(Identity::group_number)
    }

    pub fn access(&self, route: RouteId) -> AccessMode {
        route_access(self.phase, self.group(), route)
    }

    /// Reads are allowed for `full` and `readonly`
    pub fn require_view(&self, route: RouteId) -> ApiResult<AccessMode> {
        match self.access(route) {
            AccessMode::Denied => Err(ApiError::denied(route)),
            mode => Ok(mode),
        }
    }

    /// Writes need `full`
    pub fn require_write(&self, route: RouteId) -> ApiResult<()> {
        match self.access(route) {
            AccessMode::Full => Ok(()),
            AccessMode::ReadOnly => Err(ApiError::Forbidden(format!(
                "The {} module is read-only for your group in this phase.",
                route
            ))),
            AccessMode::Denied => Err(ApiError::denied(route)),
        }
    }

    pub fn identity(&self) -> ApiResult<&Identity> {
        self.identity.as_ref().ok_or_else(|| {
            ApiError::IdentityRequired("Register your name and group on the start page first.".to_string())
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = match parts.headers.get(IDENTITY_HEADER) {
            None => None,
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest("Identity header is not valid text".to_string()))?;
                Some(
                    Identity::from_header_value(raw)
                        .ok_or_else(|| ApiError::BadRequest("Identity header is malformed".to_string()))?,
                )
            }
        };

        Ok(Caller {
            identity,
            phase: state.phase_store.current(),
        })
    }
}
