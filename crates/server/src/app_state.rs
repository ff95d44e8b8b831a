use server_api::ApiContext;

use crate::rate_limit::RateLimits;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) limits: RateLimits,
}
