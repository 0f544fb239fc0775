use std::sync::Arc;

use dsm_state::DeliberationService;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DeliberationService>,
    pub config: Arc<Config>,
}
