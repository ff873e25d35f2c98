use std::sync::Arc;

use crate::interactions::InteractionEngine;
use crate::router::TierRouter;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<TierRouter>,

    pub engine: Arc<InteractionEngine>,
}

impl AppState {
    pub fn new(router: Arc<TierRouter>, engine: Arc<InteractionEngine>) -> Self {
        Self { router, engine }
    }
}
