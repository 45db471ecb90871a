use std::sync::Arc;

use crate::resolver::Resolver;

#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) resolver: Arc<Resolver>,
}
