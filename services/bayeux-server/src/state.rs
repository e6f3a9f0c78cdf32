use std::sync::Arc;

use bayeux_core::{Broker, BrokerOptions};

use crate::config::TransportOptions;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub transport: Arc<TransportOptions>,
}

impl AppState {
    pub fn new(broker_options: BrokerOptions, transport: TransportOptions) -> Self {
        Self {
            broker: Broker::new(broker_options),
            transport: Arc::new(transport),
        }
    }
}
