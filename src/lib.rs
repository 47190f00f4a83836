pub mod core {
    pub mod config;
    pub mod error;
    pub mod events;
    pub mod types;
}

pub mod blockchain {
    pub mod rpc_client;
    pub mod stream;
    pub mod transaction;
}

pub mod engine {
    pub mod classifier;
    pub mod dispatcher;
    pub mod pipeline;
    pub mod supervisor;
}

pub mod strategy {
    pub mod mint_filter;
    pub mod purchase;
    pub mod valuation;
}

pub mod utils {
    pub mod backoff;
    pub mod wallet;
}

pub mod logger;

pub use blockchain::{rpc_client, stream, transaction};
pub use core::{config, error, events, types};
pub use engine::{classifier, dispatcher, pipeline, supervisor};
pub use strategy::{mint_filter, purchase, valuation};
pub use utils::{backoff, wallet};
