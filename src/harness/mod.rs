mod factory;
mod poller;

pub use factory::*;
pub use poller::*;
