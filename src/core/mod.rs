pub mod autoschedule;
pub mod config;
pub mod extract;
pub mod lifecycle;
pub mod publish;
pub mod refresh;
pub mod store;
pub mod terminal;
pub mod worker;
