pub mod reference;
pub mod request;
pub mod step;
pub mod workflow;
