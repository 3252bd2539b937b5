// Domain layer: wire models, prompt builders, reply extraction and ports (interfaces).

pub mod extraction;
pub mod model;
pub mod ports;
pub mod prompts;
