// Interface adapters: wire formats and peer socket handling.

pub mod net;
pub mod protocol;
pub mod utils;
