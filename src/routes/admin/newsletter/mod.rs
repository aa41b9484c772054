mod campaigns;
mod publish;

pub use campaigns::*;
pub use publish::*;
