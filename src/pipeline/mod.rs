pub mod camouflage;
pub mod cipher;
pub mod compress;
pub mod fragment;
pub mod record;
pub mod stack;

pub use camouflage::*;
pub use compress::*;
pub use fragment::*;
pub use record::*;
pub use stack::*;
