pub mod extract;
pub mod info;
pub mod protect;
pub mod run;

pub use extract::*;
pub use info::*;
pub use protect::*;
pub use run::*;
