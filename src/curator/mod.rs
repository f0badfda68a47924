pub mod archive;
pub mod avid;
pub mod brand;
pub mod cooldown;
pub mod flatten;
pub mod fsops;
pub mod lock;
pub mod mapping;
pub mod merge;
pub mod monitor;
pub mod rename;
pub mod util;
