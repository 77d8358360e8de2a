//! Controllers that add a cross-cutting concern to the controller they
//! wrap.

mod accounting;
mod key;
mod lock;

pub use accounting::AccountingController;
pub use key::{KeyController, KeyManager, KeyMode, KeyScope};
pub use lock::{LockController, Locked};
