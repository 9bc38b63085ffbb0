//! Store traversal: node handles, the walker, and the hive sweep.

mod handle;
mod sweep;
mod walker;

pub use handle::NodeHandle;
pub use sweep::HiveSweep;
pub use walker::TreeWalker;
