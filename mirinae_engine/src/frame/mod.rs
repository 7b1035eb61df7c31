/// Frame module - frames-in-flight bookkeeping
///
/// Every per-frame GPU resource is N-buffered and indexed by `FrameIndex`.

pub mod frame_index;
pub mod frame_sync;
pub mod flag_ship;
pub mod cmdbuf_list;
pub mod command_pool;

pub use frame_index::*;
pub use frame_sync::*;
pub use flag_ship::*;
pub use cmdbuf_list::*;
pub use command_pool::*;
