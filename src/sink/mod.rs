pub mod archive;
pub mod debug_dump;
pub mod writer;

pub use debug_dump::DebugDump;
pub use writer::SeriesWriter;
