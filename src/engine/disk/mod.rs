mod disk_reader;
mod disk_service;
mod memory_cache;
mod stream_pool;

pub(crate) use disk_reader::*;
pub(crate) use disk_service::*;
pub(crate) use stream_pool::*;
