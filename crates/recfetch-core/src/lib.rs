pub mod config;
pub mod logging;

pub mod control;
pub mod coordinator;
pub mod fetcher;
pub mod locator;
pub mod merger;
pub mod pipeline;
pub mod recording;
pub mod retry;
pub mod session;
pub mod storage;
pub mod task;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
