// lib.rs
// 调度器模块入口，声明并导出各子模块。
pub mod config;
pub mod dropbox;
pub mod error;
pub mod join;
pub mod scheduler;
pub mod task;
pub mod task_executor;
pub mod task_splitter;
pub mod topology;
pub mod worker_pool;
