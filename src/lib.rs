// lib.rs
// 工作区根包，转发调度器crate。
pub use scheduler;
