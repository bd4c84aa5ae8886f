// task.rs
// 推理请求与子任务的数据结构定义。
use crate::join::JoinState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 请求状态枚举，描述请求的生命周期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// 等待执行
    Pending,
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 执行失败，包含失败原因
    Failed(String),
}

/// 推理请求：不透明负载 + 声明的并行度
/// 由调用方创建，单次 execute 恰好消费一次，调度器不做重试
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// 请求唯一ID
    pub request_id: String,
    /// 输入数据（通常为序列化后的张量）
    pub input_data: Vec<u8>,
    /// 并行度：该请求最多能拆出的可并发子任务数
    pub parallel_degree: usize,
}

impl InferenceRequest {
    /// 创建新请求，自动分配UUID
    pub fn new(input_data: Vec<u8>, parallel_degree: usize) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            input_data,
            parallel_degree,
        }
    }
}

/// 子任务：绑定到单个请求的可独立执行分片
/// 在被工作线程领取之前由所在队列独占持有，领取后所有权转移给工作线程
pub struct SubTask {
    /// 子任务ID，形如 {request_id}_part_{index}
    pub task_id: String,
    /// 分片序号
    pub partition_index: usize,
    /// 该请求拆出的分片总数
    pub num_partitions: usize,
    /// 分片输入数据
    pub input_data: Vec<u8>,
    /// 指回所属请求汇合状态的引用
    pub join: Arc<JoinState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = InferenceRequest::new(vec![1, 2, 3], 2);
        let b = InferenceRequest::new(vec![1, 2, 3], 2);
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.parallel_degree, 2);
    }
}
