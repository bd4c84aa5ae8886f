// task_executor.rs
// 子任务内核执行契约与默认的模拟内核实现。
use crate::error::Result;
use crate::task::SubTask;
use std::thread;
use std::time::Duration;

/// 内核执行契约：在单个核心上执行一个子任务
/// 真实引擎在此调用编译后的数值内核，失败时返回错误而不是让工作线程崩溃
pub trait SubtaskKernel: Send + Sync {
    fn execute_subtask(&self, task: &SubTask) -> Result<Vec<u8>>;
}

/// 默认模拟内核：对分片字节做确定性变换，用于演示与测试
pub struct TaskExecutor {
    /// 每个子任务的模拟计算耗时（毫秒），0表示不休眠
    pub simulated_latency_ms: u64,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self { simulated_latency_ms: 0 }
    }

    pub fn with_latency(simulated_latency_ms: u64) -> Self {
        Self { simulated_latency_ms }
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtaskKernel for TaskExecutor {
    fn execute_subtask(&self, task: &SubTask) -> Result<Vec<u8>> {
        if self.simulated_latency_ms > 0 {
            thread::sleep(Duration::from_millis(self.simulated_latency_ms));
        }
        // 确定性变换：每个字节加一，便于在汇合后校验结果
        Ok(task.input_data.iter().map(|b| b.wrapping_add(1)).collect())
    }
}
