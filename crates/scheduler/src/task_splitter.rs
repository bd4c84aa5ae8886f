// task_splitter.rs
// 任务拆分契约：把请求按目标并行度拆分为有序子任务序列并创建汇合状态，
// 所有调度策略共用同一个拆分器，不按策略重复实现。
use crate::error::Result;
use crate::join::JoinState;
use crate::task::{InferenceRequest, SubTask};
use std::sync::Arc;

/// 任务拆分器契约
/// split 返回有序子任务序列与共享的汇合状态，merge 为汇合后的聚合步骤
pub trait TaskSplitter: Send + Sync {
    /// 将请求拆分为 parallel_degree 个有序子任务
    fn split(
        &self,
        request: &InferenceRequest,
        parallel_degree: usize,
    ) -> Result<(Vec<SubTask>, Arc<JoinState>)>;

    /// 按分片序合并全部子任务输出为请求结果
    fn merge(&self, parts: Vec<Vec<u8>>) -> Result<Vec<u8>>;
}

/// 默认拆分器：按字节范围均匀拆分
/// 余数分摊到前面的分片，合并时按分片序拼接
pub struct EvenSplitter;

impl TaskSplitter for EvenSplitter {
    fn split(
        &self,
        request: &InferenceRequest,
        parallel_degree: usize,
    ) -> Result<(Vec<SubTask>, Arc<JoinState>)> {
        // 并行度至少为1，空请求也产生一个子任务和一次汇合
        let degree = parallel_degree.max(1);
        let data = &request.input_data;
        let base = data.len() / degree;
        let remainder = data.len() % degree;

        let join = Arc::new(JoinState::new(degree));
        let mut tasks = Vec::with_capacity(degree);
        let mut offset = 0;
        for index in 0..degree {
            let len = base + usize::from(index < remainder);
            let chunk = data[offset..offset + len].to_vec();
            offset += len;
            tasks.push(SubTask {
                task_id: format!("{}_part_{}", request.request_id, index),
                partition_index: index,
                num_partitions: degree,
                input_data: chunk,
                join: Arc::clone(&join),
            });
        }
        println!("请求 {} 拆分为 {} 个子任务", request.request_id, tasks.len());
        Ok((tasks, join))
    }

    fn merge(&self, parts: Vec<Vec<u8>>) -> Result<Vec<u8>> {
        Ok(parts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split_spreads_remainder() {
        let request = InferenceRequest::new((0u8..10).collect(), 4);
        let (tasks, _join) = EvenSplitter.split(&request, 4).unwrap();
        assert_eq!(tasks.len(), 4);
        // 10字节按4拆分：前两个分片各3字节，后两个各2字节
        let sizes: Vec<usize> = tasks.iter().map(|t| t.input_data.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.partition_index, i);
            assert_eq!(task.num_partitions, 4);
            assert_eq!(task.task_id, format!("{}_part_{}", request.request_id, i));
        }
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let merged = EvenSplitter
            .merge(vec![vec![1, 2], vec![3], vec![4, 5]])
            .unwrap();
        assert_eq!(merged, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_degree_clamped_to_one() {
        let request = InferenceRequest::new(vec![], 0);
        let (tasks, join) = EvenSplitter.split(&request, 0).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].input_data.is_empty());
        drop(tasks);
        assert!(!join.has_failed());
    }

    #[test]
    fn test_split_reassembles_to_input() {
        let request = InferenceRequest::new((0u8..23).collect(), 5);
        let (tasks, _join) = EvenSplitter.split(&request, 5).unwrap();
        let parts: Vec<Vec<u8>> = tasks.into_iter().map(|t| t.input_data).collect();
        let merged = EvenSplitter.merge(parts).unwrap();
        assert_eq!(merged, request.input_data);
    }
}
