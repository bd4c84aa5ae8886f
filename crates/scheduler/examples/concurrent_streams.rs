use rand::Rng;
use scheduler::config::{SchedulerConfig, SchedulerPolicy};
use scheduler::scheduler::{EngineScheduler, RequestScheduler};
use scheduler::task::InferenceRequest;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// 多个客户端线程并发提交请求
fn run_clients(engine: Arc<EngineScheduler>, num_clients: usize) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut handles = Vec::new();
    for client_id in 0..num_clients {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || -> scheduler::error::Result<()> {
            let mut rng = rand::thread_rng();
            for round in 0..2 {
                let payload: Vec<u8> = (0..1024).map(|_| rng.gen()).collect();
                let request = InferenceRequest::new(payload, 4);
                let scheduler: &dyn RequestScheduler = engine.as_ref();
                let result = scheduler.execute(&request)?;
                println!(
                    "客户端 {} 第 {} 轮完成, 输出 {} 字节",
                    client_id,
                    round,
                    result.len()
                );
            }
            Ok(())
        }));
    }
    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("客户端线程异常退出"))??;
    }
    println!("总耗时: {:?}", start.elapsed());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    println!("=== 并发提交演示: 多流 vs 弹性 ===");

    println!("\n--- 多流调度: 2个投递箱, 4个客户端 ---");
    let config = SchedulerConfig {
        policy: SchedulerPolicy::MultiStream,
        num_cores: Some(4),
        num_streams: 2,
        ..Default::default()
    };
    run_clients(Arc::new(EngineScheduler::new(&config)?), 4)?;

    println!("\n--- 弹性调度: 2个NUMA节点, 4个客户端 ---");
    let config = SchedulerConfig {
        policy: SchedulerPolicy::Elastic,
        num_cores: Some(4),
        num_nodes: Some(2),
        ..Default::default()
    };
    run_clients(Arc::new(EngineScheduler::new(&config)?), 4)?;

    println!("\n=== 演示结束 ===");
    Ok(())
}
