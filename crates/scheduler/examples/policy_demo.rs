use rand::Rng;
use scheduler::config::{SchedulerConfig, SchedulerPolicy};
use scheduler::scheduler::EngineScheduler;
use scheduler::task::InferenceRequest;

/// 策略演示：同一批请求分别交给三种调度策略执行
fn main() -> anyhow::Result<()> {
    println!("=== 调度策略演示 ===");

    let mut rng = rand::thread_rng();
    let payload: Vec<u8> = (0..4096).map(|_| rng.gen()).collect();

    for policy in [
        SchedulerPolicy::SingleStream,
        SchedulerPolicy::MultiStream,
        SchedulerPolicy::Elastic,
    ] {
        println!("\n--- 策略: {} ---", policy.as_str());
        let config = SchedulerConfig {
            policy,
            num_cores: Some(4),
            num_streams: 2,
            num_nodes: if policy == SchedulerPolicy::Elastic { Some(2) } else { None },
            ..Default::default()
        };
        let engine = EngineScheduler::new(&config)?;
        for round in 0..3 {
            let request = InferenceRequest::new(payload.clone(), 4);
            let result = engine.execute(&request)?;
            println!(
                "第 {} 轮: 请求 {} 完成, 输出 {} 字节",
                round,
                request.request_id,
                result.len()
            );
        }
    }

    println!("\n=== 演示结束 ===");
    Ok(())
}
