// crates/resilience/examples/resilience_demo.rs
//! Demonstration of resilience patterns

use breakwater_resilience::decorators::{fallback, retryable};
use breakwater_resilience::{
    BulkheadConfig, BulkheadExecutor, CircuitBreaker, CircuitBreakerConfig, Fallback, RateLimitConfig,
    RateLimiter, ResilienceError, RetryConfig, RetryExecutor, TimeoutConfig, TimeoutExecutor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("Resilience Patterns Demo");
    println!("========================\n");

    demo_retry().await;
    println!();
    demo_circuit_breaker().await;
    println!();
    demo_rate_limiter().await;
    println!();
    demo_timeout().await;
    println!();
    demo_bulkhead().await;
    println!();
    demo_fallback().await;
}

async fn demo_retry() {
    println!("1. Retry Pattern");
    println!("----------------");

    let retry = RetryExecutor::new(
        RetryConfig::new(3)
            .with_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0),
    );
    let attempt = Arc::new(AtomicUsize::new(0));

    let result = retry
        .execute(|| {
            let attempt = attempt.clone();
            async move {
                let count = attempt.fetch_add(1, Ordering::SeqCst) + 1;
                println!("  Attempt {}", count);
                if count < 3 {
                    Err("Simulated failure")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    match result {
        Ok(value) => println!("✓ Success after retries: {}", value),
        Err(e) => println!("✗ Failed: {}", e),
    }
}

async fn demo_circuit_breaker() {
    println!("2. Circuit Breaker Pattern");
    println!("--------------------------");

    let config = CircuitBreakerConfig::new(3, Duration::from_millis(100)).with_success_threshold(1);
    let cb = CircuitBreaker::new("demo-service", config);

    for i in 1..=5 {
        let result = cb
            .execute(|| async move {
                if i <= 3 {
                    Err("Service unavailable")
                } else {
                    Ok(42)
                }
            })
            .await;

        match result {
            Ok(_) => println!("  Request {}: ✓ Success", i),
            Err(e) => println!("  Request {}: ✗ {}", i, e),
        }
    }

    println!("  Circuit state: {:?}", cb.state());

    tokio::time::sleep(Duration::from_millis(150)).await;
    println!("  Waited for timeout...");

    let result = cb.execute(|| async { Ok::<_, ResilienceError>(42) }).await;
    match result {
        Ok(_) => println!("  After timeout: ✓ Request succeeded"),
        Err(e) => println!("  After timeout: ✗ {}", e),
    }

    println!("  Circuit state: {:?}", cb.state());
}

async fn demo_rate_limiter() {
    println!("3. Rate Limiter Pattern");
    println!("-----------------------");

    let limiter = RateLimiter::new(RateLimitConfig::new(5, Duration::from_secs(1)));

    println!("  Limit: {} requests per {:?}", limiter.calls(), limiter.period());

    for i in 1..=7 {
        match limiter.acquire() {
            Ok(()) => println!("  Request {}: ✓ Allowed", i),
            Err(e) => println!("  Request {}: ✗ {} (retry in {:?})", i, e, limiter.retry_after()),
        }
    }
}

async fn demo_timeout() {
    println!("4. Timeout Pattern");
    println!("------------------");

    let timeout = TimeoutExecutor::new(TimeoutConfig::new(Duration::from_millis(50)));

    let result = timeout
        .execute("fast", || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, ResilienceError>(42)
        })
        .await;
    match result {
        Ok(value) => println!("  Fast operation: ✓ Completed: {}", value),
        Err(e) => println!("  Fast operation: ✗ {}", e),
    }

    let result = timeout
        .execute("slow", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ResilienceError>(42)
        })
        .await;
    match result {
        Ok(value) => println!("  Slow operation: ✓ Completed: {}", value),
        Err(e) => println!("  Slow operation: ✗ {}", e),
    }
}

async fn demo_bulkhead() {
    println!("5. Bulkhead Pattern");
    println!("-------------------");

    let bulkhead = BulkheadExecutor::new(BulkheadConfig::new(2));
    let mut handles = Vec::new();

    for i in 1..=3 {
        let bulkhead = bulkhead.clone();
        handles.push(tokio::spawn(async move {
            let result = bulkhead
                .execute(|| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, ResilienceError>(())
                })
                .await;
            (i, result)
        }));
    }

    for handle in handles {
        match handle.await {
            Ok((i, Ok(()))) => println!("  Task {}: ✓ Completed", i),
            Ok((i, Err(e))) => println!("  Task {}: ✗ {}", i, e),
            Err(e) => println!("  Task panicked: {}", e),
        }
    }
}

async fn demo_fallback() {
    println!("6. Fallback Pattern");
    println!("-------------------");

    let retry = RetryExecutor::new(RetryConfig::new(2).with_delay(Duration::from_millis(10)));
    let op = fallback(
        retryable(retry, || async { Err::<String, _>("primary unavailable") }),
        Fallback::with(|err| format!("default (after: {})", err)),
        [],
    );

    match op().await {
        Ok(value) => println!("  Result: {}", value),
        Err(e) => println!("  ✗ {}", e),
    }
}
