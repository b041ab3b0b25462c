/// Basic usage example: replay a handling session, print property changes
use context_sensing::{AccelSample, ContextPipeline, EngineConfig, PropertyPublisher};

fn main() {
    println!("=== Context Sensing Engine: Basic Example ===\n");

    let config = EngineConfig::default();
    let mut pipeline = ContextPipeline::new(&config);
    let mut publisher = PropertyPublisher::new();
    let mut subscription = publisher.subscribe(&[]);

    // (duration s, x, y, z): picked up, turned sideways, put face down
    let session = [
        (3, 60, 960, 18),
        (3, 936, 162, 180),
        (70, -36, -90, 953),
        (2, -500, -100, -300),
        (70, 270, 216, -972),
    ];

    let mut t = 0u64;
    for (seconds, x, y, z) in session {
        for _ in 0..seconds {
            for change in pipeline.process_sample(&AccelSample::new(t, x, y, z)) {
                publisher.publish(change);
            }
            t += 1000;
        }
    }

    for change in subscription.drain() {
        println!("{:>7.1}s  {}", change.timestamp_ms as f64 / 1000.0, change);
    }

    println!("\nProcessed {} samples", pipeline.samples_processed());
    println!("Final state: {:?}", pipeline.snapshot());
}
