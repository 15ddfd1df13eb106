//! Run the fake DLP server on its own and log what it captures.
//!
//! Useful when driving the proxy by hand.

use std::time::Duration;

use dlp_e2e::prelude::*;
use tokio::time::Instant;
use tracing::info;

use crate::Args;

const POLL: Duration = Duration::from_millis(250);

pub async fn run(args: &Args) -> E2eResult<()> {
    let mut fake = FakeDlp::builder()
        .port(args.dlp_port.unwrap_or(dlp_e2e::fake::DEFAULT_DLP_PORT))
        .delay(args.delay())
        .queue_capacity(args.queue_capacity)
        .start()
        .await?;
    info!(endpoint = %fake.endpoint(), "serving fake DLP, press ctrl-c to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(POLL) => {}
        }
        for method in CaptureMethod::ALL {
            let Some(queue) = fake.queue(method) else {
                continue;
            };
            while let Some(capture) = queue.recv_until(Instant::now()).await {
                info!(
                    method = %capture.method(),
                    parent = capture.parent(),
                    template = capture.template_name(),
                    bytes = capture.payload().len(),
                    "captured"
                );
            }
        }
    }

    fake.stop().await;
    Ok(())
}
