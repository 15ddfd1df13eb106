use std::time::Duration;

use dlp_e2e::prelude::*;

use crate::Args;

// 1. Start the fake DLP server and the proxy with the DLP filter.
// 2. Turn on debug logging through the admin endpoint.
// 3. Send `repeat` requests carrying an SSN through the proxy.
// 4. Expect each request and response body to reach InspectContent.
// 5. Expect the inspected counter to report both directions.

pub const PARENT: &str = "projects/test-project/locations/test-location";
pub const TEMPLATE: &str = "test-template";
pub const INSPECTED_STAT: &str = "envoy_dlp_stat_inspected";

pub fn body() -> String {
    "Hi, this is my SSN: 987-65-4321.".repeat(1000)
}

pub fn scenario(args: &Args, bootstrap: String) -> Scenario {
    let body = body();
    let captures = args.repeat * 2;
    let bootstrap_path = std::env::temp_dir().join(format!("test-dlp-{}.yaml", args.base_port));

    Scenario::new("inspect")
        .step(
            StartFakeDlp::new()
                .delay(args.delay())
                .queue_capacity(args.queue_capacity),
        )
        .step(PushConfig::to_file(bootstrap, &bootstrap_path))
        .step(
            StartProcess::new(&args.proxy_bin)
                .arg("-c")
                .arg(bootstrap_path.display().to_string())
                .args(args.proxy_args.iter().cloned())
                .ready_url("http://127.0.0.1:{{admin_port}}/ready"),
        )
        .step(HttpCall::post("/logging?grpc=trace").admin())
        .step(HttpCall::post("/logging?wasm=debug").admin())
        .step(Repeat::new(args.repeat, HttpCall::post("/echo").body(body.clone())))
        .step(
            CaptureVerify::new(
                CaptureMethod::InspectContent,
                captures,
                CaptureTemplate::new(body, PARENT, TEMPLATE),
            )
            .timeout(Duration::from_secs(1)),
        )
        .step(StatsVerify::new().expect(ExactStat::new(INSPECTED_STAT, captures as f64)))
}
