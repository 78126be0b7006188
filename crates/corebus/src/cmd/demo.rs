use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use corebus_core::{fabric, ControlError, Controller, DpWorker, RxWorker, SimDpCore, SimRxCore};
use corebus_msg::{DpCore, EventId, StreamProgram, StreamSpec};
use serde_json::Value;

use crate::cmd::DemoArgs;
use crate::exit::{control_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_summary, CoreSummary, DemoSummary, OutputFormat};

struct ScenarioOutcome {
    event: EventId,
    queued_packets: usize,
    rx_features: Value,
    interrupted: bool,
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    if args.dp_cores == 0 {
        return Err(CliError::new(USAGE, "--dp-cores must be at least 1"));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (cp, dp, rx) = fabric(args.dp_cores, args.ring_capacity);

    let dp_workers: Vec<_> = dp
        .into_iter()
        .map(|side| {
            thread::spawn(move || {
                let core = SimDpCore::new(side.core, side.events);
                DpWorker::new(side.commands, core).run_with(SimDpCore::advance)
            })
        })
        .collect();

    let inject_port = args.port;
    let rx_worker = thread::spawn(move || {
        RxWorker::new(rx.commands, SimRxCore::new()).run_with(move |core| {
            core.inject(inject_port, Bytes::from_static(b"\x45\x00corebus-demo"))
        })
    });

    let mut controller = Controller::new(cp)
        .with_reply_budget(Duration::from_secs(1), Duration::from_millis(1));

    let started = Instant::now();
    let outcome = drive(&mut controller, &args, duration, &running);

    // Tear the fabric down even when the scenario failed midway.
    let _ = controller.quit_dp();
    let _ = controller.quit_rx();

    let mut dp_summaries = Vec::new();
    for worker in dp_workers {
        let core = worker
            .join()
            .map_err(|_| CliError::new(INTERNAL, "dp worker panicked"))?;
        dp_summaries.push(CoreSummary {
            core: core.id().0,
            starts: core.starts(),
            stops: core.stops(),
        });
    }
    rx_worker
        .join()
        .map_err(|_| CliError::new(INTERNAL, "rx worker panicked"))?;

    let outcome = outcome?;
    print_summary(
        &DemoSummary {
            schema_id: "https://schemas.corebus.dev/cli/v1/demo-summary.schema.json",
            elapsed_ms: started.elapsed().as_millis(),
            traffic_event: outcome.event.0,
            dp: dp_summaries,
            queued_packets: outcome.queued_packets,
            rx_features: outcome.rx_features,
            interrupted: outcome.interrupted,
        },
        format,
    );

    Ok(SUCCESS)
}

fn drive(
    controller: &mut Controller,
    args: &DemoArgs,
    duration: Duration,
    running: &AtomicBool,
) -> CliResult<ScenarioOutcome> {
    controller
        .enable_latency()
        .map_err(|err| control_error("enable latency", err))?;

    if !controller
        .start_queue(args.port, 64)
        .map_err(|err| control_error("start rx queue", err))?
    {
        return Err(CliError::new(FAILURE, "rx core refused the queue"));
    }

    let pcap_path = std::env::temp_dir().join(format!("corebus-demo-{}.pcap", std::process::id()));
    if !controller
        .start_capture(args.port, pcap_path, 1024)
        .map_err(|err| control_error("start rx capture", err))?
    {
        return Err(CliError::new(FAILURE, "rx core refused the capture"));
    }

    let program = Arc::new(StreamProgram::new(vec![StreamSpec {
        stream_id: 1,
        pps: args.pps,
        packet_len: 64,
    }]));
    let event = controller
        .start_traffic(args.port, program, Some(duration))
        .map_err(|err| control_error("start traffic", err))?;

    // Prove every core accepted the start before touching the traffic.
    for core in controller.dp_cores() {
        controller
            .barrier(core, args.port, Duration::from_secs(1))
            .map_err(|err| control_error("barrier", err))?;
    }

    controller
        .update_traffic(args.port, 2.0)
        .map_err(|err| control_error("update rate", err))?;

    let interrupted = wait_for_completion(controller, args, event, duration, running)?;

    // A guarded stop for a finished generation is a designed no-op; issue
    // it anyway so a straggler core still gets stopped.
    controller
        .stop_traffic_for_event(args.port, event)
        .map_err(|err| control_error("stop traffic", err))?;

    let batch = controller
        .queue_packets(args.port)
        .map_err(|err| control_error("fetch rx queue", err))?;
    let rx_features = controller
        .rx_features(args.port)
        .map_err(|err| control_error("fetch rx features", err))?;

    controller
        .stop_capture(args.port)
        .map_err(|err| control_error("stop rx capture", err))?;
    controller
        .stop_queue(args.port)
        .map_err(|err| control_error("stop rx queue", err))?;

    Ok(ScenarioOutcome {
        event,
        queued_packets: batch.len(),
        rx_features,
        interrupted,
    })
}

/// Wait in short slices so an interrupt can cut the scenario short.
fn wait_for_completion(
    controller: &mut Controller,
    args: &DemoArgs,
    event: EventId,
    duration: Duration,
    running: &AtomicBool,
) -> CliResult<bool> {
    let arrivals = args.dp_cores as u32;
    let budget = duration + Duration::from_secs(2);
    let started = Instant::now();

    loop {
        if !running.load(Ordering::SeqCst) {
            controller
                .stop_traffic(args.port)
                .map_err(|err| control_error("stop traffic", err))?;
            return Ok(true);
        }

        match controller.wait_event(args.port, event, arrivals, Duration::from_millis(50)) {
            Ok(_) => return Ok(false),
            Err(ControlError::EventTimeout { .. }) if started.elapsed() < budget => continue,
            Err(err) => return Err(control_error("wait for completion", err)),
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
