use std::io::IsTerminal;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct CoreSummary {
    pub core: u32,
    pub starts: u64,
    pub stops: u64,
}

#[derive(Serialize)]
pub struct DemoSummary {
    pub schema_id: &'static str,
    pub elapsed_ms: u128,
    pub traffic_event: u64,
    pub dp: Vec<CoreSummary>,
    pub queued_packets: usize,
    pub rx_features: Value,
    pub interrupted: bool,
}

pub fn print_summary(summary: &DemoSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!(
                "scenario finished in {} ms (traffic event {})",
                summary.elapsed_ms, summary.traffic_event
            );
            for core in &summary.dp {
                println!(
                    "  core-{}: {} starts, {} stops",
                    core.core, core.starts, core.stops
                );
            }
            println!("  rx: {} packets queued", summary.queued_packets);
            println!("  rx features: {}", summary.rx_features);
            if summary.interrupted {
                println!("  (interrupted before completion)");
            }
        }
    }
}
