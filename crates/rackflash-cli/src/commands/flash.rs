//! Flash command - program a patched image into the unit

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rackflash_core::{FirmwareImage, Registry, Variant};
use rackflash_flash::{FlashConfig, FlashEvent, FlashPlan, Orchestrator};
use rackflash_kwp::{create_transport, Kwp2000Client, TransportConfig};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use crate::output::{OutputContext, SegmentRow};

/// Flash `input` into the unit on `bus`
pub async fn flash(
    variant: Variant,
    input: &Path,
    bus: u8,
    assume_yes: bool,
    flash_config: &FlashConfig,
    transport_config: &TransportConfig,
    ctx: &OutputContext,
) -> Result<()> {
    let profile = Registry::builtin().get(variant);

    ctx.info(&format!("Reading firmware from {}...", input.display()));
    let image = FirmwareImage::read(input)
        .with_context(|| format!("Failed to read firmware file: {}", input.display()))?;

    let plan = FlashPlan::new(profile, &image, bus)
        .with_context(|| format!("Cannot flash {} as variant {}", input.display(), variant))?;

    if ctx.interactive() {
        print_plan(&plan, ctx);
    }

    tracing::debug!(?transport_config, "Creating transport");
    if matches!(transport_config, TransportConfig::Mock(_)) {
        ctx.warn("Using the mock transport, no unit will be programmed");
    }
    let transport = create_transport(transport_config).context("Failed to create transport")?;
    let mut client = Kwp2000Client::new(transport);
    if let TransportConfig::SocketCan(cfg) = transport_config {
        client = client.with_timeout(Duration::from_millis(cfg.response_timeout_ms));
    }

    let pb = if ctx.interactive() {
        ProgressBar::new(plan.total_bytes as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let mut orchestrator = Orchestrator::new(client, flash_config.clone())
        .with_observer(progress_observer(&plan, pb.clone()));

    let result = orchestrator
        .run_confirmed(&plan, &image, |plan| assume_yes || confirm(plan))
        .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            pb.abandon_with_message("Flash failed!");
            return Err(e).context("Flash failed");
        }
    };

    pb.finish_with_message("Complete!");
    ctx.print_kv(&[
        ("Variant", variant.to_string()),
        ("Bus", bus.to_string()),
        ("Segments written", report.segments_written.to_string()),
        ("Bytes written", report.bytes_written.to_string()),
        ("Chunks sent", report.chunks_sent.to_string()),
        ("Reconnect attempts", report.reconnect_attempts.to_string()),
        ("ECU identification", report.ecu_identification.clone()),
        ("Flash status", report.flash_status.clone()),
    ]);
    ctx.success("\nFirmware update completed successfully");

    Ok(())
}

fn print_plan(plan: &FlashPlan, ctx: &OutputContext) {
    ctx.info(&format!(
        "Flashing variant {} on bus {}: {} segments, {} bytes",
        plan.variant,
        plan.bus,
        plan.segments.len(),
        plan.total_bytes
    ));
    let rows: Vec<SegmentRow> = plan
        .segments
        .iter()
        .enumerate()
        .map(|(index, s)| SegmentRow {
            index,
            start: format!("0x{:06X}", s.start),
            end: format!("0x{:06X}", s.end),
            len: s.len(),
        })
        .collect();
    ctx.print(&rows);
}

/// Ask on the terminal whether to go ahead
fn confirm(plan: &FlashPlan) -> bool {
    // stderr keeps stdout clean for --output json
    eprint!(
        "About to erase and rewrite {} bytes on bus {}, continue [y/n] ",
        plan.total_bytes, plan.bus
    );
    if io::stderr().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y"),
        Err(_) => false,
    }
}

/// Observer that moves the progress bar across all segments
fn progress_observer(
    plan: &FlashPlan,
    pb: ProgressBar,
) -> impl FnMut(&FlashEvent) + Send + 'static {
    // Bytes preceding each segment
    let offsets: Vec<u64> = plan
        .segments
        .iter()
        .scan(0u64, |acc, s| {
            let start = *acc;
            *acc += s.len() as u64;
            Some(start)
        })
        .collect();

    move |event: &FlashEvent| match event {
        FlashEvent::State(state) => pb.set_message(state.to_string()),
        FlashEvent::Reconnected { attempts } if *attempts > 1 => {
            pb.println(format!("Reconnected after {} attempts", attempts));
        }
        FlashEvent::Reconnected { .. } => {}
        FlashEvent::ChunkSent { segment, sent, .. } => {
            let base = offsets.get(*segment).copied().unwrap_or_default();
            pb.set_position(base + *sent as u64);
        }
    }
}
