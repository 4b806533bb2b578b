//! # Rig Simulation
//!
//! Runs a simulated multi-camera rig and prints per-camera sync statistics.
//!
//! ## Usage
//!
//! ```bash
//! rig_simulation --config crates/framelock/config/rig.toml --frames 300 --skew-us 150
//! ```

use std::process::ExitCode;

use framelock::{CaptureRig, RigConfig};

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         FRAMELOCK RIG SIMULATION                                 ║");
    println!("║         SHARED BUFFERS + CROSS-CAMERA SYNC                       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut frames: Option<u32> = None;
    let mut skew_us: Option<i64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--frames" | "-f" => {
                if i + 1 < args.len() {
                    frames = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--skew-us" | "-s" => {
                if i + 1 < args.len() {
                    skew_us = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: rig_simulation [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>     Rig TOML file (default: built-in two-camera rig)");
                println!("  -f, --frames <NUM>      Frames per camera");
                println!("  -s, --skew-us <US>      Clock offset step between cameras");
                println!("  -h, --help              Show this help");
                return ExitCode::SUCCESS;
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = match config_path.as_deref() {
        Some(path) => match RigConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => RigConfig::default(),
    };
    if let Some(frames) = frames {
        config.frames = frames;
    }
    if let Some(skew_us) = skew_us {
        config.apply_skew(skew_us);
    }

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Cameras:            {}", config.cameras.len());
    println!("│ Frames:             {}", config.frames);
    println!("│ Frame Interval:     {} μs", config.frame_interval_us);
    println!("│ Pool Depth:         {}", config.pool_depth);
    println!("│ Tolerance:          {} μs", config.sync.default_tolerance_us);
    println!("│ Fail Handling:      {}", config.sync.default_fail_handling);
    match config.sync.barrier_timeout_ms {
        Some(ms) => println!("│ Barrier Timeout:    {ms} ms"),
        None => println!("│ Barrier Timeout:    infinite"),
    }
    for camera in &config.cameras {
        println!(
            "│ {:<6} offset {:>6} μs, linked to {:?}",
            camera.id.to_string(),
            camera.clock_offset_us,
            camera.linked
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let rig = match CaptureRig::new(config) {
        Ok(rig) => rig,
        Err(e) => {
            eprintln!("Invalid rig: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Running...");
    println!();

    let report = match rig.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Run failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("┌─ RESULTS ({:.1} ms) ──────────────────────────────────────────────", report.elapsed.as_secs_f64() * 1000.0);
    for stats in &report.cameras {
        println!(
            "│ {:<6} frames {:>5}  synced {:>5}  flagged {:>5}  dropped {:>5}  timeouts {:>3}  delivered {:>5}  error {:>3}",
            stats.camera.to_string(),
            stats.frames,
            stats.synced,
            stats.flagged,
            stats.dropped,
            stats.timeouts,
            stats.delivered,
            stats.errored
        );
    }
    println!("│");
    println!("│ Total Frames:       {}", report.total_frames());
    println!("│ Total Delivered:    {}", report.total_delivered());
    println!("└──────────────────────────────────────────────────────────────────┘");

    ExitCode::SUCCESS
}
