use anyhow::{Context, Result};
use glam::vec2;
use ledchain::config::Config;
use ledchain::frame;
use ledchain::layout;
use ledchain::model::Color;
use ledchain::workspace::Workspace;
use log::{debug, info, warn};
use std::fs;
use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

/// Headless chain runner: load a layout, wire it up, then replay frames fed
/// as hex lines on stdin (one frame per line, header included) against the
/// global LED order. The WebSocket transport stays outside; anything that can
/// dump raw frames can drive this.
fn main() -> Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ledchain.json".to_string());
    let config = Config::load(Path::new(&config_path))?;
    info!(
        "config: layout {:?}, {} stream endpoint(s)",
        config.layout,
        config.endpoints.len()
    );
    for endpoint in &config.endpoints {
        debug!("stream endpoint: {} (handshake {})", endpoint, frame::subscribe_message());
    }

    let mut workspace = Workspace::new(vec2(10.0, 10.0));
    let layout_path = Path::new(&config.layout);
    if layout_path.exists() {
        let text = fs::read_to_string(layout_path)
            .with_context(|| format!("failed to read layout at {:?}", layout_path))?;
        let records = layout::from_json(&text)?;
        workspace.load_layout(&records)?;
    } else {
        warn!("layout {:?} not found, starting empty", layout_path);
    }

    // The document never carries power wiring. Hook the power source onto the
    // lowest-id bar's start handle so a replay lights something.
    let first_start = workspace.inventory().bars().next().map(|b| b.start);
    if let Some(first_start) = first_start {
        let power = workspace.power_handle();
        if workspace.connect(power, first_start)? {
            info!("power source wired to {}", first_start);
        }
    }
    workspace.on_topology_changed()?;
    info!("chain ready: {} LEDs in wire order", workspace.sequencer().len());

    let (tx, rx) = mpsc::channel::<Vec<Color>>();
    let reader = thread::spawn(move || read_frames(tx));

    let mut applied = 0u64;
    for colors in rx {
        workspace.apply_frame(&colors);
        applied += 1;
        if applied % 100 == 0 {
            info!("{} frames applied (last carried {} colors)", applied, colors.len());
        }
    }
    if reader.join().is_err() {
        warn!("frame reader thread panicked");
    }
    info!("stdin closed after {} frames", applied);
    Ok(())
}

/// Decode hex frame lines from stdin and hand them to the main loop. Bad
/// lines are logged and skipped; the stream owns its own malformed-frame
/// policy, this is just a replay harness.
fn read_frames(tx: mpsc::Sender<Vec<Color>>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let bytes = match hex::decode(trimmed) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("skipping non-hex frame line: {}", e);
                continue;
            }
        };
        match frame::decode(&bytes) {
            Ok(colors) => {
                debug!("frame decoded: {} colors", colors.len());
                if tx.send(colors).is_err() {
                    break;
                }
            }
            Err(e) => warn!("skipping malformed frame: {}", e),
        }
    }
}
