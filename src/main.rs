//! Headless AR try-on driver.
//!
//! Opens the configured camera, runs the detection loop and prints the shoe
//! placements. Console commands change view mode / size, simulate gestures
//! and capture stills. SIGUSR1 triggers a capture as well.
//!
//! Usage: tryon [config.toml]

use anyhow::Result;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ar_tryon::config::Config;
use ar_tryon::geometry::Point;
use ar_tryon::gesture::GestureEvent;
use ar_tryon::session::{ArSession, ArState, TickFrame};
use ar_tryon::tracker::ViewMode;
use ar_tryon::CalibrationData;

const DEFAULT_CONFIG_PATH: &str = "tryon.toml";
const LOG_DIR: &str = "logs";
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// 試着セッションの記録（標準エラーにも出す）
struct SessionLog {
    file: Mutex<std::io::BufWriter<std::fs::File>>,
}

impl SessionLog {
    fn open(dir: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let started = chrono::Local::now();
        let path = format!("{}/tryon_{}.log", dir, started.format("%Y%m%d_%H%M%S"));
        let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        writeln!(file, "# ar-tryon {} session {}", env!("BUILD_ID"), started.to_rfc3339())?;
        eprintln!("Session log: {}", path);
        Ok(Self { file: Mutex::new(file) })
    }

    fn line(&self, msg: &str) {
        eprintln!("{}", msg);
        if let Ok(mut f) = self.file.lock() {
            let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(f, "{} {}", stamp, msg);
            let _ = f.flush();
        }
    }
}

macro_rules! log {
    ($session_log:expr, $($arg:tt)*) => {
        $session_log.line(&format!($($arg)*))
    };
}

// ---------------------------------------------------------------------------
// Console commands
// ---------------------------------------------------------------------------

enum Command {
    Start,
    Stop,
    Skip,
    Calibrate(CalibrationData),
    View(Option<ViewMode>),
    Size(f32),
    Pinch(f32),
    Drag(f32, f32),
    Tap,
    Capture,
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&head) = parts.first() else {
        return Ok(None);
    };
    let num = |i: usize| -> Result<f32, String> {
        parts
            .get(i)
            .ok_or_else(|| format!("{}: missing argument", head))?
            .parse::<f32>()
            .map_err(|e| format!("{}: {}", head, e))
    };
    let cmd = match head {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "skip" => Command::Skip,
        "cal" => Command::Calibrate(CalibrationData::new(num(1)?, num(2)?, num(3)?)),
        "v" | "view" => match parts.get(1) {
            Some(mode) => Command::View(Some(mode.parse()?)),
            None => Command::View(None),
        },
        "size" => Command::Size(num(1)?),
        "pinch" => Command::Pinch(num(1)?),
        "drag" => Command::Drag(num(1)?, num(2)?),
        "tap" => Command::Tap,
        "c" | "capture" => Command::Capture,
        "s" | "status" => Command::Status,
        "q" | "quit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(cmd))
}

fn print_help() {
    println!("Commands:");
    println!("  start | stop            - AR session");
    println!("  cal <len> <width> <size> - calibrate (cm, cm, shoe size)");
    println!("  skip                    - skip calibration");
    println!("  v [default|side|top|walk] - view mode (no arg: next)");
    println!("  size <n>                - requested shoe size");
    println!("  pinch <scale> | drag <dx> <dy> | tap - gestures");
    println!("  c                       - capture still");
    println!("  s                       - status");
    println!("  q                       - quit");
    println!();
}

fn describe(frame: &TickFrame) -> String {
    if frame.transforms.is_empty() {
        return format!("tick {}: no feet", frame.tick);
    }
    let feet: Vec<String> = frame
        .transforms
        .iter()
        .map(|r| {
            let label = match r.side {
                Some(side) => format!("{:?}", side).to_lowercase(),
                None => "preview".to_string(),
            };
            format!(
                "{} ({:.1},{:.1}) x{:.2} {:.0}°",
                label, r.transform.x, r.transform.y, r.transform.scale, r.transform.rotation
            )
        })
        .collect();
    format!("tick {}: {}", frame.tick, feet.join(" | "))
}

async fn run_command(session: &ArSession, cmd: Command, session_log: &SessionLog) -> bool {
    match cmd {
        Command::Start => match session.start().await {
            Ok(ArState::Calibrating) => {
                log!(session_log, "No calibration stored: enter `cal <len> <width> <size>` or `skip`");
            }
            Ok(state) => log!(session_log, "Session {}", state),
            Err(e) => log!(session_log, "start failed: {}", e),
        },
        Command::Stop => {
            session.stop().await;
            log!(session_log, "Session stopped");
        }
        Command::Skip => match session.skip().await {
            Ok(state) => log!(session_log, "Calibration skipped, session {}", state),
            Err(e) => log!(session_log, "skip failed: {}", e),
        },
        Command::Calibrate(data) => match session.calibrate(data).await {
            Ok(state) => log!(
                session_log,
                "Calibrated: {:.1}x{:.1}cm size {} (session {})",
                data.foot_length,
                data.foot_width,
                data.shoe_size,
                state
            ),
            Err(e) => log!(session_log, "calibration rejected: {}", e),
        },
        Command::View(mode) => {
            let mode = mode.unwrap_or_else(|| session.view_mode().next());
            session.set_view_mode(mode);
            log!(session_log, "View mode: {}", mode);
        }
        Command::Size(size) => match session.set_requested_size(size) {
            Ok(()) => log!(session_log, "Requested size: {}", size),
            Err(e) => log!(session_log, "size rejected: {}", e),
        },
        Command::Pinch(scale) => {
            session.apply_gesture(&GestureEvent::Pinch { scale });
            log!(session_log, "Adjustment: x{:.2}", session.adjustment().scale_multiplier);
        }
        Command::Drag(dx, dy) => {
            session.apply_gesture(&GestureEvent::Drag {
                position: Point::ORIGIN,
                delta: Point::new(dx, dy),
            });
            let offset = session.adjustment().offset;
            log!(session_log, "Adjustment offset: ({:.1}, {:.1})%", offset.x, offset.y);
        }
        Command::Tap => {
            session.apply_gesture(&GestureEvent::Tap { position: Point::ORIGIN });
            log!(session_log, "Tap (adjustment {:?})", session.adjustment());
        }
        Command::Capture => capture(session, session_log).await,
        Command::Status => {
            log!(
                session_log,
                "[status] state={} view={} size={} {}",
                session.state(),
                session.view_mode(),
                session.requested_size(),
                describe(&session.snapshot())
            );
        }
        Command::Quit => return false,
    }
    true
}

async fn capture(session: &ArSession, session_log: &SessionLog) {
    match session.capture_to_file().await {
        Ok(path) => log!(session_log, "[capture] saved {}", path.display()),
        Err(e) => log!(session_log, "[capture] {}", e),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);
    let session_log = SessionLog::open(LOG_DIR)?;
    log!(session_log, "AR Try-On ({})", env!("BUILD_ID"));
    log!(
        session_log,
        "[config] camera={}x{}@{} facing={} tick={}ms size={} preview={}",
        config.camera.width,
        config.camera.height,
        config.camera.fps,
        config.camera.facing,
        config.detection.tick_ms,
        config.session.requested_size,
        config.overlay.preview_fallback
    );

    let session = ArSession::builder(config).build();

    // SIGUSR1 → capture
    let trigger_capture = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        let flag = Arc::clone(&trigger_capture);
        signal_hook::flag::register(signal_hook::consts::SIGUSR1, flag)?;
    }

    // Console input thread
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let _ = tx.send("q".to_string());
                    break;
                }
                Ok(_) => {
                    if tx.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    print_help();
    run_command(&session, Command::Start, &session_log).await;

    let mut frames = session.subscribe();
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    let mut last_printed = 0u64;

    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                match parse_command(&line) {
                    Ok(Some(cmd)) => {
                        if !run_command(&session, cmd, &session_log).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => log!(session_log, "{}", e),
                }
            }
            _ = status.tick() => {
                if trigger_capture.swap(false, Ordering::Relaxed) {
                    log!(session_log, "[signal] capture triggered");
                    capture(&session, &session_log).await;
                }
                let frame = frames.borrow_and_update().clone();
                if frame.tick != last_printed && session.state().is_live() {
                    last_printed = frame.tick;
                    log!(session_log, "{}", describe(&frame));
                }
            }
        }
    }

    session.stop().await;
    log!(session_log, "Bye");
    Ok(())
}
