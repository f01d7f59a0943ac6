use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::camera::{CameraProvider, StillSequenceCamera};
use crate::classroom::persist_attendance;
use crate::db::Database;
use crate::monitor::{
    AttendanceMonitor, CaptureConfig, InferenceBackend, MonitorReport, SessionController,
    ViolenceMonitor,
};
use crate::services::{LessonsClient, RecognitionClient, ViolenceClient};
use crate::settings::{Settings, SettingsStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const DEFAULT_SETTINGS_FILE: &str = "classsphere.settings.json";

#[derive(Parser, Debug)]
#[command(
    name = "classsphere",
    about = "Classroom attendance, safety monitoring and lesson lookups",
    version
)]
pub struct Cli {
    /// Settings file; created with defaults by `settings --write`.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recognise students from a frame source and print who was seen.
    Attendance {
        #[command(flatten)]
        monitor: MonitorArgs,
        /// Store a `present` record per recognised student.
        #[arg(long)]
        save: bool,
    },
    /// Stream frames to the violence detector and print the alerts raised.
    Violence {
        #[command(flatten)]
        monitor: MonitorArgs,
    },
    /// Fetch generated lecture material.
    Lesson {
        #[command(subcommand)]
        kind: LessonCommand,
    },
    /// Print the effective settings.
    Settings {
        /// Save the settings file, filling in defaults for missing fields.
        /// Environment overrides are not written.
        #[arg(long)]
        write: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    #[arg(long = "class")]
    pub class_id: String,
    /// Directory of JPEG/PNG stills replayed as the camera.
    #[arg(long)]
    pub frames: PathBuf,
    /// How long to monitor before stopping. Ctrl-C stops early.
    #[arg(long, default_value_t = 30)]
    pub seconds: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LessonCommand {
    Transcript { session_id: String },
    Summary { session_id: String },
    Quiz { session_id: String },
}

/// Loads the settings file. Returns the store holding file values and the
/// effective settings with `CLASSSPHERE_*` overrides applied.
pub fn load_settings(path: &Path) -> Result<(SettingsStore, Settings)> {
    let store = SettingsStore::new(path.to_path_buf())?;
    let mut settings = store.snapshot();
    settings.apply_env();
    Ok((store, settings))
}

pub async fn execute(cli: Cli, store: SettingsStore, settings: Settings) -> Result<()> {
    match cli.command {
        Command::Attendance { monitor, save } => {
            let client = RecognitionClient::new(
                settings.services.recognition_url.clone(),
                settings.services.request_timeout(),
            )?;
            let controller = AttendanceMonitor::attendance(
                client,
                still_camera(&monitor),
                CaptureConfig::from_settings(&settings.attendance, &settings.services),
            );
            let report = run_monitor(&controller, &monitor).await?;
            if save {
                let db = Database::new(settings.database_path.clone())?;
                let records = persist_attendance(&db, &report).await?;
                log_info!("Stored {} attendance records", records.len());
            }
            print_json(&report)
        }
        Command::Violence { monitor } => {
            let client = ViolenceClient::new(
                settings.services.violence_url.clone(),
                settings.services.request_timeout(),
            )?;
            let controller = ViolenceMonitor::violence(
                client,
                still_camera(&monitor),
                CaptureConfig::from_settings(&settings.violence, &settings.services),
            );
            let report = run_monitor(&controller, &monitor).await?;
            print_json(&report)
        }
        Command::Lesson { kind } => {
            let lessons = LessonsClient::new(
                settings.services.lessons_url.clone(),
                settings.services.request_timeout(),
            )?;
            match kind {
                LessonCommand::Transcript { session_id } => {
                    print_json(&lessons.transcript(&session_id).await?)
                }
                LessonCommand::Summary { session_id } => {
                    print_json(&lessons.summary(&session_id).await?)
                }
                LessonCommand::Quiz { session_id } => print_json(&lessons.quiz(&session_id).await?),
            }
        }
        Command::Settings { write } => {
            if write {
                store.update(store.snapshot())?;
                log_info!("Wrote settings to {}", store.path().display());
            }
            print_json(&settings)
        }
    }
}

fn still_camera(args: &MonitorArgs) -> Arc<dyn CameraProvider> {
    Arc::new(StillSequenceCamera::new(args.frames.clone()))
}

/// Starts a session, lets it run for the requested time (or until Ctrl-C)
/// and returns the final report.
async fn run_monitor<B: InferenceBackend>(
    controller: &SessionController<B>,
    args: &MonitorArgs,
) -> Result<MonitorReport<B>> {
    if controller.start(&args.class_id).await?.is_none() {
        bail!("a {} session is already running", controller.backend().name());
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                log_warn!("Ctrl-C handler failed: {err}");
            }
            log_info!("Interrupted, stopping session");
        }
    }

    let snapshot = controller.snapshot().await;
    log_info!(
        "{}: {} ({} frames processed)",
        controller.backend().name(),
        snapshot.status_message,
        snapshot.frames_processed
    );

    let report = controller
        .stop()
        .await
        .context("session ended before it could be stopped")?;
    if let Some(err) = &report.finalize_error {
        log_warn!("Session closed with an error: {err}");
    }
    Ok(report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monitor_and_lesson_commands() {
        let cli = Cli::try_parse_from([
            "classsphere",
            "attendance",
            "--class",
            "bio-101",
            "--frames",
            "/tmp/frames",
            "--save",
        ])
        .unwrap();
        match cli.command {
            Command::Attendance { monitor, save } => {
                assert_eq!(monitor.class_id, "bio-101");
                assert_eq!(monitor.seconds, 30);
                assert!(save);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.settings, PathBuf::from(DEFAULT_SETTINGS_FILE));

        let cli = Cli::try_parse_from(["classsphere", "lesson", "quiz", "s-42"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Lesson {
                kind: LessonCommand::Quiz { ref session_id }
            } if session_id == "s-42"
        ));
    }

    #[test]
    fn monitor_commands_require_a_class() {
        assert!(Cli::try_parse_from(["classsphere", "violence", "--frames", "/tmp"]).is_err());
    }

    #[tokio::test]
    async fn settings_command_writes_file_values_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"services": {"lessonsUrl": "http://lessons.local"}}"#).unwrap();
        let cli = Cli::try_parse_from([
            "classsphere",
            "settings",
            "--write",
            "--settings",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let (store, mut effective) = load_settings(&cli.settings).unwrap();
        effective.services.violence_url = "http://override.local".into();
        effective.debug = true;
        execute(cli, store, effective).await.unwrap();

        let written: Settings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.services.lessons_url, "http://lessons.local");
        assert_eq!(written.services.request_timeout_ms, 10_000);
        assert_eq!(written.services.violence_url, Settings::default().services.violence_url);
        assert!(!written.debug);
    }
}
