use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

const DEBUG_MIN_INTERVAL_MS: u64 = 250;
const DEBUG_ENV: &str = "CLASSSPHERE_DEBUG";

fn is_enabled(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceEndpoints {
    pub recognition_url: String,
    pub violence_url: String,
    pub lessons_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            recognition_url: "http://127.0.0.1:5001".into(),
            violence_url: "http://127.0.0.1:5002".into(),
            lessons_url: "http://127.0.0.1:5003".into(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ServiceEndpoints {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Polling cadence and frame geometry for one monitor variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    pub interval_ms: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub jpeg_quality: u8,
    /// Skip a tick while the previous request is still in flight.
    pub skip_when_busy: bool,
}

impl CaptureSettings {
    pub fn attendance() -> Self {
        Self {
            interval_ms: 3_000,
            ..Self::default()
        }
    }

    pub fn violence() -> Self {
        Self {
            interval_ms: 1_000,
            ..Self::default()
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            frame_width: 640,
            frame_height: 480,
            jpeg_quality: 80,
            skip_when_busy: false,
        }
    }
}

fn default_attendance() -> CaptureSettings {
    CaptureSettings::attendance()
}

fn default_violence() -> CaptureSettings {
    CaptureSettings::violence()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub services: ServiceEndpoints,
    #[serde(default = "default_attendance")]
    pub attendance: CaptureSettings,
    #[serde(default = "default_violence")]
    pub violence: CaptureSettings,
    pub database_path: PathBuf,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            services: ServiceEndpoints::default(),
            attendance: CaptureSettings::attendance(),
            violence: CaptureSettings::violence(),
            database_path: PathBuf::from("classsphere.sqlite3"),
            debug: false,
        }
    }
}

impl Settings {
    /// Applies `CLASSSPHERE_*` environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("CLASSSPHERE_RECOGNITION_URL") {
            self.services.recognition_url = url;
        }
        if let Some(url) = lookup("CLASSSPHERE_VIOLENCE_URL") {
            self.services.violence_url = url;
        }
        if let Some(url) = lookup("CLASSSPHERE_LESSONS_URL") {
            self.services.lessons_url = url;
        }
        if let Some(path) = lookup("CLASSSPHERE_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }

        let debug_mode = lookup(DEBUG_ENV).map(|value| is_enabled(&value)).unwrap_or(false);
        if debug_mode && !self.debug {
            self.debug = true;
            for capture in [&mut self.attendance, &mut self.violence] {
                capture.interval_ms = (capture.interval_ms / 2).max(DEBUG_MIN_INTERVAL_MS);
            }
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings at {}: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
