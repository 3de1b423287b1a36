use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{fs, io::Write, path::PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Meta {
    pub name: Option<String>,
}

/// Pixel extent of the interactive surface; throw slides stop at its
/// edges.
#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceSpec {
    pub width: f64,
    pub height: f64,
}

impl Default for SurfaceSpec {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

/// Tunable gesture thresholds. Defaults are the values the engine was
/// calibrated with; profiles override them per table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Contacts within this Euclidean distance of a seed join its
    /// cluster (px).
    pub cluster_radius: f64,
    /// Per-axis displacement over the history window before a contact
    /// counts as moved (px).
    pub move_threshold: f64,
    /// Per-axis displacement over the history window before a lift
    /// counts as a throw (px). Must exceed `move_threshold`.
    pub throw_threshold: f64,
    /// Contacts lifting within this many ms of touchdown queue a click.
    pub click_max_ms: u64,
    /// Minimum contact age before a drag claim is offered (ms).
    pub min_drag_ms: u64,
    /// Pairs whose nearest-neighbor edge is at least this wide never
    /// rotate (px).
    pub rotation_separation_max: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cluster_radius: 600.0,
            move_threshold: 6.0,
            throw_threshold: 120.0,
            click_max_ms: 200,
            min_drag_ms: 20,
            rotation_separation_max: 300,
        }
    }
}

fn default_min_size() -> f64 {
    150.0
}

fn default_max_size() -> f64 {
    500.0
}

/// One interactive rectangle registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_min_size")]
    pub min_size: f64,
    #[serde(default = "default_max_size")]
    pub max_size: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub surface: SurfaceSpec,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join("tablectl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = crate::input::discover_multitouch()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        serde_json::json!({
            "input_group_member": check_in_input_group(),
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "surface": {
                "width": self.profile.surface.width,
                "height": self.profile.surface.height,
            },
            "targets": self.profile.targets.len(),
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.cluster_radius <= 0.0 || th.move_threshold <= 0.0 || th.throw_threshold <= 0.0 {
        return Err(anyhow!("thresholds must be positive pixel distances"));
    }
    if th.throw_threshold <= th.move_threshold {
        return Err(anyhow!(
            "thresholds.throw_threshold ({}) must exceed move_threshold ({})",
            th.throw_threshold,
            th.move_threshold
        ));
    }
    if th.click_max_ms == 0 {
        return Err(anyhow!(
            "thresholds.click_max_ms must be a positive duration"
        ));
    }
    if p.surface.width <= 0.0 || p.surface.height <= 0.0 {
        return Err(anyhow!("surface dimensions must be positive"));
    }
    for (i, t) in p.targets.iter().enumerate() {
        if t.width <= 0.0 || t.height <= 0.0 {
            return Err(anyhow!("target {i} has non-positive dimensions"));
        }
        if t.min_size >= t.max_size {
            return Err(anyhow!(
                "target {i}: min_size ({}) must be below max_size ({})",
                t.min_size,
                t.max_size
            ));
        }
        if t.x + t.width > p.surface.width || t.y + t.height > p.surface.height {
            return Err(anyhow!("target {i} does not fit on the surface"));
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
