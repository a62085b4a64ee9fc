//! Device header written above formatted logs.
//!
//! One `Label: value` line per fact. A fact whose source is missing is left
//! out, except `OS:` which always leads the header so the formatter can
//! recognise a log it already formatted.

use crate::command_exec::CommandRunner;
use crate::host::HostInfo;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const GITHUB_API: &str = "https://api.github.com";
const GITHUB_TIMEOUT_SECS: u64 = 10;
const HEADER_DATE: &str = "%m/%d/%Y";

const MODEL_PATHS: &[&str] = &[
    "/sys/firmware/devicetree/base/model",
    "/sys/firmware/devicetree/base/banner-name",
    "/tmp/sysinfo/model",
    "/sys/devices/virtual/dmi/id/product_name",
    "/sys/class/dmi/id/product_name",
];

/// Android marketing-name properties, most specific first
const ANDROID_PROPS: &[&str] = &[
    "ro.product.marketname",
    "ro.vendor.product.display",
    "ro.config.devicename",
    "ro.config.marketing_name",
    "ro.product.vendor.model",
    "ro.product.oppo_model",
    "ro.oppo.market.name",
    "ro.product.model",
    "ro.product.product.model",
    "ro.product.odm.model",
];

const TEGRA_CHIPS: &[(&str, &str)] = &[
    ("tegra20", "tegra-2"),
    ("tegra30", "tegra-3"),
    ("tegra114", "tegra-4"),
    ("tegra124", "tegra-k1-32"),
    ("tegra132", "tegra-k1-64"),
    ("tegra210", "tegra-x1"),
    ("tegra186", "tegra-x2"),
    ("tegra194", "xavier"),
    ("tegra234", "orin"),
    ("tegra239", "switch-2-chip"),
];

/// Chips old Tegra kernels report through soc0/family
const TEGRA_FAMILY_CHIPS: usize = 6;

const ROCKCHIP_IDS: &[&str] = &[
    "rk3399", "rk3308", "rk3326", "rk3328", "rk3368", "rk3566", "rk3568", "rk3588", "rk3588s",
];

const RISCV_IDS: &[&str] = &[
    "jh7100", "jh7110", "jh7120", "cv1800b", "cv1812h", "th1520", "k230", "sg2042", "u74",
    "fu740", "kyu",
];

const BROADCOM_IDS: &[&str] = &["bcm2712", "bcm2711", "bcm2837", "bcm2836", "bcm2835"];

/// Where the header facts come from
pub struct HeaderSources<'a> {
    pub host: &'a HostInfo,
    pub runner: &'a dyn CommandRunner,
    /// Pi-Apps checkout used for the update dates
    pub pi_apps_dir: Option<PathBuf>,
    /// Token for the GitHub commits API
    pub github_api_key: Option<String>,
    /// Whether to ask GitHub for the latest Pi-Apps version
    pub lookup_latest: bool,
    /// `$LANG`, else `$LC_ALL`
    pub language: Option<String>,
}

impl<'a> HeaderSources<'a> {
    /// Sources for the live host, language taken from the environment
    pub fn new(host: &'a HostInfo, runner: &'a dyn CommandRunner) -> Self {
        let language = std::env::var("LANG")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var("LC_ALL").ok().filter(|v| !v.is_empty()));
        Self {
            host,
            runner,
            pi_apps_dir: None,
            github_api_key: None,
            lookup_latest: true,
            language,
        }
    }
}

/// Device model and SoC identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceModel {
    pub model: String,
    pub soc: Option<String>,
}

/// Build the header text, one line per available fact
pub fn device_header(src: &HeaderSources) -> Result<String> {
    let host = src.host;
    anyhow::ensure!(
        host.root.is_dir(),
        "host root {} is not a directory",
        host.root.display()
    );

    let mut lines: Vec<String> = Vec::new();

    let os = if host.os.pretty_name.is_empty() {
        "Unknown"
    } else {
        host.os.pretty_name.as_str()
    };
    lines.push(format!("OS: {os}"));
    lines.push(format!(
        "OS architecture: {}-bit",
        host.long_bit.unwrap_or(usize::BITS)
    ));

    if let Some(dir) = src.pi_apps_dir.as_deref().filter(|d| d.is_dir()) {
        if let Some(date) = last_local_update(src.runner, dir) {
            lines.push(format!("Last updated Pi-Apps on: {date}"));
        }
        if src.lookup_latest {
            match latest_version(dir, src.github_api_key.as_deref()) {
                Ok(Some(date)) => lines.push(format!("Latest Pi-Apps version: {date}")),
                Ok(None) => {}
                Err(e) => debug!("latest Pi-Apps version unavailable: {:#}", e),
            }
        }
    }

    let machine = src.runner.stdout("uname", &["-m"]);
    let release = src.runner.stdout("uname", &["-r"]);
    if !machine.is_empty() && !release.is_empty() {
        lines.push(format!("Kernel: {machine} {release}"));
    }

    let device = device_model(host, src.runner);
    lines.push(format!("Device model: {}", device.model));
    if let Some(soc) = device.soc {
        lines.push(format!("SOC identifier: {soc}"));
    }

    if let Some(hash) = hashed_file(&host.path("/etc/machine-id")) {
        lines.push(format!("Machine-id (hashed): {hash}"));
    }
    if let Some(hash) = hashed_file(&host.path("/sys/firmware/devicetree/base/serial-number")) {
        lines.push(format!("Serial-number (hashed): {hash}"));
    }

    if let Some(cpu) = host.read("/proc/cpuinfo").and_then(|c| cpu_name(&c)) {
        lines.push(format!("CPU name: {cpu}"));
    }
    if let Some(gb) = host.read("/proc/meminfo").and_then(|m| ram_gb(&m)) {
        lines.push(format!("RAM size: {gb:.2} GB"));
    }
    if let Some(image) = host.read("/etc/rpi-issue").and_then(|i| rpi_image_version(&i)) {
        lines.push(format!("Raspberry Pi OS image version: {image}"));
    }
    if let Some(lang) = &src.language {
        lines.push(format!("Language: {lang}"));
    }

    lines.push(format!("Diagnosis engine: pidiag {}", env!("CARGO_PKG_VERSION")));

    let mut header = lines.join("\n");
    header.push('\n');
    Ok(header)
}

/// Date of the checkout's last commit, as MM/DD/YYYY
fn last_local_update(runner: &dyn CommandRunner, dir: &Path) -> Option<String> {
    let dir = dir.to_string_lossy();
    let out = runner.stdout(
        "git",
        &["-C", &dir, "show", "-s", "--format=%ad", "--date=short"],
    );
    let date = out.lines().next()?.trim();
    if date.is_empty() {
        return None;
    }
    Some(
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|d| d.format(HEADER_DATE).to_string())
            .unwrap_or_else(|_| date.to_string()),
    )
}

/// `(account, repo)` from the contents of `etc/git_url`
pub fn parse_git_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut parts = trimmed.rsplit('/');
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let account = parts.next().filter(|s| !s.is_empty() && !s.contains(':'))?;
    Some((account.to_string(), repo.to_string()))
}

#[derive(Deserialize)]
struct CommitResponse {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    author: CommitAuthor,
}

#[derive(Deserialize)]
struct CommitAuthor {
    date: String,
}

/// Date of the newest upstream commit, as MM/DD/YYYY
fn latest_version(dir: &Path, api_key: Option<&str>) -> Result<Option<String>> {
    let git_url = dir.join("etc/git_url");
    if !git_url.is_file() {
        return Ok(None);
    }
    let url = std::fs::read_to_string(&git_url)
        .with_context(|| format!("Failed to read {}", git_url.display()))?;
    let Some((account, repo)) = parse_git_url(&url) else {
        return Ok(None);
    };

    let endpoint = format!("{GITHUB_API}/repos/{account}/{repo}/commits/master");
    debug!("querying {}", endpoint);
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(GITHUB_TIMEOUT_SECS))
        .user_agent(concat!("pidiag/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let mut request = client.get(&endpoint);
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        request = request.header("Authorization", format!("token {key}"));
    }
    let response = request
        .send()
        .context("GitHub request failed")?
        .error_for_status()
        .context("GitHub returned an error status")?;
    let commit: CommitResponse = response.json().context("Failed to parse commit response")?;

    let date = DateTime::parse_from_rfc3339(&commit.commit.author.date)
        .context("Commit date is not RFC 3339")?;
    Ok(Some(date.format(HEADER_DATE).to_string()))
}

/// Model name and SoC id of the device
pub fn device_model(host: &HostInfo, runner: &dyn CommandRunner) -> DeviceModel {
    let mut model = MODEL_PATHS
        .iter()
        .filter_map(|p| host.read(p))
        .map(|raw| raw.replace('\0', "").trim().to_string())
        .find(|m| !m.is_empty());

    if model.is_none() && host.exists("/system/app/") && host.exists("/system/priv-app") {
        model = ANDROID_PROPS
            .iter()
            .map(|prop| runner.stdout("getprop", &[*prop]))
            .find(|v| !v.is_empty());
    }

    let mut soc = host
        .read("/proc/device-tree/compatible")
        .and_then(|c| soc_from_compatible(&c.replace('\0', "")));
    if soc.is_none() {
        soc = host
            .read("/sys/devices/soc0/family")
            .and_then(|f| soc_from_family(&f.replace('\0', "")));
    }

    if model.is_none() {
        let hostname = runner.stdout("hostname", &[]);
        let lower = hostname.to_lowercase();
        if lower.contains("raspberry") || lower.contains("rpi") {
            model = Some(hostname);
        }
    }

    DeviceModel {
        model: model.unwrap_or_else(|| "Unknown".to_string()),
        soc: soc.map(str::to_string),
    }
}

/// SoC id from a device-tree compatible string. Later tables override earlier ones.
pub fn soc_from_compatible(chip: &str) -> Option<&'static str> {
    let mut soc = TEGRA_CHIPS
        .iter()
        .find(|(key, _)| chip.contains(key))
        .map(|(_, id)| *id);
    if soc.is_none() && chip.contains("tegra") {
        soc = Some("jetson-unknown");
    }
    for table in [ROCKCHIP_IDS, RISCV_IDS] {
        if let Some(id) = first_contained(chip, table) {
            soc = Some(id);
        }
    }
    if chip.contains("g12b") {
        soc = Some("g12b");
    }
    if let Some(id) = first_contained(chip, BROADCOM_IDS) {
        soc = Some(id);
    }
    soc
}

fn soc_from_family(family: &str) -> Option<&'static str> {
    TEGRA_CHIPS[..TEGRA_FAMILY_CHIPS]
        .iter()
        .find(|(key, _)| family.contains(key))
        .map(|(_, id)| *id)
}

fn first_contained(chip: &str, ids: &[&'static str]) -> Option<&'static str> {
    ids.iter().copied().find(|id| chip.contains(id))
}

/// SHA-256 of a file's raw bytes, hex encoded
fn hashed_file(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!("could not read {}: {}", path.display(), e);
            None
        }
    }
}

fn cpu_name(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|l| l.starts_with("model name"))
        .and_then(|l| l.split_once(':'))
        .map(|(_, name)| name.trim().to_string())
}

/// MemTotal in GB, counting 1024000 kB per GB
fn ram_gb(meminfo: &str) -> Option<f64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal"))?;
    let kb: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1_024_000.0)
}

fn rpi_image_version(issue: &str) -> Option<String> {
    issue
        .lines()
        .find(|l| l.contains("Raspberry Pi reference"))
        .map(|l| l.trim_start_matches("Raspberry Pi reference ").trim().to_string())
}
