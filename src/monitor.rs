//! Host telemetry capability.
//!
//! The dispatch server asks connected printers for two things: a static
//! description of the host (`pcinfo`) and a live resource sample (`report`).
//! Both are returned as JSON values the responder wraps into `infoOrder`
//! reply frames. The server only graphs coarse utilization.

// Rust guideline compliant 2026-02

use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use sysinfo::System;

use crate::config::Config;

/// Interval between the two CPU/network refreshes of one sample.
///
/// Must be at least `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` for the usage
/// numbers to be meaningful.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Telemetry capability consumed by the command router.
///
/// `sample` may block for a few hundred milliseconds while counters settle;
/// the router runs it on a blocking worker thread.
pub trait Telemetry: Send + Sync {
    /// Static host description, stable for the process lifetime.
    fn static_info(&self) -> Value;
    /// Live resource sample.
    fn sample(&self) -> Value;
}

/// [`Telemetry`] implementation backed by `sysinfo`.
pub struct HostMonitor {
    sys: Mutex<System>,
    static_info: Value,
}

impl std::fmt::Debug for HostMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMonitor").finish_non_exhaustive()
    }
}

impl HostMonitor {
    /// Gather the static host description once and keep it for the process
    /// lifetime. Printer/facility identifiers ride along so the server can
    /// attribute the host without a join.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();

        let host_name = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());

        let static_info = json!({
            "system": System::name(),
            "platform": System::long_os_version(),
            "kernel": System::kernel_version(),
            "architecture": std::env::consts::ARCH,
            "cpu_cores": sys.cpus().len(),
            "memory_total": sys.total_memory(),
            "hostname": host_name,
            "printer_id": config.printer_id,
            "facility_id": config.facility_id,
        });

        Self {
            sys: Mutex::new(sys),
            static_info,
        }
    }
}

impl Telemetry for HostMonitor {
    fn static_info(&self) -> Value {
        self.static_info.clone()
    }

    fn sample(&self) -> Value {
        let mut sys = match self.sys.lock() {
            Ok(sys) => sys,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Two refreshes bracket the interval so cpu usage and network deltas
        // have something to measure.
        sys.refresh_cpu_usage();
        let mut networks = sysinfo::Networks::new_with_refreshed_list();
        std::thread::sleep(SAMPLE_INTERVAL.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        networks.refresh();

        let per_core: Vec<f32> = sys.cpus().iter().map(sysinfo::Cpu::cpu_usage).collect();
        let interval_secs = SAMPLE_INTERVAL.as_secs_f64().max(0.001);
        let (mut sent, mut recv) = (0u64, 0u64);
        for (_name, data) in &networks {
            sent += data.transmitted();
            recv += data.received();
        }

        let disks = sysinfo::Disks::new_with_refreshed_list();
        let disk_used: Vec<Value> = disks
            .iter()
            .map(|disk| {
                json!({
                    "mount": disk.mount_point().to_string_lossy(),
                    "total": disk.total_space(),
                    "free": disk.available_space(),
                })
            })
            .collect();

        json!({
            "cpu": {
                "average": sys.global_cpu_usage(),
                "per": per_core,
            },
            "memory": {
                "virtual": {
                    "total": sys.total_memory(),
                    "used": sys.used_memory(),
                    "free": sys.available_memory(),
                },
                "swap": {
                    "total": sys.total_swap(),
                    "used": sys.used_swap(),
                },
            },
            "disk_used": disk_used,
            "net_io": {
                "sent_speed": sent as f64 / interval_secs,
                "recv_speed": recv as f64 / interval_secs,
            },
            "time": chrono::Utc::now().timestamp_millis(),
        })
    }
}
