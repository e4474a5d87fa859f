//! Report print capability.
//!
//! A print order carries the URL of a server-rendered report page. Printing
//! means: verify the address answers over HTTP, load it in a headless
//! browser, wait for the page to flag itself ready, fire its embedded
//! `printScale()` script, wait for the secondary (iframe) ready flag, and
//! give the spooler a moment before tearing the browser down.
//!
//! The capability reports a numeric result code; the router maps codes to
//! protocol error categories:
//!
//! | code | meaning |
//! |------|---------|
//! | `1` | printed |
//! | `-1` | address unreachable / navigation failed |
//! | `< -100` | HTTP status failure (status = `-code`) |
//! | `-2` | page content never flagged ready |
//! | `-3` | iframe content never flagged ready |
//! | other `<= 0` | unknown failure |

// Rust guideline compliant 2026-02

use std::time::Duration;

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions};

use crate::config::Config;
use crate::constants::{PREFLIGHT_TIMEOUT, PRINT_POLL_INTERVAL, PRINT_SETTLE_DELAY};

/// Result code for a completed print.
pub const CODE_SUCCESS: i32 = 1;
/// Result code when the report address could not be reached or loaded.
pub const CODE_LINK_FAILED: i32 = -1;
/// Result code when the page never flagged `#complete`.
pub const CODE_PAGE_TIMEOUT: i32 = -2;
/// Result code when the page never flagged `#completeTwo`.
pub const CODE_IFRAME_TIMEOUT: i32 = -3;

/// Print capability consumed by the command router.
///
/// `submit` may block for tens of seconds while the report renders; the
/// router runs it on a blocking worker thread and processes no other
/// commands meanwhile.
pub trait PrintCapability: Send + Sync {
    /// Print the report at `address`, returning a result code per the
    /// module table.
    fn submit(&self, address: &str) -> i32;
}

/// [`PrintCapability`] backed by a headless Chrome instance.
///
/// Every submission launches a fresh browser, mirroring the one-shot driver
/// lifecycle the report pages expect; nothing is shared between jobs.
#[derive(Debug, Clone)]
pub struct ChromePrinter {
    page_load_timeout: Duration,
    poll_budget: u32,
}

impl ChromePrinter {
    /// Build a printer from the loaded configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            page_load_timeout: Duration::from_secs(config.page_load_timeout_secs),
            poll_budget: config.print_poll_budget,
        }
    }

    /// Startup check: launch and immediately quit a browser.
    ///
    /// # Errors
    ///
    /// Fails when Chrome is not installed or cannot start; the agent refuses
    /// to go online without a working renderer.
    pub fn check(&self) -> Result<()> {
        let browser = launch_browser().context(
            "browser check failed - is Chrome installed and reachable on this host?",
        )?;
        let tab = browser.new_tab().context("browser check: open tab")?;
        tab.set_default_timeout(self.page_load_timeout);
        // Dropping the browser closes it.
        Ok(())
    }

    fn run_job(&self, address: &str) -> i32 {
        if let Err(code) = preflight(address) {
            return code;
        }

        let browser = match launch_browser() {
            Ok(browser) => browser,
            Err(e) => {
                log::error!("[Print] Browser launch failed: {e:#}");
                return 0; // unknown failure
            }
        };
        let tab = match browser.new_tab() {
            Ok(tab) => tab,
            Err(e) => {
                log::error!("[Print] Tab open failed: {e:#}");
                return 0;
            }
        };
        tab.set_default_timeout(self.page_load_timeout);

        if let Err(e) = tab.navigate_to(address).and_then(|t| t.wait_until_navigated()) {
            log::error!("[Print] Navigation to report failed: {e:#}");
            return CODE_LINK_FAILED;
        }

        // The report page inserts #complete once its data query finishes.
        if !self.poll_ready(&tab, "complete") {
            log::warn!("[Print] 打印页面内容加载超时: {address}");
            return CODE_PAGE_TIMEOUT;
        }

        match tab.evaluate("printScale()", false) {
            Ok(result) => log::info!("[Print] printScale() -> {:?}", result.value),
            Err(e) => log::warn!("[Print] printScale() raised: {e:#}"),
        }

        // #completeTwo appears once the print iframe has rendered.
        if !self.poll_ready(&tab, "completeTwo") {
            log::warn!("[Print] 打印iframe内容加载超时: {address}");
            return CODE_IFRAME_TIMEOUT;
        }

        // Keep the page alive briefly for the spooler.
        std::thread::sleep(PRINT_SETTLE_DELAY);
        log::info!("[Print] 打印完成: {address}");
        CODE_SUCCESS
    }

    /// Poll until `document.getElementById(marker)` exists, up to the
    /// configured budget. Evaluation errors count as "not ready yet".
    fn poll_ready(&self, tab: &headless_chrome::Tab, marker: &str) -> bool {
        let script = format!("document.getElementById('{marker}')?false:true");
        let mut polls = 0u32;
        loop {
            let waiting = tab
                .evaluate(&script, false)
                .ok()
                .and_then(|r| r.value)
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            if !waiting {
                return true;
            }
            polls += 1;
            if polls > self.poll_budget {
                return false;
            }
            log::debug!("[Print] waiting for #{marker} ({polls}/{})", self.poll_budget);
            std::thread::sleep(PRINT_POLL_INTERVAL);
        }
    }
}

impl PrintCapability for ChromePrinter {
    fn submit(&self, address: &str) -> i32 {
        log::info!("[Print] 打印地址: {address}");
        let code = self.run_job(address);
        log::info!("[Print] job finished with code {code}");
        code
    }
}

fn launch_browser() -> Result<Browser> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .window_size(Some((1920, 1080)))
        .build()
        .map_err(|e| anyhow::anyhow!("build launch options: {e}"))?;
    Browser::new(options)
}

/// Pre-flight HTTP check of the report address.
///
/// # Errors
///
/// `Err(-1)` when the request cannot be made at all (DNS, refused, timeout),
/// `Err(-status)` when the server answers with anything but 200.
pub fn preflight(address: &str) -> std::result::Result<(), i32> {
    let client = reqwest::blocking::Client::builder()
        .timeout(PREFLIGHT_TIMEOUT)
        .danger_accept_invalid_certs(true) // facility report servers use self-signed certs
        .build()
        .map_err(|e| {
            log::error!("[Print] preflight client build failed: {e}");
            CODE_LINK_FAILED
        })?;

    let response = client.get(address).send().map_err(|e| {
        log::error!("[Print] 打印地址访问失败: {e}");
        CODE_LINK_FAILED
    })?;

    let status = response.status();
    if status.as_u16() != 200 {
        log::error!("[Print] 打印页面HTTP状态异常: {status}");
        return Err(-i32::from(status.as_u16()));
    }
    Ok(())
}
