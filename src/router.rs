//! Command routing.
//!
//! Maps each decoded [`Command`] to its handler: invoke a capability where
//! one is involved, build the reply frames, and tell the supervisor what to
//! do with the connection afterwards. The router never owns the session or
//! the socket - it mutates the session it is lent and hands reply strings
//! back for the supervisor to write.
//!
//! Handlers run to completion before the next inbound frame is processed;
//! the protocol assumes at most one in-flight command, so a print order
//! blocking for tens of seconds is expected, not a bug. Blocking capability
//! work runs on a worker thread but is awaited inline.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use crate::monitor::Telemetry;
use crate::print::{self, PrintCapability};
use crate::protocol::{reply, Command, InfoKind};
use crate::session::Session;

/// External capabilities the router dispatches into.
#[derive(Clone)]
pub struct Capabilities {
    /// Report print capability.
    pub printer: Arc<dyn PrintCapability>,
    /// Host telemetry capability.
    pub monitor: Arc<dyn Telemetry>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// What the supervisor should do with the connection after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep reading frames.
    Continue,
    /// Login was rejected: wait per backoff and force a reconnect.
    LoginRetry,
    /// Server banned this client: stop permanently.
    Banned,
}

/// Result of routing one command.
#[derive(Debug)]
pub struct Dispatch {
    /// Reply frames to write to the active connection, in order.
    pub replies: Vec<String>,
    /// Connection-level follow-up.
    pub directive: Directive,
}

impl Dispatch {
    fn replies(replies: Vec<String>) -> Self {
        Self {
            replies,
            directive: Directive::Continue,
        }
    }

    fn silent(directive: Directive) -> Self {
        Self {
            replies: Vec::new(),
            directive,
        }
    }
}

/// Route one decoded command.
pub async fn dispatch(cmd: Command, session: &mut Session, caps: &Capabilities) -> Dispatch {
    match cmd {
        Command::Ping(token) => Dispatch::replies(vec![reply::pong(&token)]),

        Command::PrintOrder { address, send_id } => {
            let printer = Arc::clone(&caps.printer);
            let job_address = address.clone();
            let code = tokio::task::spawn_blocking(move || printer.submit(&job_address))
                .await
                .unwrap_or_else(|e| {
                    log::error!("[Router] print worker panicked: {e}");
                    0
                });

            if code == print::CODE_SUCCESS {
                Dispatch::replies(vec![reply::print_success(send_id)])
            } else {
                let category = error_category(code);
                log::warn!("[Router] print of {address} failed: {category} (code {code})");
                Dispatch::replies(vec![reply::print_error(&category, send_id)])
            }
        }

        Command::Info(InfoKind::PcInfo) => {
            let info = caps.monitor.static_info();
            Dispatch::replies(vec![reply::info_pcinfo(&info)])
        }

        Command::Info(InfoKind::Report) => {
            let monitor = Arc::clone(&caps.monitor);
            let sample = tokio::task::spawn_blocking(move || monitor.sample())
                .await
                .unwrap_or_else(|e| {
                    log::error!("[Router] telemetry worker panicked: {e}");
                    serde_json::Value::Null
                });
            Dispatch::replies(vec![reply::info_report(&sample)])
        }

        Command::Info(InfoKind::Unknown) => {
            log::warn!("[Router] infoOrder with unrecognized kind, ignoring");
            Dispatch::silent(Directive::Continue)
        }

        Command::Ban(reason) => {
            log::error!("[Router] server banned this client: {reason}");
            session.record_ban();
            Dispatch::silent(Directive::Banned)
        }

        Command::LoginError(reason) => {
            session.login_retry_attempts += 1;
            log::warn!(
                "[Router] login rejected ({reason}), retry {} pending",
                session.login_retry_attempts
            );
            Dispatch::silent(Directive::LoginRetry)
        }

        Command::Unknown { flag } => {
            log::warn!("[Router] unrecognized command flag '{flag}', ignoring");
            Dispatch::silent(Directive::Continue)
        }
    }
}

/// Map a non-success print result code to its protocol error category.
///
/// Closed table; the HTTP and unknown categories embed the raw code so the
/// server operator can see the original status.
#[must_use]
pub fn error_category(code: i32) -> String {
    match code {
        print::CODE_LINK_FAILED => "打印地址访问失败".to_string(),
        print::CODE_PAGE_TIMEOUT => "打印页面内容加载超时".to_string(),
        print::CODE_IFRAME_TIMEOUT => "打印iframe内容加载超时".to_string(),
        c if c < -100 => format!("打印页面HTTP状态异常({})", -c),
        c => format!("打印未知错误({c})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::Frame;
    use crate::session::Identity;

    /// Print capability returning a fixed code.
    struct FixedPrinter(i32);

    impl PrintCapability for FixedPrinter {
        fn submit(&self, _address: &str) -> i32 {
            self.0
        }
    }

    /// Telemetry capability returning canned values.
    struct StubTelemetry;

    impl Telemetry for StubTelemetry {
        fn static_info(&self) -> serde_json::Value {
            serde_json::json!({ "system": "test-os" })
        }

        fn sample(&self) -> serde_json::Value {
            serde_json::json!({ "cpu": { "average": 1.0 } })
        }
    }

    fn caps(print_code: i32) -> Capabilities {
        Capabilities {
            printer: Arc::new(FixedPrinter(print_code)),
            monitor: Arc::new(StubTelemetry),
        }
    }

    fn session() -> Session {
        Session::new(Identity::from_config(&Config::default()))
    }

    fn decode(raw: &str) -> Command {
        Command::from_frame(&Frame::decode(raw).expect("valid frame"))
    }

    #[tokio::test]
    async fn test_ping_replies_with_pong() {
        let mut session = session();
        let out = dispatch(decode("ping#//abc"), &mut session, &caps(1)).await;
        assert_eq!(out.replies, vec!["return#//Pong_abc".to_string()]);
        assert_eq!(out.directive, Directive::Continue);
    }

    #[tokio::test]
    async fn test_print_order_success_reply() {
        let mut session = session();
        let out = dispatch(
            decode("printOrder#//https://ok&sendId=7"),
            &mut session,
            &caps(1),
        )
        .await;
        assert_eq!(out.replies, vec!["return#//PrintSuccess_7".to_string()]);
    }

    #[tokio::test]
    async fn test_print_order_timeout_reply() {
        let mut session = session();
        let out = dispatch(
            decode("printOrder#//https://ok&sendId=7"),
            &mut session,
            &caps(-2),
        )
        .await;
        assert_eq!(
            out.replies,
            vec!["return#//PrintError_打印页面内容加载超时:7".to_string()]
        );
    }

    #[tokio::test]
    async fn test_print_order_without_send_id_uses_zero() {
        let mut session = session();
        let out = dispatch(decode("printOrder#//https://ok"), &mut session, &caps(-1)).await;
        assert_eq!(
            out.replies,
            vec!["return#//PrintError_打印地址访问失败:0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_info_pcinfo_wraps_static_info() {
        let mut session = session();
        let out = dispatch(decode("infoOrder#//pcinfo"), &mut session, &caps(1)).await;
        assert_eq!(out.replies.len(), 1);
        let body = out.replies[0]
            .strip_prefix("return#//infoOrder_")
            .expect("infoOrder reply");
        let parsed: serde_json::Value = serde_json::from_str(body).expect("valid JSON");
        assert_eq!(parsed["pcinfo"]["system"], "test-os");
    }

    #[tokio::test]
    async fn test_info_report_wraps_sample() {
        let mut session = session();
        let out = dispatch(decode("infoOrder#//report"), &mut session, &caps(1)).await;
        let body = out.replies[0]
            .strip_prefix("return#//infoOrder_")
            .expect("infoOrder reply");
        let parsed: serde_json::Value = serde_json::from_str(body).expect("valid JSON");
        assert_eq!(parsed["report"]["cpu"]["average"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_info_kind_is_silent() {
        let mut session = session();
        let out = dispatch(decode("infoOrder#//gpu"), &mut session, &caps(1)).await;
        assert!(out.replies.is_empty());
        assert_eq!(out.directive, Directive::Continue);
    }

    #[tokio::test]
    async fn test_ban_sets_flag_and_sends_nothing() {
        let mut session = session();
        let out = dispatch(decode("fuckoff#//policy violation"), &mut session, &caps(1)).await;
        assert!(out.replies.is_empty());
        assert_eq!(out.directive, Directive::Banned);
        assert!(session.banned);
    }

    #[tokio::test]
    async fn test_login_error_increments_counter() {
        let mut session = session();
        let out = dispatch(
            decode("return#//loginError_duplicate session"),
            &mut session,
            &caps(1),
        )
        .await;
        assert!(out.replies.is_empty());
        assert_eq!(out.directive, Directive::LoginRetry);
        assert_eq!(session.login_retry_attempts, 1);

        let out = dispatch(
            decode("return#//loginError_duplicate session"),
            &mut session,
            &caps(1),
        )
        .await;
        assert_eq!(out.directive, Directive::LoginRetry);
        assert_eq!(session.login_retry_attempts, 2);
    }

    #[tokio::test]
    async fn test_unknown_flag_is_silent() {
        let mut session = session();
        let out = dispatch(decode("selfDestruct#//now"), &mut session, &caps(1)).await;
        assert!(out.replies.is_empty());
        assert_eq!(out.directive, Directive::Continue);
    }

    #[test]
    fn test_error_category_table() {
        assert_eq!(error_category(-1), "打印地址访问失败");
        assert_eq!(error_category(-2), "打印页面内容加载超时");
        assert_eq!(error_category(-3), "打印iframe内容加载超时");
        assert_eq!(error_category(-404), "打印页面HTTP状态异常(404)");
        assert_eq!(error_category(-500), "打印页面HTTP状态异常(500)");
        assert_eq!(error_category(0), "打印未知错误(0)");
        assert_eq!(error_category(-7), "打印未知错误(-7)");
    }
}
