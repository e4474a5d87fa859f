//! Wire protocol for the dispatch server connection.
//!
//! The server speaks a line-oriented text protocol over WebSocket. Every
//! frame is `<flag>#//<payload>`: the flag names the command, the payload is
//! flag-specific free text. Replies travel the same way under the `return`
//! flag with an underscore-separated body.
//!
//! # Protocol
//!
//! | direction | frame |
//! |-----------|-------|
//! | in  | `ping#//<token>` |
//! | in  | `printOrder#//<report url>` (may embed `sendId=<digits>`) |
//! | in  | `infoOrder#//pcinfo` / `infoOrder#//report` |
//! | in  | `fuckoff#//<reason>` |
//! | in  | `return#//loginError_<reason>` |
//! | out | `login#//<display name>` |
//! | out | `return#//Pong_<token>` |
//! | out | `return#//PrintSuccess_<sendId>` |
//! | out | `return#//PrintError_<category>:<sendId>` |
//! | out | `return#//infoOrder_{"pcinfo":...}` / `return#//infoOrder_{"report":...}` |
//!
//! Frames without the `#//` delimiter are malformed and dropped by the
//! caller; decoding never fails fatally.

// Rust guideline compliant 2026-02

use std::fmt;

/// Substring separating the flag from the payload in every frame.
pub const DELIMITER: &str = "#//";

/// Raw inbound frame split into flag and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command identifier - the first delimiter-terminated segment.
    pub flag: String,
    /// Everything after the first delimiter, verbatim.
    pub payload: String,
}

/// Error for raw input that does not contain the frame delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedFrame;

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame is missing the {DELIMITER} delimiter")
    }
}

impl std::error::Error for MalformedFrame {}

impl Frame {
    /// Split `raw` at the first delimiter.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedFrame`] when the delimiter is absent. The caller
    /// logs and drops the input; no state changes.
    pub fn decode(raw: &str) -> Result<Self, MalformedFrame> {
        let (flag, payload) = raw.split_once(DELIMITER).ok_or(MalformedFrame)?;
        Ok(Self {
            flag: flag.to_string(),
            payload: payload.to_string(),
        })
    }
}

/// Payload variants of the `infoOrder` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    /// Static host information.
    PcInfo,
    /// Live telemetry sample.
    Report,
    /// Unrecognized info payload - logged and ignored.
    Unknown,
}

/// Decoded server command.
///
/// One variant per protocol flag; anything the decoder does not recognize
/// lands in [`Command::Unknown`] so the router can log and move on without
/// touching connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe carrying an opaque token to echo back.
    Ping(String),
    /// Print the report at `address`; `send_id` correlates the reply.
    PrintOrder {
        /// Report page URL, verbatim from the payload.
        address: String,
        /// Correlation id extracted from a `sendId=<digits>` token; 0 if absent.
        send_id: u64,
    },
    /// Host information request.
    Info(InfoKind),
    /// Server rejected our login frame (usually a duplicate-session race).
    LoginError(String),
    /// Server permanently banned this client; reconnection must stop.
    Ban(String),
    /// Flag present but unrecognized.
    Unknown {
        /// The unrecognized flag, for logging.
        flag: String,
    },
}

/// Prefix inside a `return`-flagged inbound frame that marks a login rejection.
const LOGIN_ERROR_PREFIX: &str = "loginError_";

impl Command {
    /// Decode a frame into a command.
    ///
    /// Decoding is total: unrecognized flags and payloads map to
    /// [`Command::Unknown`] / [`InfoKind::Unknown`] instead of errors.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Self {
        match frame.flag.as_str() {
            "ping" => Self::Ping(frame.payload.clone()),
            "printOrder" => Self::PrintOrder {
                address: frame.payload.clone(),
                send_id: extract_send_id(&frame.payload),
            },
            "infoOrder" => Self::Info(match frame.payload.as_str() {
                "pcinfo" => InfoKind::PcInfo,
                "report" => InfoKind::Report,
                _ => InfoKind::Unknown,
            }),
            "fuckoff" => Self::Ban(frame.payload.clone()),
            "return" => {
                if let Some(reason) = frame.payload.strip_prefix(LOGIN_ERROR_PREFIX) {
                    Self::LoginError(reason.to_string())
                } else {
                    Self::Unknown {
                        flag: frame.flag.clone(),
                    }
                }
            }
            _ => Self::Unknown {
                flag: frame.flag.clone(),
            },
        }
    }
}

/// Extract the numeric correlation id from a `sendId=<digits>` token.
///
/// Scans the raw payload for the first `sendId=` occurrence and takes the
/// digit run that follows. Absence (or an empty digit run) yields 0 - the
/// server treats 0 as "no correlation".
#[must_use]
pub fn extract_send_id(payload: &str) -> u64 {
    let Some(at) = payload.find("sendId=") else {
        return 0;
    };
    let digits: String = payload[at + "sendId=".len()..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Outbound reply templates.
///
/// Every reply is built by substituting values into a fixed template and is
/// written to the active connection by the supervisor. Write failures are
/// transport errors - handled by the supervisor, not here.
pub mod reply {
    use super::DELIMITER;

    /// Flag prefix shared by all replies.
    const RETURN: &str = "return";

    /// `login#//<display name>` - sent once per successful open.
    #[must_use]
    pub fn login(display_name: &str) -> String {
        format!("login{DELIMITER}{display_name}")
    }

    /// `return#//Pong_<token>`
    #[must_use]
    pub fn pong(token: &str) -> String {
        format!("{RETURN}{DELIMITER}Pong_{token}")
    }

    /// `return#//PrintSuccess_<sendId>`
    #[must_use]
    pub fn print_success(send_id: u64) -> String {
        format!("{RETURN}{DELIMITER}PrintSuccess_{send_id}")
    }

    /// `return#//PrintError_<category>:<sendId>`
    #[must_use]
    pub fn print_error(category: &str, send_id: u64) -> String {
        format!("{RETURN}{DELIMITER}PrintError_{category}:{send_id}")
    }

    /// `return#//infoOrder_{"pcinfo":<json>}`
    #[must_use]
    pub fn info_pcinfo(info: &serde_json::Value) -> String {
        format!(
            "{RETURN}{DELIMITER}infoOrder_{}",
            serde_json::json!({ "pcinfo": info })
        )
    }

    /// `return#//infoOrder_{"report":<json>}`
    #[must_use]
    pub fn info_report(sample: &serde_json::Value) -> String {
        format!(
            "{RETURN}{DELIMITER}infoOrder_{}",
            serde_json::json!({ "report": sample })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_without_delimiter_is_malformed() {
        assert_eq!(Frame::decode("ping"), Err(MalformedFrame));
        assert_eq!(Frame::decode(""), Err(MalformedFrame));
        assert_eq!(Frame::decode("ping#/abc"), Err(MalformedFrame));
    }

    #[test]
    fn test_decode_splits_at_first_delimiter() {
        let frame = Frame::decode("return#//loginError_duplicate#//x").expect("valid frame");
        assert_eq!(frame.flag, "return");
        assert_eq!(frame.payload, "loginError_duplicate#//x");
    }

    #[test]
    fn test_ping_command() {
        let frame = Frame::decode("ping#//abc").expect("valid frame");
        assert_eq!(Command::from_frame(&frame), Command::Ping("abc".to_string()));
    }

    #[test]
    fn test_print_order_with_send_id() {
        let frame = Frame::decode("printOrder#//http://x?sendId=42").expect("valid frame");
        assert_eq!(
            Command::from_frame(&frame),
            Command::PrintOrder {
                address: "http://x?sendId=42".to_string(),
                send_id: 42,
            }
        );
    }

    #[test]
    fn test_print_order_without_send_id_defaults_to_zero() {
        let frame = Frame::decode("printOrder#//http://x").expect("valid frame");
        assert_eq!(
            Command::from_frame(&frame),
            Command::PrintOrder {
                address: "http://x".to_string(),
                send_id: 0,
            }
        );
    }

    #[test]
    fn test_extract_send_id_mid_query_string() {
        assert_eq!(
            extract_send_id("https://x/rd_print.jsp?&itemId=309&sendId=2119&visNo=A368"),
            2119
        );
        assert_eq!(extract_send_id("sendId=7"), 7);
        assert_eq!(extract_send_id("sendId="), 0);
        assert_eq!(extract_send_id("sendid=7"), 0); // case-sensitive key
        assert_eq!(extract_send_id(""), 0);
    }

    #[test]
    fn test_info_order_kinds() {
        let pcinfo = Frame::decode("infoOrder#//pcinfo").expect("valid frame");
        assert_eq!(Command::from_frame(&pcinfo), Command::Info(InfoKind::PcInfo));

        let report = Frame::decode("infoOrder#//report").expect("valid frame");
        assert_eq!(Command::from_frame(&report), Command::Info(InfoKind::Report));

        let other = Frame::decode("infoOrder#//gpu").expect("valid frame");
        assert_eq!(Command::from_frame(&other), Command::Info(InfoKind::Unknown));
    }

    #[test]
    fn test_ban_command() {
        let frame = Frame::decode("fuckoff#//policy violation").expect("valid frame");
        assert_eq!(
            Command::from_frame(&frame),
            Command::Ban("policy violation".to_string())
        );
    }

    #[test]
    fn test_login_error_command() {
        let frame = Frame::decode("return#//loginError_already online").expect("valid frame");
        assert_eq!(
            Command::from_frame(&frame),
            Command::LoginError("already online".to_string())
        );
    }

    #[test]
    fn test_unrecognized_return_payload_is_unknown() {
        let frame = Frame::decode("return#//Pong_abc").expect("valid frame");
        assert_eq!(
            Command::from_frame(&frame),
            Command::Unknown {
                flag: "return".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_flag() {
        let frame = Frame::decode("selfDestruct#//now").expect("valid frame");
        assert_eq!(
            Command::from_frame(&frame),
            Command::Unknown {
                flag: "selfDestruct".to_string()
            }
        );
    }

    // Replies must decode back into the same flag/payload components they
    // were built from.

    #[test]
    fn test_pong_reply_round_trip() {
        let frame = Frame::decode(&reply::pong("abc")).expect("valid frame");
        assert_eq!(frame.flag, "return");
        assert_eq!(frame.payload, "Pong_abc");
    }

    #[test]
    fn test_print_success_reply_round_trip() {
        let frame = Frame::decode(&reply::print_success(7)).expect("valid frame");
        assert_eq!(frame.flag, "return");
        assert_eq!(frame.payload, "PrintSuccess_7");
    }

    #[test]
    fn test_print_error_reply_round_trip() {
        let frame = Frame::decode(&reply::print_error("打印页面内容加载超时", 7)).expect("valid frame");
        assert_eq!(frame.flag, "return");
        assert_eq!(frame.payload, "PrintError_打印页面内容加载超时:7");
    }

    #[test]
    fn test_info_reply_round_trip() {
        let sample = serde_json::json!({ "cpu": 12.5 });
        let frame = Frame::decode(&reply::info_report(&sample)).expect("valid frame");
        assert_eq!(frame.flag, "return");
        let body = frame.payload.strip_prefix("infoOrder_").expect("infoOrder prefix");
        let parsed: serde_json::Value = serde_json::from_str(body).expect("valid JSON body");
        assert_eq!(parsed["report"]["cpu"], 12.5);
    }

    #[test]
    fn test_login_frame_format() {
        assert_eq!(reply::login("193.QQ"), "login#//193.QQ");
    }
}
