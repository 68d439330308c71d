//! DAW web-remote wire protocol
//!
//! Requests are `GET {base}/_/{CMD};{CMD};...`. Responses are ASCII text,
//! one tab-separated record per line:
//!
//! ```text
//! TRANSPORT   playstate  position  repeat  pos_string  pos_beats
//! BEATPOS     playstate  position  full_beats  measure  beats_in_measure  ts_num  ts_denom
//! REGION_LIST
//! REGION      name  id  start  end  color
//! REGION_LIST_END
//! MARKER_LIST
//! MARKER      name  id  position  color
//! MARKER_LIST_END
//! EXTSTATE    section  key  value
//! ```
//!
//! Unknown record types are skipped so newer DAW versions stay compatible.

use crate::regions::{Marker, Region};
use rrc_common::events::PlayState;
use serde::Serialize;
use thiserror::Error;

/// DAW action: Transport: Play
pub const ACTION_PLAY: u32 = 1007;
/// DAW action: Transport: Pause
pub const ACTION_PAUSE: u32 = crate::markers::ACTION_PAUSE;
/// DAW action: Transport: Stop
pub const ACTION_STOP: u32 = crate::markers::ACTION_STOP;
/// DAW action: Transport: Play/stop
pub const ACTION_PLAY_STOP: u32 = 40044;

/// Wire protocol errors
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Malformed {record} record ({reason}): {line:?}")]
    MalformedRecord {
        record: &'static str,
        reason: String,
        line: String,
    },

    #[error("{0} not terminated")]
    UnterminatedList(&'static str),
}

/// One request command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Transport,
    BeatPosition,
    Regions,
    Markers,
    /// Seek (seconds)
    SetPosition(f64),
    /// Run a DAW action by command id
    Action(u32),
    GetExtState { section: String, key: String },
}

impl Command {
    /// Path segment for this command
    pub fn to_path(&self) -> String {
        match self {
            Command::Transport => "TRANSPORT".to_string(),
            Command::BeatPosition => "BEATPOS".to_string(),
            Command::Regions => "REGION".to_string(),
            Command::Markers => "MARKER".to_string(),
            Command::SetPosition(seconds) => format!("SET/POS/{:.6}", seconds.max(0.0)),
            Command::Action(id) => id.to_string(),
            Command::GetExtState { section, key } => {
                format!("GET/EXTSTATE/{}/{}", encode_segment(section), encode_segment(key))
            }
        }
    }
}

/// Join commands into the request path that follows `/_/`
pub fn request_path(commands: &[Command]) -> String {
    commands
        .iter()
        .map(Command::to_path)
        .collect::<Vec<_>>()
        .join(";")
}

/// Percent-encode characters that would break the command path
fn encode_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Undo the DAW's field escaping (`\t`, `\n`, `\\`)
pub fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// `TRANSPORT` record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportInfo {
    pub play_state: PlayState,
    /// Seconds
    pub position: f64,
    pub repeat: bool,
    /// DAW-formatted time string
    pub position_label: String,
    /// DAW-formatted measures.beats string
    pub beats_label: String,
}

/// `BEATPOS` record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatPosition {
    pub play_state: PlayState,
    pub position: f64,
    pub full_beat_position: f64,
    /// 0-based measure count
    pub measure: i64,
    pub beats_in_measure: f64,
    pub ts_numerator: u32,
    pub ts_denominator: u32,
}

/// `EXTSTATE` / `PROJEXTSTATE` record
#[derive(Debug, Clone, PartialEq)]
pub struct ExtStateValue {
    pub project: bool,
    pub section: String,
    pub key: String,
    pub value: String,
}

/// Everything one response carried
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub transport: Option<TransportInfo>,
    pub beat: Option<BeatPosition>,
    pub regions: Option<Vec<Region>>,
    pub markers: Option<Vec<Marker>>,
    pub ext_state: Vec<ExtStateValue>,
}

#[derive(Clone, Copy)]
enum ListState {
    None,
    Regions,
    Markers,
}

/// Parse a full response body
pub fn parse_response(body: &str) -> Result<Response, ProtocolError> {
    let mut response = Response::default();
    let mut list = ListState::None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();

        match fields[0] {
            "TRANSPORT" => response.transport = Some(parse_transport(&fields, line)?),
            "BEATPOS" => response.beat = Some(parse_beat(&fields, line)?),
            "REGION_LIST" => {
                list = ListState::Regions;
                response.regions = Some(Vec::new());
            }
            "REGION_LIST_END" => list = ListState::None,
            "REGION" => {
                let region = parse_region(&fields, line)?;
                if let (ListState::Regions, Some(regions)) = (list, response.regions.as_mut()) {
                    regions.push(region);
                }
            }
            "MARKER_LIST" => {
                list = ListState::Markers;
                response.markers = Some(Vec::new());
            }
            "MARKER_LIST_END" => list = ListState::None,
            "MARKER" => {
                let marker = parse_marker(&fields, line)?;
                if let (ListState::Markers, Some(markers)) = (list, response.markers.as_mut()) {
                    markers.push(marker);
                }
            }
            "EXTSTATE" | "PROJEXTSTATE" => {
                response.ext_state.push(parse_ext_state(&fields, line)?);
            }
            _ => {}
        }
    }

    match list {
        ListState::None => Ok(response),
        ListState::Regions => Err(ProtocolError::UnterminatedList("REGION_LIST")),
        ListState::Markers => Err(ProtocolError::UnterminatedList("MARKER_LIST")),
    }
}

fn malformed(record: &'static str, reason: impl Into<String>, line: &str) -> ProtocolError {
    ProtocolError::MalformedRecord {
        record,
        reason: reason.into(),
        line: line.to_string(),
    }
}

fn require_fields(
    fields: &[&str],
    count: usize,
    record: &'static str,
    line: &str,
) -> Result<(), ProtocolError> {
    if fields.len() < count {
        return Err(malformed(
            record,
            format!("expected {} fields, got {}", count, fields.len()),
            line,
        ));
    }
    Ok(())
}

fn number<T: std::str::FromStr>(
    field: &str,
    what: &str,
    record: &'static str,
    line: &str,
) -> Result<T, ProtocolError> {
    field
        .trim()
        .parse::<T>()
        .map_err(|_| malformed(record, format!("bad {} '{}'", what, field), line))
}

fn seconds(field: &str, what: &str, record: &'static str, line: &str) -> Result<f64, ProtocolError> {
    let value: f64 = number(field, what, record, line)?;
    if !value.is_finite() {
        return Err(malformed(record, format!("non-finite {}", what), line));
    }
    Ok(value)
}

fn play_state(field: &str, record: &'static str, line: &str) -> Result<PlayState, ProtocolError> {
    let code: u8 = number(field, "playstate", record, line)?;
    PlayState::from_code(code).ok_or_else(|| malformed(record, format!("unknown playstate {}", code), line))
}

fn parse_transport(fields: &[&str], line: &str) -> Result<TransportInfo, ProtocolError> {
    const RECORD: &str = "TRANSPORT";
    require_fields(fields, 3, RECORD, line)?;
    let repeat: u8 = match fields.get(3) {
        Some(f) => number(f, "repeat flag", RECORD, line)?,
        None => 0,
    };
    Ok(TransportInfo {
        play_state: play_state(fields[1], RECORD, line)?,
        position: seconds(fields[2], "position", RECORD, line)?,
        repeat: repeat != 0,
        position_label: fields.get(4).map(|s| unescape_field(s)).unwrap_or_default(),
        beats_label: fields.get(5).map(|s| unescape_field(s)).unwrap_or_default(),
    })
}

fn parse_beat(fields: &[&str], line: &str) -> Result<BeatPosition, ProtocolError> {
    const RECORD: &str = "BEATPOS";
    require_fields(fields, 8, RECORD, line)?;
    Ok(BeatPosition {
        play_state: play_state(fields[1], RECORD, line)?,
        position: seconds(fields[2], "position", RECORD, line)?,
        full_beat_position: seconds(fields[3], "beat position", RECORD, line)?,
        measure: number(fields[4], "measure", RECORD, line)?,
        beats_in_measure: seconds(fields[5], "beats in measure", RECORD, line)?,
        ts_numerator: number(fields[6], "time signature numerator", RECORD, line)?,
        ts_denominator: number(fields[7], "time signature denominator", RECORD, line)?,
    })
}

fn parse_region(fields: &[&str], line: &str) -> Result<Region, ProtocolError> {
    const RECORD: &str = "REGION";
    require_fields(fields, 5, RECORD, line)?;
    Ok(Region {
        name: unescape_field(fields[1]),
        id: number(fields[2], "id", RECORD, line)?,
        start: seconds(fields[3], "start", RECORD, line)?,
        end: seconds(fields[4], "end", RECORD, line)?,
        color: match fields.get(5) {
            Some(f) => number(f, "color", RECORD, line)?,
            None => 0,
        },
    })
}

fn parse_marker(fields: &[&str], line: &str) -> Result<Marker, ProtocolError> {
    const RECORD: &str = "MARKER";
    require_fields(fields, 4, RECORD, line)?;
    Ok(Marker {
        name: unescape_field(fields[1]),
        id: number(fields[2], "id", RECORD, line)?,
        position: seconds(fields[3], "position", RECORD, line)?,
        color: match fields.get(4) {
            Some(f) => number(f, "color", RECORD, line)?,
            None => 0,
        },
    })
}

fn parse_ext_state(fields: &[&str], line: &str) -> Result<ExtStateValue, ProtocolError> {
    let record: &'static str = if fields[0] == "PROJEXTSTATE" {
        "PROJEXTSTATE"
    } else {
        "EXTSTATE"
    };
    require_fields(fields, 3, record, line)?;
    Ok(ExtStateValue {
        project: record == "PROJEXTSTATE",
        section: unescape_field(fields[1]),
        key: unescape_field(fields[2]),
        value: fields.get(3).map(|s| unescape_field(s)).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RESPONSE: &str = "TRANSPORT\t1\t42.500000\t0\t0:42.500\t22.1.00\n\
BEATPOS\t1\t42.500000\t85.000\t21\t1.000\t4\t4\n\
REGION_LIST\n\
REGION\tIntro\t1\t0.000000\t30.000000\t0\n\
REGION\tSong\\tA\t2\t30.000000\t120.000000\t16777471\n\
REGION_LIST_END\n\
MARKER_LIST\n\
MARKER\t!1008\t1\t110.000000\t0\n\
MARKER_LIST_END\n";

    #[test]
    fn test_request_path_joins_commands() {
        let path = request_path(&[
            Command::Transport,
            Command::BeatPosition,
            Command::Regions,
            Command::Markers,
        ]);
        assert_eq!(path, "TRANSPORT;BEATPOS;REGION;MARKER");
    }

    #[test]
    fn test_set_position_and_action_paths() {
        assert_eq!(Command::SetPosition(12.5).to_path(), "SET/POS/12.500000");
        assert_eq!(Command::SetPosition(-3.0).to_path(), "SET/POS/0.000000");
        assert_eq!(Command::Action(ACTION_PLAY).to_path(), "1007");
    }

    #[test]
    fn test_ext_state_path_is_encoded() {
        let cmd = Command::GetExtState {
            section: "rrc".to_string(),
            key: "set list".to_string(),
        };
        assert_eq!(cmd.to_path(), "GET/EXTSTATE/rrc/set%20list");
    }

    #[test]
    fn test_parse_full_response() {
        let response = parse_response(FULL_RESPONSE).unwrap();

        let transport = response.transport.unwrap();
        assert_eq!(transport.play_state, PlayState::Playing);
        assert_eq!(transport.position, 42.5);
        assert!(!transport.repeat);
        assert_eq!(transport.position_label, "0:42.500");

        let beat = response.beat.unwrap();
        assert_eq!(beat.measure, 21);
        assert_eq!(beat.ts_numerator, 4);

        let regions = response.regions.unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].name, "Song\tA");
        assert_eq!(regions[1].color, 16777471);

        let markers = response.markers.unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "!1008");
        assert_eq!(markers[0].position, 110.0);
    }

    #[test]
    fn test_lists_absent_when_not_requested() {
        let response = parse_response("TRANSPORT\t0\t0.000000\t0\t0:00.000\t1.1.00\n").unwrap();
        assert!(response.regions.is_none());
        assert!(response.markers.is_none());
        assert_eq!(response.transport.unwrap().play_state, PlayState::Stopped);
    }

    #[test]
    fn test_empty_lists_are_some() {
        let response = parse_response("REGION_LIST\nREGION_LIST_END\nMARKER_LIST\nMARKER_LIST_END\n").unwrap();
        assert_eq!(response.regions, Some(vec![]));
        assert_eq!(response.markers, Some(vec![]));
    }

    #[test]
    fn test_unknown_records_skipped() {
        let response = parse_response("NTRACK\t3\nTRANSPORT\t2\t1.0\t1\t\t\n").unwrap();
        let transport = response.transport.unwrap();
        assert_eq!(transport.play_state, PlayState::Paused);
        assert!(transport.repeat);
    }

    #[test]
    fn test_crlf_line_endings() {
        let response = parse_response("TRANSPORT\t1\t5.0\t0\tx\ty\r\n").unwrap();
        assert_eq!(response.transport.unwrap().beats_label, "y");
    }

    #[test]
    fn test_malformed_number_reports_line() {
        let err = parse_response("TRANSPORT\t1\tsoon\t0\n").unwrap_err();
        match err {
            ProtocolError::MalformedRecord { record, line, .. } => {
                assert_eq!(record, "TRANSPORT");
                assert_eq!(line, "TRANSPORT\t1\tsoon\t0");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_playstate_rejected() {
        assert!(parse_response("TRANSPORT\t9\t1.0\t0\n").is_err());
    }

    #[test]
    fn test_short_region_record_rejected() {
        let body = "REGION_LIST\nREGION\tIntro\t1\t0.0\nREGION_LIST_END\n";
        assert!(matches!(
            parse_response(body),
            Err(ProtocolError::MalformedRecord { record: "REGION", .. })
        ));
    }

    #[test]
    fn test_unterminated_list_rejected() {
        let body = "REGION_LIST\nREGION\tIntro\t1\t0.0\t10.0\t0\n";
        assert_eq!(
            parse_response(body),
            Err(ProtocolError::UnterminatedList("REGION_LIST"))
        );
    }

    #[test]
    fn test_ext_state_record() {
        let response = parse_response("PROJEXTSTATE\trrc\tmode\tcue\n").unwrap();
        assert_eq!(
            response.ext_state,
            vec![ExtStateValue {
                project: true,
                section: "rrc".to_string(),
                key: "mode".to_string(),
                value: "cue".to_string(),
            }]
        );
    }

    #[test]
    fn test_unescape_field() {
        assert_eq!(unescape_field(r"a\tb"), "a\tb");
        assert_eq!(unescape_field(r"line\nbreak"), "line\nbreak");
        assert_eq!(unescape_field(r"back\\slash"), "back\\slash");
        assert_eq!(unescape_field(r"odd\q"), "odd\\q");
        assert_eq!(unescape_field("trailing\\"), "trailing\\");
    }
}
