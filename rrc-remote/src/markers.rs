//! Marker-name directives
//!
//! Marker names carry instructions for the navigation engine:
//!
//! - `!<action id> [...]`: DAW action marker. The DAW runs the action when
//!   playback crosses it. Pause (`1008`) and stop (`1016`) actions are hard
//!   stops: the engine never auto-advances out of a region containing one.
//! - `#[label] key=value ...`: song marker overriding timing/tempo for its
//!   region. Keys: `bpm`, `ts` (`7/8`), `bars`, `end` (seconds after the
//!   marker).
//! - anything else is a plain marker.

use crate::regions::{markers_within, Marker, Region};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Transport: Pause
pub const ACTION_PAUSE: u32 = 1008;
/// Transport: Stop
pub const ACTION_STOP: u32 = 1016;

/// Musical time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    /// Bar length in quarter notes
    pub fn quarters_per_bar(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator as f64
    }

    fn parse(value: &str) -> Option<Self> {
        let (num, denom) = value.split_once('/')?;
        let numerator: u32 = num.trim().parse().ok()?;
        let denominator: u32 = denom.trim().parse().ok()?;
        if numerator == 0 || !denominator.is_power_of_two() || denominator > 64 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Timing/tempo override declared by a `#` song marker
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SongOverride {
    pub bpm: Option<f64>,
    pub time_signature: Option<TimeSignature>,
    pub bars: Option<u32>,
    /// Explicit length in seconds from the marker
    pub end_offset: Option<f64>,
}

impl SongOverride {
    /// Song length in seconds from the marker, if the override declares one
    ///
    /// An explicit `end` wins over `bars`.
    pub fn length(&self) -> Option<f64> {
        if let Some(end) = self.end_offset {
            return Some(end);
        }
        let bars = self.bars?;
        let bpm = self.bpm?;
        let ts = self.time_signature.unwrap_or(TimeSignature::COMMON);
        Some(bars as f64 * ts.quarters_per_bar() * 60.0 / bpm)
    }
}

/// Parsed meaning of a marker name
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerDirective {
    /// Action marker that pauses or stops the transport
    HardStop { action_id: u32 },
    /// Action marker with no navigation effect
    Action { action_ids: Vec<u32> },
    /// Custom song marker
    Song(SongOverride),
    Plain,
}

impl MarkerDirective {
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, MarkerDirective::HardStop { .. })
    }
}

/// Parse a marker name into a directive
///
/// Malformed directives are logged and treated as plain markers.
pub fn parse_directive(name: &str) -> MarkerDirective {
    let name = name.trim();
    if let Some(rest) = name.strip_prefix('!') {
        parse_action(rest, name)
    } else if let Some(rest) = name.strip_prefix('#') {
        parse_song(rest, name)
    } else {
        MarkerDirective::Plain
    }
}

fn parse_action(body: &str, name: &str) -> MarkerDirective {
    let ids: Result<Vec<u32>, _> = body.split_whitespace().map(str::parse::<u32>).collect();
    match ids {
        Ok(ids) if !ids.is_empty() => {
            match ids
                .iter()
                .copied()
                .find(|id| *id == ACTION_PAUSE || *id == ACTION_STOP)
            {
                Some(action_id) => MarkerDirective::HardStop { action_id },
                None => MarkerDirective::Action { action_ids: ids },
            }
        }
        _ => {
            warn!("Marker '{}' is not a valid action marker", name);
            MarkerDirective::Plain
        }
    }
}

fn parse_song(body: &str, name: &str) -> MarkerDirective {
    let mut song = SongOverride::default();
    let mut recognised = false;

    for token in body.split_whitespace() {
        // Tokens without '=' are the song label
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };

        let ok = match key.to_ascii_lowercase().as_str() {
            "bpm" | "tempo" => match value.parse::<f64>() {
                Ok(bpm) if bpm.is_finite() && bpm > 0.0 => {
                    song.bpm = Some(bpm);
                    true
                }
                _ => false,
            },
            "ts" => match TimeSignature::parse(value) {
                Some(ts) => {
                    song.time_signature = Some(ts);
                    true
                }
                None => false,
            },
            "bars" => match value.parse::<u32>() {
                Ok(bars) if bars > 0 => {
                    song.bars = Some(bars);
                    true
                }
                _ => false,
            },
            "end" => match value.parse::<f64>() {
                Ok(end) if end.is_finite() && end > 0.0 => {
                    song.end_offset = Some(end);
                    true
                }
                _ => false,
            },
            _ => {
                warn!("Marker '{}': unknown option '{}'", name, key);
                continue;
            }
        };

        if !ok {
            warn!("Marker '{}': invalid value '{}' for '{}'", name, value, key);
            return MarkerDirective::Plain;
        }
        recognised = true;
    }

    if !recognised {
        return MarkerDirective::Plain;
    }
    if song.bars.is_some() && song.bpm.is_none() && song.end_offset.is_none() {
        warn!("Marker '{}': bars= needs bpm=", name);
        return MarkerDirective::Plain;
    }

    MarkerDirective::Song(song)
}

/// Navigation-relevant timing of one region after applying its markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTiming {
    pub region_id: u32,
    /// Where auto-advance measures "the end" (seconds)
    pub effective_end: f64,
    /// True when a song marker moved the end before the region end
    pub custom_end: bool,
    pub tempo: Option<f64>,
    pub time_signature: Option<TimeSignature>,
    /// First hard-stop marker before the effective end
    pub hard_stop: Option<Marker>,
}

impl RegionTiming {
    /// Resolve a region's timing from the markers inside it
    ///
    /// The earliest song marker applies; later ones are ignored. A custom
    /// end never extends past the region end.
    pub fn resolve(region: &Region, markers: &[Marker]) -> Self {
        let within = markers_within(region, markers);

        let mut effective_end = region.end;
        let mut tempo = None;
        let mut time_signature = None;

        if let Some((marker, song)) = within.iter().find_map(|m| match parse_directive(&m.name) {
            MarkerDirective::Song(song) => Some((*m, song)),
            _ => None,
        }) {
            tempo = song.bpm;
            time_signature = song.time_signature;
            if let Some(length) = song.length() {
                effective_end = (marker.position + length).min(region.end);
            }
        }

        let hard_stop = within
            .iter()
            .find(|m| m.position < effective_end && parse_directive(&m.name).is_hard_stop())
            .map(|m| (*m).clone());

        Self {
            region_id: region.id,
            effective_end,
            custom_end: effective_end < region.end,
            tempo,
            time_signature,
            hard_stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{marker, region};

    #[test]
    fn test_plain_markers() {
        assert_eq!(parse_directive("Chorus"), MarkerDirective::Plain);
        assert_eq!(parse_directive(""), MarkerDirective::Plain);
        assert_eq!(parse_directive("#just a label"), MarkerDirective::Plain);
    }

    #[test]
    fn test_hard_stop_markers() {
        assert_eq!(
            parse_directive("!1008"),
            MarkerDirective::HardStop { action_id: 1008 }
        );
        assert_eq!(
            parse_directive(" !1016 "),
            MarkerDirective::HardStop { action_id: 1016 }
        );
        // Any pause/stop in a multi-action marker makes it a hard stop
        assert_eq!(
            parse_directive("!40044 1008"),
            MarkerDirective::HardStop { action_id: 1008 }
        );
    }

    #[test]
    fn test_other_action_markers() {
        assert_eq!(
            parse_directive("!40044"),
            MarkerDirective::Action {
                action_ids: vec![40044]
            }
        );
        assert_eq!(parse_directive("!stop"), MarkerDirective::Plain);
        assert_eq!(parse_directive("!"), MarkerDirective::Plain);
    }

    #[test]
    fn test_song_marker_options() {
        let directive = parse_directive("#Intro bpm=120 ts=7/8 bars=16");
        let MarkerDirective::Song(song) = directive else {
            panic!("expected song marker");
        };
        assert_eq!(song.bpm, Some(120.0));
        assert_eq!(
            song.time_signature,
            Some(TimeSignature {
                numerator: 7,
                denominator: 8
            })
        );
        assert_eq!(song.bars, Some(16));
        // 16 bars * 3.5 quarters * 0.5 s
        assert!((song.length().unwrap() - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_song_marker_end_wins_over_bars() {
        let MarkerDirective::Song(song) = parse_directive("#bpm=100 bars=8 end=12.5") else {
            panic!("expected song marker");
        };
        assert_eq!(song.length(), Some(12.5));
    }

    #[test]
    fn test_song_marker_invalid_values_are_plain() {
        assert_eq!(parse_directive("#bpm=0"), MarkerDirective::Plain);
        assert_eq!(parse_directive("#bpm=fast"), MarkerDirective::Plain);
        assert_eq!(parse_directive("#ts=4/3"), MarkerDirective::Plain);
        assert_eq!(parse_directive("#bars=8"), MarkerDirective::Plain);
    }

    #[test]
    fn test_song_marker_tempo_only_has_no_length() {
        let MarkerDirective::Song(song) = parse_directive("#bpm=90") else {
            panic!("expected song marker");
        };
        assert_eq!(song.length(), None);
    }

    #[test]
    fn test_timing_without_markers() {
        let r = region(1, "Song", 10.0, 70.0);
        let timing = RegionTiming::resolve(&r, &[]);
        assert_eq!(timing.effective_end, 70.0);
        assert!(!timing.custom_end);
        assert!(timing.hard_stop.is_none());
        assert!(timing.tempo.is_none());
    }

    #[test]
    fn test_timing_custom_end_from_bars() {
        let r = region(1, "Song", 10.0, 70.0);
        // 8 bars of 4/4 at 120 bpm = 16 s
        let markers = vec![marker(1, "#bpm=120 bars=8", 12.0)];
        let timing = RegionTiming::resolve(&r, &markers);
        assert!((timing.effective_end - 28.0).abs() < 1e-9);
        assert!(timing.custom_end);
        assert_eq!(timing.tempo, Some(120.0));
    }

    #[test]
    fn test_timing_custom_end_clamped_to_region() {
        let r = region(1, "Song", 10.0, 20.0);
        let markers = vec![marker(1, "#end=60", 12.0)];
        let timing = RegionTiming::resolve(&r, &markers);
        assert_eq!(timing.effective_end, 20.0);
        assert!(!timing.custom_end);
    }

    #[test]
    fn test_timing_earliest_song_marker_applies() {
        let r = region(1, "Song", 0.0, 100.0);
        let markers = vec![marker(2, "#end=10", 50.0), marker(1, "#end=30", 5.0)];
        let timing = RegionTiming::resolve(&r, &markers);
        assert_eq!(timing.effective_end, 35.0);
    }

    #[test]
    fn test_timing_hard_stop_inside_region() {
        let r = region(1, "Song", 0.0, 100.0);
        let markers = vec![marker(1, "Chorus", 20.0), marker(2, "!1008", 90.0)];
        let timing = RegionTiming::resolve(&r, &markers);
        assert_eq!(timing.hard_stop.unwrap().id, 2);
    }

    #[test]
    fn test_timing_hard_stop_after_custom_end_ignored() {
        let r = region(1, "Song", 0.0, 100.0);
        let markers = vec![marker(1, "#end=50", 0.0), marker(2, "!1016", 80.0)];
        let timing = RegionTiming::resolve(&r, &markers);
        assert_eq!(timing.effective_end, 50.0);
        assert!(timing.hard_stop.is_none());
    }

    #[test]
    fn test_timing_ignores_markers_in_other_regions() {
        let r = region(1, "Song", 0.0, 100.0);
        let markers = vec![marker(1, "!1008", 100.0), marker(2, "#end=5", 150.0)];
        let timing = RegionTiming::resolve(&r, &markers);
        assert!(timing.hard_stop.is_none());
        assert_eq!(timing.effective_end, 100.0);
    }
}
