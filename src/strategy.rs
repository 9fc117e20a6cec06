//! # Repair Strategy Planning Module
//!
//! Pure decision logic, no I/O:
//! - Maps a corruption level to the ordered list of repair strategies worth
//!   attempting for it
//! - Maps an output format to its encoding parameter set
//! - Builds the full ffmpeg argument list for a (strategy, format) pair
//!
//! Strategy and format names are closed enums, resolved once at the caller
//! boundary via `FromStr`; unknown names fail there with `UnknownStrategy`
//! and no process is ever spawned for them.
//!
//! ## Strategy ordering:
//! - minor → container-repair
//! - moderate → stream-remux, extract-playable
//! - severe (and anything else) → extract-playable, container-repair,
//!   stream-remux, deep-repair
//!
//! All strategies share the error-tolerant decode flags (ignore decode
//! errors, regenerate timestamps, discard corrupt packets). `deep-repair`
//! additionally forces constant frame timing and a fixed keyframe interval
//! to recover from timing/GOP corruption that simple remuxing cannot fix.

use crate::error::AnalyzeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Severity of detected corruption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionLevel {
    None,
    Minor,
    Moderate,
    Severe,
}

impl std::fmt::Display for CorruptionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorruptionLevel::None => write!(f, "none"),
            CorruptionLevel::Minor => write!(f, "minor"),
            CorruptionLevel::Moderate => write!(f, "moderate"),
            CorruptionLevel::Severe => write!(f, "severe"),
        }
    }
}

/// One repair approach, tried in planner order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStrategy {
    /// Rebuild the container around the existing streams
    ContainerRepair,
    /// Re-encode streams into a fresh container
    StreamRemux,
    /// Salvage whatever decodes, skipping damaged regions
    ExtractPlayable,
    /// Force constant frame timing and a fixed GOP on top of re-encoding
    DeepRepair,
}

impl RepairStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStrategy::ContainerRepair => "container-repair",
            RepairStrategy::StreamRemux => "stream-remux",
            RepairStrategy::ExtractPlayable => "extract-playable",
            RepairStrategy::DeepRepair => "deep-repair",
        }
    }
}

impl std::fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RepairStrategy {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container-repair" => Ok(RepairStrategy::ContainerRepair),
            "stream-remux" => Ok(RepairStrategy::StreamRemux),
            "extract-playable" => Ok(RepairStrategy::ExtractPlayable),
            "deep-repair" => Ok(RepairStrategy::DeepRepair),
            other => Err(AnalyzeError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Target format for repaired output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// H.264 in MP4 (maximum compatibility)
    #[serde(rename = "h264-mp4")]
    H264Mp4,
    /// HEVC in MP4
    #[serde(rename = "hevc-mp4")]
    HevcMp4,
    /// ProRes 422 in MOV
    #[serde(rename = "prores-mov")]
    ProResMov,
}

impl OutputFormat {
    /// File extension for this format, including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::ProResMov => ".mov",
            _ => ".mp4",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h264-mp4" => Ok(OutputFormat::H264Mp4),
            "hevc-mp4" => Ok(OutputFormat::HevcMp4),
            "prores-mov" => Ok(OutputFormat::ProResMov),
            other => Err(AnalyzeError::Validation(format!(
                "Unknown output format: {} (expected h264-mp4, hevc-mp4 or prores-mov)",
                other
            ))),
        }
    }
}

/// Encoding parameter set for one output format
#[derive(Debug, Clone)]
pub struct EncodingParams {
    pub video_codec: &'static str,
    /// Quality / profile arguments following the video codec
    pub video_args: Vec<String>,
    pub pixel_format: &'static str,
    pub audio_codec: &'static str,
    /// Arguments following the audio codec (bitrate, container flags)
    pub trailer_args: Vec<String>,
}

impl EncodingParams {
    /// Flatten into ffmpeg argument order
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.video_codec.to_string()];
        args.extend(self.video_args.iter().cloned());
        args.push("-pix_fmt".to_string());
        args.push(self.pixel_format.to_string());
        args.push("-c:a".to_string());
        args.push(self.audio_codec.to_string());
        args.extend(self.trailer_args.iter().cloned());
        args
    }
}

/// Ordered repair strategies for a corruption level
pub fn strategies_for(level: CorruptionLevel) -> Vec<RepairStrategy> {
    match level {
        CorruptionLevel::Minor => vec![RepairStrategy::ContainerRepair],
        CorruptionLevel::Moderate => {
            vec![RepairStrategy::StreamRemux, RepairStrategy::ExtractPlayable]
        }
        // Severe, and the fallback for anything unexpected: try everything
        _ => vec![
            RepairStrategy::ExtractPlayable,
            RepairStrategy::ContainerRepair,
            RepairStrategy::StreamRemux,
            RepairStrategy::DeepRepair,
        ],
    }
}

/// Encoding parameters for an output format
pub fn encoding_params_for(format: OutputFormat) -> EncodingParams {
    match format {
        OutputFormat::H264Mp4 => EncodingParams {
            video_codec: "libx264",
            video_args: str_args(&["-preset", "medium", "-crf", "18"]),
            pixel_format: "yuv420p",
            audio_codec: "aac",
            trailer_args: str_args(&["-b:a", "192k", "-movflags", "+faststart"]),
        },
        OutputFormat::HevcMp4 => EncodingParams {
            video_codec: "libx265",
            video_args: str_args(&["-preset", "medium", "-crf", "20", "-tag:v", "hvc1"]),
            pixel_format: "yuv420p",
            audio_codec: "aac",
            trailer_args: str_args(&["-b:a", "192k", "-movflags", "+faststart"]),
        },
        OutputFormat::ProResMov => EncodingParams {
            // ProRes 422
            video_codec: "prores_ks",
            video_args: str_args(&["-profile:v", "2"]),
            pixel_format: "yuv422p10le",
            audio_codec: "pcm_s16le",
            trailer_args: Vec::new(),
        },
    }
}

/// Full ffmpeg argument list for one repair attempt
pub fn command_for(
    strategy: RepairStrategy,
    params: &EncodingParams,
    input: &Path,
    output: &Path,
) -> Vec<String> {
    // Error-tolerant decode flags shared by every strategy
    let mut args = str_args(&[
        "-y",
        "-err_detect",
        "ignore_err",
        "-fflags",
        "+genpts+igndts+discardcorrupt",
        "-i",
    ]);
    args.push(input.to_string_lossy().to_string());

    if strategy == RepairStrategy::DeepRepair {
        // Constant frame timing and fixed keyframe interval for timing/GOP
        // corruption that remuxing alone cannot fix
        args.extend(str_args(&[
            "-vf",
            "setpts=N/FRAME_RATE/TB,format=yuv420p",
            "-g",
            "25",
            "-bf",
            "2",
        ]));
    }

    args.extend(params.to_args());
    args.push(output.to_string_lossy().to_string());
    args
}

fn str_args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_minor_gets_container_repair_only() {
        assert_eq!(
            strategies_for(CorruptionLevel::Minor),
            vec![RepairStrategy::ContainerRepair]
        );
    }

    #[test]
    fn test_moderate_strategy_order() {
        assert_eq!(
            strategies_for(CorruptionLevel::Moderate),
            vec![RepairStrategy::StreamRemux, RepairStrategy::ExtractPlayable]
        );
    }

    #[test]
    fn test_severe_tries_everything() {
        assert_eq!(
            strategies_for(CorruptionLevel::Severe),
            vec![
                RepairStrategy::ExtractPlayable,
                RepairStrategy::ContainerRepair,
                RepairStrategy::StreamRemux,
                RepairStrategy::DeepRepair,
            ]
        );
    }

    #[test]
    fn test_strategy_round_trip() {
        for strategy in [
            RepairStrategy::ContainerRepair,
            RepairStrategy::StreamRemux,
            RepairStrategy::ExtractPlayable,
            RepairStrategy::DeepRepair,
        ] {
            assert_eq!(strategy.as_str().parse::<RepairStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_unknown_strategy_fails_at_boundary() {
        let err = "magic-repair".parse::<RepairStrategy>().unwrap_err();
        assert!(matches!(err, AnalyzeError::UnknownStrategy(name) if name == "magic-repair"));
    }

    #[test]
    fn test_h264_params() {
        let params = encoding_params_for(OutputFormat::H264Mp4);
        let args = params.to_args();
        assert_eq!(args[0..2], ["-c:v", "libx264"]);
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[test]
    fn test_prores_uses_mov_and_pcm_audio() {
        assert_eq!(OutputFormat::ProResMov.extension(), ".mov");
        let params = encoding_params_for(OutputFormat::ProResMov);
        assert_eq!(params.audio_codec, "pcm_s16le");
        assert_eq!(params.pixel_format, "yuv422p10le");
    }

    #[test]
    fn test_command_shares_error_tolerant_base() {
        let params = encoding_params_for(OutputFormat::H264Mp4);
        let input = PathBuf::from("/videos/in.mp4");
        let output = PathBuf::from("/videos/out.mp4");

        for strategy in [
            RepairStrategy::ContainerRepair,
            RepairStrategy::StreamRemux,
            RepairStrategy::ExtractPlayable,
        ] {
            let args = command_for(strategy, &params, &input, &output);
            assert_eq!(args[0], "-y");
            assert!(args.contains(&"+genpts+igndts+discardcorrupt".to_string()));
            assert!(!args.contains(&"-g".to_string()));
            assert_eq!(args.last().unwrap(), "/videos/out.mp4");
        }
    }

    #[test]
    fn test_deep_repair_forces_frame_timing() {
        let params = encoding_params_for(OutputFormat::H264Mp4);
        let args = command_for(
            RepairStrategy::DeepRepair,
            &params,
            &PathBuf::from("/videos/in.mp4"),
            &PathBuf::from("/videos/out.mp4"),
        );

        assert!(args.contains(&"setpts=N/FRAME_RATE/TB,format=yuv420p".to_string()));
        let g = args.iter().position(|a| a == "-g").unwrap();
        assert_eq!(args[g + 1], "25");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("h264-mp4".parse::<OutputFormat>().unwrap(), OutputFormat::H264Mp4);
        assert_eq!("prores-mov".parse::<OutputFormat>().unwrap(), OutputFormat::ProResMov);
        assert!("avi-divx".parse::<OutputFormat>().is_err());
    }
}
