// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 用户控制 (user controls) and their text form.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// One user action; each maps to one session operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    LoadImage(PathBuf),
    LoadVideo(PathBuf),
    OpenCamera(u32),
    Play,
    Pause,
    TogglePlay,
    Stop,
    StartDetect,
    PauseDetect,
    SetConf(f32),
    SetIou(f32),
    SaveResult,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseControlError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("bad argument for `{command}`: {value}")]
    BadArgument { command: &'static str, value: String },
}

impl FromStr for Control {
    type Err = ParseControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (cmd, arg) = match s.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (s, ""),
        };

        let need = |name: &'static str| {
            if arg.is_empty() {
                Err(ParseControlError::MissingArgument(name))
            } else {
                Ok(arg)
            }
        };
        let number = |name: &'static str| -> Result<f32, ParseControlError> {
            need(name)?
                .parse::<f32>()
                .map_err(|_| ParseControlError::BadArgument {
                    command: name,
                    value: arg.to_string(),
                })
        };

        Ok(match cmd.to_ascii_lowercase().as_str() {
            "" => return Err(ParseControlError::Empty),
            "image" => Control::LoadImage(PathBuf::from(need("image")?)),
            "video" => Control::LoadVideo(PathBuf::from(need("video")?)),
            "camera" => {
                let raw = if arg.is_empty() { "0" } else { arg };
                let index = raw.parse().map_err(|_| ParseControlError::BadArgument {
                    command: "camera",
                    value: raw.to_string(),
                })?;
                Control::OpenCamera(index)
            }
            "play" => Control::Play,
            "pause" => Control::Pause,
            "toggle" => Control::TogglePlay,
            "stop" => Control::Stop,
            "detect" => Control::StartDetect,
            "pause-detect" => Control::PauseDetect,
            "conf" => Control::SetConf(number("conf")?),
            "iou" => Control::SetIou(number("iou")?),
            "save" => Control::SaveResult,
            "quit" | "exit" => Control::Quit,
            other => return Err(ParseControlError::Unknown(other.to_string())),
        })
    }
}
