//! V4L2 camera discovery.
//!
//! Parses `v4l2-ctl --list-devices` to find an external (non-integrated)
//! camera when no `--video_id` is given. The capture loop only ever sees
//! the [`DeviceResolver`] trait.

use std::process::{Command, Stdio};

/// Errors that can occur while resolving a camera device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("v4l2-ctl not found. Install it with:\n\n    sudo apt install v4l-utils\n\nor pass --video_id explicitly")]
    ToolNotFound,
    #[error("Failed to run v4l2-ctl: {0}")]
    ToolFailed(String),
    #[error("No external (non-integrated) camera found.")]
    NoExternalCamera,
}

/// One video device block from `v4l2-ctl --list-devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    /// Header line, e.g. `HD USB Camera: HD USB Camera (usb-0000:00:14.0-2)`
    pub name: String,
    /// `/dev/video*` nodes, in listing order
    pub paths: Vec<String>,
}

impl VideoDevice {
    /// Index N of the first `/dev/videoN` node.
    pub fn video_index(&self) -> Option<u32> {
        self.paths
            .iter()
            .find_map(|p| p.strip_prefix("/dev/video")?.parse().ok())
    }

    pub fn is_integrated(&self) -> bool {
        self.name.contains("Integrated")
    }
}

/// Resolves which camera index to open.
pub trait DeviceResolver {
    fn resolve(&self) -> Result<u32, DeviceError>;
}

/// A device index given on the command line or in the config file.
#[derive(Debug, Clone, Copy)]
pub struct FixedDevice(pub u32);

impl DeviceResolver for FixedDevice {
    fn resolve(&self) -> Result<u32, DeviceError> {
        Ok(self.0)
    }
}

/// Picks the first external camera reported by `v4l2-ctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Resolver;

impl DeviceResolver for V4l2Resolver {
    fn resolve(&self) -> Result<u32, DeviceError> {
        let devices = list_v4l2_devices()?;
        let (device, index) = select_external_camera(&devices)?;
        log::info!(
            "Using camera: {} ({})",
            device.name,
            device.paths.first().map(String::as_str).unwrap_or("?")
        );
        Ok(index)
    }
}

/// Run `v4l2-ctl --list-devices` and parse its output.
pub fn list_v4l2_devices() -> Result<Vec<VideoDevice>, DeviceError> {
    let output = Command::new("v4l2-ctl")
        .arg("--list-devices")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeviceError::ToolNotFound
            } else {
                DeviceError::ToolFailed(e.to_string())
            }
        })?;

    // v4l2-ctl exits non-zero when some node can't be opened but still
    // prints the ones it could
    if !output.status.success() {
        log::debug!(
            "v4l2-ctl exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_device_list(&stdout))
}

/// Parse `v4l2-ctl --list-devices` output.
///
/// Unindented lines start a device block; indented lines under it are
/// device nodes, of which only `/dev/video*` are kept.
pub fn parse_device_list(text: &str) -> Vec<VideoDevice> {
    let mut devices: Vec<VideoDevice> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            devices.push(VideoDevice {
                name: line.trim().to_string(),
                paths: Vec::new(),
            });
            continue;
        }
        let path = line.trim();
        if path.starts_with("/dev/video") {
            if let Some(current) = devices.last_mut() {
                current.paths.push(path.to_string());
            }
        }
    }

    devices
}

/// First non-integrated device exposing a video node, with its index.
pub fn select_external_camera(devices: &[VideoDevice]) -> Result<(&VideoDevice, u32), DeviceError> {
    devices
        .iter()
        .filter(|d| !d.is_integrated() && !d.paths.is_empty())
        .find_map(|d| d.video_index().map(|index| (d, index)))
        .ok_or(DeviceError::NoExternalCamera)
}

/// Print the device list to stdout, marking the auto-detect choice.
pub fn print_devices(devices: &[VideoDevice]) {
    if devices.is_empty() {
        println!("No video devices found.");
        return;
    }

    let selected = select_external_camera(devices).ok().map(|(d, _)| d);
    println!("Video Devices:");
    for device in devices {
        let marker = if selected == Some(device) { "*" } else { " " };
        println!(" {} {}", marker, device.name);
        if device.paths.is_empty() {
            println!("      (no video nodes)");
        }
        for path in &device.paths {
            println!("      {}", path);
        }
    }
    if selected.is_some() {
        println!();
        println!("* selected when --video_id is not given");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAPTOP_WITH_USB_CAM: &str = "\
Integrated Camera: Integrated C (usb-0000:00:14.0-8):
\t/dev/video0
\t/dev/video1
\t/dev/media0

ELP USB Camera: ELP USB Camera (usb-0000:00:14.0-2):
\t/dev/video2
\t/dev/video3
\t/dev/media1
";

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list(LAPTOP_WITH_USB_CAM);
        assert_eq!(devices.len(), 2);
        assert!(devices[0].is_integrated());
        assert_eq!(devices[0].paths, vec!["/dev/video0", "/dev/video1"]);
        assert_eq!(
            devices[1].name,
            "ELP USB Camera: ELP USB Camera (usb-0000:00:14.0-2):"
        );
        assert_eq!(devices[1].paths, vec!["/dev/video2", "/dev/video3"]);
    }

    #[test]
    fn test_select_skips_integrated_camera() {
        let devices = parse_device_list(LAPTOP_WITH_USB_CAM);
        let (device, index) = select_external_camera(&devices).unwrap();
        assert_eq!(index, 2);
        assert!(device.name.starts_with("ELP"));
    }

    #[test]
    fn test_select_skips_devices_without_video_nodes() {
        let text = "\
Some Media Controller (platform:foo):
\t/dev/media3

USB Cam (usb-1):
\t/dev/video4
";
        let devices = parse_device_list(text);
        assert_eq!(devices[0].paths.len(), 0);
        let (_, index) = select_external_camera(&devices).unwrap();
        assert_eq!(index, 4);
    }

    #[test]
    fn test_only_integrated_camera_is_an_error() {
        let text = "Integrated Camera (usb-1):\n\t/dev/video0\n";
        let devices = parse_device_list(text);
        assert!(matches!(
            select_external_camera(&devices),
            Err(DeviceError::NoExternalCamera)
        ));
    }

    #[test]
    fn test_empty_listing_is_an_error() {
        assert!(parse_device_list("").is_empty());
        assert!(select_external_camera(&[]).is_err());
    }

    #[test]
    fn test_fixed_device_resolves_to_itself() {
        assert_eq!(FixedDevice(5).resolve().unwrap(), 5);
    }

    #[test]
    fn test_space_indented_paths() {
        let text = "USB Cam (usb-1):\n        /dev/video6\n";
        let devices = parse_device_list(text);
        assert_eq!(devices[0].video_index(), Some(6));
    }
}
