//! Audio device enumeration and selector resolution

use serde::Deserialize;

/// Descriptor for one audio device, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the host's device enumeration
    pub index: usize,

    /// Display name reported by the host
    pub name: String,

    /// Maximum input channels (0 for output-only devices)
    pub max_input_channels: u16,

    /// Maximum output channels (0 for input-only devices)
    pub max_output_channels: u16,
}

/// User-supplied device selector from configuration
///
/// Either a direct device index or a case-insensitive substring matched
/// against device names. An absent selector (config field omitted) means
/// the system default device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DeviceSelector {
    /// Direct device index, passed through without bounds validation
    Index(usize),

    /// Substring matched against device names, first match wins
    Name(String),
}

/// Resolve a device selector against an enumerated device list
///
/// Returns `None` for the system default device: when no selector was
/// configured, or when a name pattern matches nothing. A non-matching
/// pattern degrades to the default device with a warning rather than
/// aborting; an out-of-range index is left for the audio layer to report
/// at use time.
#[must_use]
pub fn resolve(selector: Option<&DeviceSelector>, devices: &[DeviceInfo]) -> Option<usize> {
    match selector {
        None => None,
        Some(DeviceSelector::Index(index)) => Some(*index),
        Some(DeviceSelector::Name(pattern)) => {
            let needle = pattern.to_lowercase();
            for device in devices {
                if device.name.to_lowercase().contains(&needle) {
                    tracing::debug!(
                        pattern,
                        index = device.index,
                        name = %device.name,
                        "device selector resolved"
                    );
                    return Some(device.index);
                }
            }
            tracing::warn!(pattern, "device selector matched nothing, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<DeviceInfo> {
        vec![
            DeviceInfo {
                index: 0,
                name: "USB Mic".to_string(),
                max_input_channels: 1,
                max_output_channels: 0,
            },
            DeviceInfo {
                index: 1,
                name: "Built-in Microphone".to_string(),
                max_input_channels: 2,
                max_output_channels: 0,
            },
            DeviceInfo {
                index: 2,
                name: "HDMI Output".to_string(),
                max_input_channels: 0,
                max_output_channels: 8,
            },
        ]
    }

    #[test]
    fn absent_selector_uses_default() {
        assert_eq!(resolve(None, &devices()), None);
    }

    #[test]
    fn index_selector_passes_through() {
        let selector = DeviceSelector::Index(7);
        // No bounds check: out-of-range indices surface at use time.
        assert_eq!(resolve(Some(&selector), &devices()), Some(7));
        assert_eq!(resolve(Some(&selector), &[]), Some(7));
    }

    #[test]
    fn name_selector_is_case_insensitive_first_match() {
        let selector = DeviceSelector::Name("mic".to_string());
        assert_eq!(resolve(Some(&selector), &devices()), Some(0));

        let selector = DeviceSelector::Name("BUILT-IN".to_string());
        assert_eq!(resolve(Some(&selector), &devices()), Some(1));
    }

    #[test]
    fn unmatched_name_degrades_to_default() {
        let selector = DeviceSelector::Name("bluetooth".to_string());
        assert_eq!(resolve(Some(&selector), &devices()), None);
    }

    #[test]
    fn unique_match_resolves_to_that_device() {
        let selector = DeviceSelector::Name("hdmi".to_string());
        assert_eq!(resolve(Some(&selector), &devices()), Some(2));
    }
}
