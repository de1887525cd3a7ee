// evmqtt Device Discovery
// Enumerates input devices and derives topic slugs and unique ids

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::device::{DeviceDescriptor, DeviceProvider, DeviceResult};

/// Slug used when a device name has no usable characters
pub const UNKNOWN_DEVICE_SLUG: &str = "unknown-device";

struct SlugRules {
    separators: Regex,
    invalid: Regex,
    dashes: Regex,
}

fn slug_rules() -> Option<&'static SlugRules> {
    static RULES: OnceLock<Option<SlugRules>> = OnceLock::new();
    RULES
        .get_or_init(|| {
            Some(SlugRules {
                separators: Regex::new(r"[_\s]+").ok()?,
                invalid: Regex::new(r"[^a-z0-9-]").ok()?,
                dashes: Regex::new(r"-+").ok()?,
            })
        })
        .as_ref()
}

/// Convert a device name to a lowercase, hyphen-separated topic segment.
///
/// ```
/// use evmqtt_core::discovery::slugify;
/// assert_eq!(slugify("USB Keyboard"), "usb-keyboard");
/// assert_eq!(slugify("gpio_ir_recv"), "gpio-ir-recv");
/// ```
pub fn slugify(text: &str) -> String {
    let Some(rules) = slug_rules() else {
        return UNKNOWN_DEVICE_SLUG.to_string();
    };

    let lowered = text.to_lowercase();
    let hyphenated = rules.separators.replace_all(&lowered, "-");
    let cleaned = rules.invalid.replace_all(&hyphenated, "");
    let collapsed = rules.dashes.replace_all(&cleaned, "-");
    let slug = collapsed.trim_matches('-');

    if slug.is_empty() {
        UNKNOWN_DEVICE_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// `evmqtt_{slug}_{last path segment}`, e.g. `evmqtt_usb-keyboard_event3`
pub fn unique_id(path: &str, slug: &str) -> String {
    let node = path.rsplit('/').next().unwrap_or(path);
    format!("evmqtt_{}_{}", slug, node)
}

/// Unique id for a manually configured device, derived from its path alone
pub fn manual_unique_id(path: &str) -> String {
    format!("evmqtt_{}", path.replace('/', "_"))
}

/// Topic segment for a device without a slug: `/dev/input/event0` becomes
/// `dev_input_event0`
pub fn sanitize_path(path: &str) -> String {
    path.trim_start_matches('/').replace('/', "_")
}

/// A device selected for monitoring, with its topic naming resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub path: String,
    pub name: String,
    pub slug: String,
    pub unique_id: String,
}

/// Turn enumerated devices into discovered devices.
///
/// Devices without key events are dropped when `filter_keys_only` is set.
/// Slugs are assigned in path order; the second device with a given base
/// slug gets `-2`, the third `-3`, and so on.
pub fn assign_slugs(descriptors: Vec<DeviceDescriptor>, filter_keys_only: bool) -> Vec<DiscoveredDevice> {
    let mut descriptors = descriptors;
    descriptors.sort_by(|a, b| a.path.cmp(&b.path));

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut devices = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        if filter_keys_only && !descriptor.has_keys {
            log::debug!(
                "Skipping device '{}' ({}): no key capabilities",
                descriptor.name,
                descriptor.path
            );
            continue;
        }

        let base = slugify(&descriptor.name);
        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        let slug = if *count == 1 {
            base
        } else {
            format!("{}-{}", base, count)
        };

        log::debug!(
            "Discovered device: {} ({}) -> slug: {}",
            descriptor.name,
            descriptor.path,
            slug
        );
        devices.push(DiscoveredDevice {
            unique_id: unique_id(&descriptor.path, &slug),
            path: descriptor.path,
            name: descriptor.name,
            slug,
        });
    }
    devices
}

/// Enumerate and name every usable input device
pub fn discover(provider: &dyn DeviceProvider, filter_keys_only: bool) -> DeviceResult<Vec<DiscoveredDevice>> {
    let devices = assign_slugs(provider.enumerate()?, filter_keys_only);
    log::info!("Discovered {} input device(s)", devices.len());
    Ok(devices)
}

/// `(path, name)` of every readable input device
pub fn list_devices(provider: &dyn DeviceProvider) -> DeviceResult<Vec<(String, String)>> {
    Ok(provider
        .enumerate()?
        .into_iter()
        .map(|d| (d.path, d.name))
        .collect())
}

/// Initial enable state: everything when `enabled_devices` is empty,
/// otherwise only the listed paths
pub fn initially_enabled(path: &str, enabled_devices: &[String]) -> bool {
    enabled_devices.is_empty() || enabled_devices.iter().any(|p| p == path)
}
