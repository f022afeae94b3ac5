//! Loads the shared fixture registry under `testdata/` and checks the
//! cross-references it exercises.

use std::path::PathBuf;

use devcap_registry::{Category, Registry};

fn fixture() -> Registry {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../testdata/registry.json");
    let text = std::fs::read_to_string(&path).unwrap();
    let tree: serde_json::Value = serde_json::from_str(&text).unwrap();
    Registry::from_json(&tree).unwrap()
}

#[test]
fn fixture_loads() {
    let reg = fixture();
    assert!(reg.structs().count() >= 18);
    assert_eq!(reg.extension_version("VK_KHR_swapchain"), Some(70));
    assert!(reg.has_format("VK_FORMAT_D32_SFLOAT"));
    assert!(reg.has_enumerant("VkDriverId", "VK_DRIVER_ID_MESA_RADV"));
}

#[test]
fn fixture_aliases_share_ids() {
    let reg = fixture();
    assert_eq!(
        reg.resolve("VkQueueFamilyGlobalPriorityPropertiesEXT"),
        reg.resolve("VkQueueFamilyGlobalPriorityPropertiesKHR")
    );
}

#[test]
fn fixture_chain_roots() {
    let reg = fixture();
    let id = |n: &str| reg.resolve(n).unwrap();
    assert!(reg.fits_category(id("VkPhysicalDeviceProperties"), Category::Properties));
    assert!(reg.fits_category(id("VkPhysicalDeviceDriverProperties"), Category::Properties));
    assert!(!reg.fits_category(id("VkPhysicalDeviceLimits"), Category::Properties));
    assert!(reg.fits_category(id("VkVideoDecodeCapabilitiesKHR"), Category::VideoCapabilities));
    assert!(!reg.fits_category(id("VkVideoDecodeCapabilitiesKHR"), Category::Features));
}

#[test]
fn fixture_video_catalog() {
    let reg = fixture();
    let video = reg.video();
    let space: usize = video.axes.iter().map(|a| a.values.len()).product();
    assert_eq!(space, 16);
    assert_eq!(video.complete_fields.len(), 4);

    let output = video.category("decode_output").unwrap();
    assert_eq!(output.required_usage, 1024);
    assert_eq!(output.fixups.len(), 1);

    let coincide = video.category("decode_coincide").unwrap();
    assert_eq!(coincide.required_usage, 1024 | 4096);

    let key = video.format_key.as_ref().unwrap();
    assert_eq!(reg.name_of(key.structure), "VkVideoFormatPropertiesKHR");
    assert_eq!(key.member, "format");
}
