#![no_main]
use appimage::DesktopEntry;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let entry = DesktopEntry::parse(&text);

    let _ = entry.get("Desktop Entry/X-AppImage-Integrate", "true");
    let _ = entry.get("Desktop Entry/Terminal", "");
    assert!(entry.groups().len() <= text.lines().count());
});
