#![no_main]
use appimage::AppImage;
use libfuzzer_sys::fuzz_target;

// Malformed runtimes and payloads must fail cleanly
fuzz_target!(|data: &[u8]| {
    let path = std::env::temp_dir().join(format!("fuzz-payload-{}.AppImage", std::process::id()));
    if std::fs::write(&path, data).is_err() {
        return;
    }

    if let Ok(image) = AppImage::open(&path) {
        let _ = image.payload_offset();
        if let Ok(files) = image.list_files() {
            for file in files.iter().take(16) {
                let _ = image.read_file(file);
            }
        }
        let _ = image.is_terminal_app();
    }

    std::fs::remove_file(&path).ok();
});
