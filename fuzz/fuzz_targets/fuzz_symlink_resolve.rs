#![no_main]
use appimage::core::catalog::{MemoryCatalog, MemoryOpener};
use appimage::core::resolver::SymlinkResolver;
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::path::Path;

#[derive(Arbitrary, Debug)]
enum Node {
    File(Vec<u8>),
    Dir,
    Link(String),
}

#[derive(Arbitrary, Debug)]
struct Input {
    nodes: Vec<(String, Node)>,
    requested: String,
}

// Arbitrary link graphs must always terminate: success, not found or cycle
fuzz_target!(|input: Input| {
    let mut catalog = MemoryCatalog::new();
    for (path, node) in input.nodes.into_iter().take(64) {
        catalog = match node {
            Node::File(content) => catalog.file(path, &content),
            Node::Dir => catalog.dir(path),
            Node::Link(target) => catalog.symlink(path, target),
        };
    }

    let opener = MemoryOpener::new().with("/fuzz.AppImage", catalog);
    let resolver = SymlinkResolver::new(&opener, Path::new("/fuzz.AppImage"));
    let _ = resolver.read_to_vec(&input.requested);

    // Each hop visits a new path, so opens are bounded by the catalog size
    assert!(opener.open_count() <= 65);
});
