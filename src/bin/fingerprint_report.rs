use bangsync::{Config, ExtractedTrack};
use std::collections::BTreeMap;
use std::path::PathBuf;

// Groups the files under a folder by fingerprint, to spot duplicates
// before they turn into two catalog rows
fn main() -> anyhow::Result<()> {
    println!("🔍 Fingerprint Report");
    println!("=====================");

    let config = Config::load()?;

    let music_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.music_directories.first().cloned())
        .ok_or_else(|| anyhow::anyhow!("No folder given and none configured"))?;

    let scanner = config.scanner();
    let extractor = config.extractor();

    let files = match scanner.scan(&music_dir) {
        Ok(files) => files,
        Err(e) => {
            println!("❌ {}", e);
            println!("Usage: fingerprint_report [music_directory]");
            return Ok(());
        }
    };

    println!("📁 Scanned {}: {} audio files", music_dir.display(), files.len());
    println!("   Extensions: {}", scanner.options().extensions.join(", "));
    println!("   Prefix hashed per file: {} bytes", extractor.prefix_bytes());
    println!();

    let mut groups: BTreeMap<String, Vec<(PathBuf, ExtractedTrack)>> = BTreeMap::new();
    let mut unreadable = 0;

    for path in files {
        match extractor.extract(&path) {
            Ok(track) => groups
                .entry(track.fingerprint.clone())
                .or_default()
                .push((path, track)),
            Err(e) => {
                unreadable += 1;
                println!("  ⚠️  {}", e);
            }
        }
    }

    println!("📈 Fingerprint Statistics:");
    println!("  🔢 Unique fingerprints: {}", groups.len());
    println!("  ❌ Unreadable files: {}", unreadable);
    println!();

    println!("🔍 Potential Duplicates (same fingerprint):");
    let mut duplicates_found = false;

    for (fingerprint, group) in groups.iter().filter(|(_, group)| group.len() > 1) {
        duplicates_found = true;
        println!("  Fingerprint: {} ({} files)", fingerprint, group.len());
        for (path, track) in group {
            println!(
                "    📄 {} [{}]",
                path.display(),
                track.title.as_deref().unwrap_or("untitled")
            );
        }
        println!();
    }

    if !duplicates_found {
        println!("  ✨ No duplicates found (all files have unique content)");
    }

    Ok(())
}
