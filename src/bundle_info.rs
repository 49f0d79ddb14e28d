//! Reading the version a bundle advertises.

use regex::Regex;
use semver::Version;
use std::path::Path;

/// Read `CFBundleShortVersionString` from `<bundle>/Contents/Info.plist`.
///
/// Only XML property lists are understood. Binary plists, missing files and
/// unparseable versions all yield `None`.
pub fn bundle_version(bundle: &Path) -> Option<Version> {
    let plist = std::fs::read(bundle.join("Contents").join("Info.plist")).ok()?;
    let text = std::str::from_utf8(&plist).ok()?;
    parse_short_version(text)
}

/// Extract and parse the short version string from plist XML.
fn parse_short_version(plist: &str) -> Option<Version> {
    let re = Regex::new(r"<key>CFBundleShortVersionString</key>\s*<string>\s*([^<]*?)\s*</string>")
        .ok()?;
    let raw = re.captures(plist)?.get(1)?.as_str();
    parse_lenient(raw)
}

/// Parse `1`, `1.2` or `1.2.3` (plus anything after a space) as a semantic version.
fn parse_lenient(raw: &str) -> Option<Version> {
    let re = Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok()?;
    let caps = re.captures(raw.trim())?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}
