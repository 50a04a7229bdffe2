use std::fmt;

use tracing::debug;

const XMP_APP1_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMPMETA_OPEN: &[u8] = b"<x:xmpmeta";
const XMPMETA_CLOSE: &[u8] = b"</x:xmpmeta>";

pub const HEADING_FIELD: &str = "PoseHeadingDegrees";
pub const PITCH_FIELD: &str = "PosePitchDegrees";
pub const ROLL_FIELD: &str = "PoseRollDegrees";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Heading: {:?}, Pitch: {:?}, Roll: {:?}",
            self.heading, self.pitch, self.roll
        )
    }
}

impl Pose {
    pub fn from_image_bytes(bytes: &[u8]) -> Pose {
        match xmp_packet(bytes) {
            Some(packet) => Pose::from_xmp(&String::from_utf8_lossy(packet)),
            None => {
                debug!("no XMP packet found");
                Pose::default()
            }
        }
    }

    pub fn from_xmp(xmp: &str) -> Pose {
        let mut pose = Pose::default();
        let fields = [
            (HEADING_FIELD, &mut pose.heading),
            (PITCH_FIELD, &mut pose.pitch),
            (ROLL_FIELD, &mut pose.roll),
        ];
        for (name, slot) in fields {
            match field_value(xmp, name) {
                Some(value) => *slot = value,
                None => debug!(field = name, "pose field absent"),
            }
        }
        pose
    }
}

fn xmp_packet(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        if let Some(packet) = jpeg_xmp_segment(bytes) {
            return Some(packet);
        }
    }
    let start = find(bytes, XMPMETA_OPEN)?;
    let end = start + find(&bytes[start..], XMPMETA_CLOSE)? + XMPMETA_CLOSE.len();
    Some(&bytes[start..end])
}

fn jpeg_xmp_segment(bytes: &[u8]) -> Option<&[u8]> {
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            // Fill byte before a marker.
            0xFF => {
                pos += 1;
                continue;
            }
            // TEM and RSTn carry no length.
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // SOS or EOI: no more metadata segments.
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 {
            return None;
        }
        let body = bytes.get(pos + 4..pos + 2 + len)?;
        if marker == 0xE1 {
            if let Some(packet) = body.strip_prefix(XMP_APP1_HEADER) {
                return Some(packet);
            }
        }
        pos += 2 + len;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// Last parseable value of `prefix:name`, attribute or element.
fn field_value(xmp: &str, name: &str) -> Option<f64> {
    let mut found = None;
    for (idx, _) in xmp.match_indices(name) {
        let Some(qualified) = xmp[..idx].strip_suffix(':') else {
            continue;
        };
        let prefix_len = qualified
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
            .count();
        if qualified[..qualified.len() - prefix_len].ends_with('/') {
            // Closing tag.
            continue;
        }
        if let Some(value) = value_after(&xmp[idx + name.len()..]) {
            found = Some(value);
        }
    }
    found
}

fn value_after(rest: &str) -> Option<f64> {
    let rest = rest.trim_start();
    let raw = if let Some(rest) = rest.strip_prefix('=') {
        let rest = rest.trim_start();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let body = &rest[1..];
        &body[..body.find(quote)?]
    } else if let Some(body) = rest.strip_prefix('>') {
        &body[..body.find('<')?]
    } else {
        return None;
    };
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
