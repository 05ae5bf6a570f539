use std::fs;
use std::path::{Path, PathBuf};

use esr31_core::encode_frame;

const DATA_LEN: usize = 26;
const O1_DATA_INDEX: usize = 18;
const TEMPERATURE_BIAS: i32 = 0x20;

enum Line {
    Frame(Vec<u8>),
    CorruptChecksum(Vec<u8>),
    Raw(&'static [u8]),
    Silence,
}

fn main() -> Result<(), String> {
    let root = PathBuf::from("tests/golden");
    write_capture(
        root.join("single_frame").join("input.txt"),
        &[Line::Frame(readings(234, 512, -50, true, DATA_LEN))],
    )?;
    write_capture(
        root.join("noisy_line").join("input.txt"),
        &[
            Line::Silence,
            Line::Raw(b"* 70 8f ea 2\n"),
            Line::CorruptChecksum(readings(999, 0, 0, false, DATA_LEN)),
            Line::Raw(b"* 71 8f 00 71 *\n"),
            Line::Raw(b"* 70 8f xx *\n"),
            Line::Frame(readings(234, 512, -50, false, DATA_LEN)),
            Line::Silence,
            Line::Frame(readings(241, 515, -48, true, DATA_LEN)),
            Line::Raw(&[b'*', 0xff, 0xfe, b'*', b'\n']),
        ],
    )?;
    write_capture(
        root.join("truncated_variant").join("input.txt"),
        &[
            Line::Frame(readings(234, 512, -50, true, 6)),
            Line::Frame(readings(198, 433, 12, false, DATA_LEN)),
        ],
    )?;
    write_capture(
        root.join("silent_line").join("input.txt"),
        &[Line::Silence, Line::Silence, Line::Silence],
    )?;
    Ok(())
}

/// Data bytes (after the signature) carrying T1..T3 in tenths of a degree
/// and the O1 output bit.
fn readings(t1: i32, t2: i32, t3: i32, o1: bool, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    for (index, tenths) in [t1, t2, t3].into_iter().enumerate() {
        let [lo, hi] = encode_temperature(tenths);
        data[2 * index] = lo;
        data[2 * index + 1] = hi;
    }
    if let Some(byte) = data.get_mut(O1_DATA_INDEX) {
        *byte = u8::from(o1);
    }
    data
}

fn encode_temperature(tenths: i32) -> [u8; 2] {
    let lo = (tenths & 0xff) as u8;
    let hi = ((tenths >> 8) + TEMPERATURE_BIAS) as u8;
    [lo, hi]
}

fn render(line: &Line) -> Vec<u8> {
    match line {
        Line::Frame(data) => format!("{}\n", encode_frame(data)).into_bytes(),
        Line::CorruptChecksum(data) => corrupt_checksum(&encode_frame(data)).into_bytes(),
        Line::Raw(bytes) => bytes.to_vec(),
        Line::Silence => b"\n".to_vec(),
    }
}

fn corrupt_checksum(frame: &str) -> String {
    let mut tokens: Vec<String> = frame.split(' ').map(str::to_string).collect();
    let index = tokens.len() - 2;
    let checksum = u8::from_str_radix(&tokens[index], 16).unwrap_or_default();
    tokens[index] = format!("{:02x}", checksum.wrapping_add(1));
    format!("{}\n", tokens.join(" "))
}

fn write_capture(path: PathBuf, lines: &[Line]) -> Result<(), String> {
    ensure_parent(&path)?;
    let bytes: Vec<u8> = lines.iter().flat_map(render).collect();
    fs::write(&path, bytes).map_err(|err| format!("failed to write {}: {}", path.display(), err))
}

fn ensure_parent(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create {}: {}", parent.display(), err))?;
    }
    Ok(())
}
