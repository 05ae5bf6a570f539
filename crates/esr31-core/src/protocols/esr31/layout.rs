pub const FRAME_DELIMITER: char = '*';
pub const TOKEN_SEPARATOR: char = ' ';

pub const MIN_RAW_LEN: usize = 2;
pub const MAX_TOKEN_DIGITS: usize = 2;

pub const DEVICE_SIGNATURE: [u8; 2] = [0x70, 0x8f];
pub const SIGNATURE_RANGE: std::ops::Range<usize> = 0..2;

pub const T1_RANGE: std::ops::Range<usize> = 2..4;
pub const T2_RANGE: std::ops::Range<usize> = 4..6;
pub const T3_RANGE: std::ops::Range<usize> = 6..8;
pub const O1_OFFSET: usize = 20;
pub const O1_MASK: u8 = 0x01;

pub const TEMPERATURE_BIAS: i32 = 0x20;
pub const TEMPERATURE_SCALE: f64 = 10.0;
