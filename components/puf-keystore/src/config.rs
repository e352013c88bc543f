// Layout of the PUF data record and the limits of the PUF block.
// These mirror what the LPC55S69 PUF and the IAP flash driver accept.

/// Size of the activation code produced by enroll (UM11126, PUF chapter).
pub const ACTIVATION_CODE_SIZE: usize = 1192;

/// Largest key the PUF can wrap: 4096 bits.
pub const MAX_KEY_SIZE: usize = 512;
pub const MIN_KEY_SIZE: usize = 8;

pub const KEY_CODE_HEADER_SIZE: usize = 4;
pub const MIN_KEY_CODE_SIZE: usize = 52;
pub const MAX_KEY_CODE_SIZE: usize = crate::types::key_code_size(MAX_KEY_SIZE);

/// Key indices 0..=15; index 0 is routed to the hardware key bus.
pub const NUM_KEY_INDICES: u8 = 16;
/// AES, PRINCE region 0..2
pub const NUM_KEY_SLOTS: u8 = 4;

/// Key code slots per medium (RAM, flash).
pub const NUM_OF_KEYS: usize = 2;

/// PUF record in internal flash. Must be page aligned and cover whole pages.
pub const FLASHSTORE_BASE: usize = 0x8_0000;
pub const FLASHSTORE_LEN: usize = 0x1000;

pub const FLASH_READ_SIZE: usize = 16;
pub const FLASH_PAGE_SIZE: usize = 512;

/// Longest operator input line; fits a 512 byte user password.
pub const CONSOLE_LINE_SIZE: usize = 576;
