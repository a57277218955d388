//! Constants and configuration values for the HWID engine
//!
//! Centralizes bit widths, alphabets, limits and file names so the codec,
//! loaders and CLI agree on a single set of values.

/// Bit-level layout of the encoded identity
pub mod bits {
    /// Trailing bit appended to every components bitset (padding marker, not a checksum)
    pub const STOP_BIT: char = '1';

    /// Width of the encoding pattern index in the HWID header
    pub const ENCODING_PATTERN_BITS: u32 = 1;

    /// Width of the image id in the HWID header
    pub const IMAGE_ID_BITS: u32 = 4;

    /// Total header width preceding the components bitset
    pub const HEADER_BITS: usize = (ENCODING_PATTERN_BITS + IMAGE_ID_BITS) as usize;

    /// Largest encoding pattern index that fits in the header
    pub const MAX_ENCODING_PATTERN: u32 = (1 << ENCODING_PATTERN_BITS) - 1;

    /// Largest image id that fits in the header
    pub const MAX_IMAGE_ID: u32 = (1 << IMAGE_ID_BITS) - 1;

    /// Widest encoded field supported (indices are u32)
    pub const MAX_FIELD_BITS: u32 = 31;
}

/// Encoding scheme alphabets and checksum widths
pub mod scheme {
    /// 5-bit alphabet shared by both schemes
    pub const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    /// 3-bit alphabet used for the middle character of a base8192 triple
    pub const BASE8_ALPHABET: &[u8; 8] = b"23456789";

    /// Checksum width of the base32 scheme (two characters)
    pub const BASE32_CHECKSUM_BITS: usize = 10;

    /// Checksum width of the base8192 scheme
    pub const BASE8192_CHECKSUM_BITS: usize = 8;

    /// Characters per dash-separated group in base32 strings
    pub const BASE32_GROUP_LEN: usize = 4;

    /// Characters per dash-separated group in base8192 strings (one 13-bit symbol)
    pub const BASE8192_GROUP_LEN: usize = 3;

    /// Bits carried by one base8192 symbol
    pub const BASE8192_SYMBOL_BITS: usize = 13;

    /// Separator between character groups
    pub const GROUP_SEPARATOR: char = '-';
}

/// Feature compliance values
pub mod feature {
    /// Version reported when a device is not compliant with any profile
    pub const FEATURE_INCOMPLIANT_VERSION: u32 = 0;

    /// Prefix of the first line of a feature requirement spec source
    pub const CHECKSUM_HEADER_PREFIX: &str = "# checksum: ";
}

/// Rule engine values
pub mod rule {
    /// Prefix of every accumulated error line
    pub const ERROR_PREFIX: &str = "ERROR: ";

    /// Prefix of warning lines
    pub const WARNING_PREFIX: &str = "WARNING: ";

    /// Prefix of informational lines
    pub const INFO_PREFIX: &str = "INFO: ";

    /// Message used by assertion helpers without an explicit message
    pub const ASSERTION_ERROR: &str = "Assertion error";

    /// Maximum expression source length accepted by the parser
    pub const MAX_EXPRESSION_LEN: usize = 4096;

    /// Maximum nesting depth of parsed expressions
    pub const MAX_EXPRESSION_DEPTH: usize = 64;

    /// Context attribute holding the string under validation
    pub const CAP_STRING: &str = "string";

    /// Context attribute holding the BOM being adjusted
    pub const CAP_BOM: &str = "bom";

    /// Context attribute holding device information
    pub const CAP_DEVICE_INFO: &str = "device_info";
}

/// Security limits for loaded files
pub mod limits {
    /// Maximum database file size (16 MiB)
    pub const MAX_DATABASE_SIZE: u64 = 16 * 1024 * 1024;

    /// Maximum feature spec source size (4 MiB)
    pub const MAX_SPEC_SIZE: u64 = 4 * 1024 * 1024;

    /// Maximum settings file size (1 MiB)
    pub const MAX_SETTINGS_SIZE: u64 = 1024 * 1024;
}

/// Paths and file names
pub mod paths {
    use std::path::PathBuf;

    /// Directory name under the user configuration directory
    pub const APP_DIR: &str = "hwid";

    /// Settings file name
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Environment variable overriding the configuration directory
    pub const CONFIG_DIR_ENV: &str = "HWID_CONFIG_DIR";

    /// User configuration directory
    ///
    /// Resolution order: `HWID_CONFIG_DIR` (used as-is), `XDG_CONFIG_HOME/hwid`,
    /// then the platform config dir from `dirs`.
    pub fn user_config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Some(PathBuf::from(dir));
            }
        }
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(xdg) if !xdg.is_empty() => Some(PathBuf::from(xdg)),
            _ => dirs::config_dir(),
        };
        base.map(|p| p.join(APP_DIR))
    }
}
