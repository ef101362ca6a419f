//! Destination table naming.

use geo_common::{TableName, MAX_IDENTIFIER_BYTES};

/// Prefix of every destination table.
pub const TABLE_PREFIX: &str = "geojson_";

/// `_` plus 8 hex digits.
const OVERFLOW_SUFFIX_BYTES: usize = 9;

/// Map an object key to its destination table.
///
/// `/`, `.` and `-` become `_`, the result is prefixed with `geojson_` and
/// lower-cased. Names longer than 63 bytes keep their leading part and end
/// in the CRC-32 of the full name, so long keys sharing a prefix stay
/// distinct. Keys differing only by case map to the same table.
pub fn derive_table_name(object_key: &str) -> TableName {
    let name = format!("{}{}", TABLE_PREFIX, object_key)
        .chars()
        .map(|c| match c {
            '/' | '.' | '-' => '_',
            c => c,
        })
        .collect::<String>()
        .to_lowercase();

    if name.len() <= MAX_IDENTIFIER_BYTES {
        return TableName::new(name);
    }

    let digest = crc32fast::hash(name.as_bytes());
    let mut cut = MAX_IDENTIFIER_BYTES - OVERFLOW_SUFFIX_BYTES;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }

    TableName::new(format!("{}_{:08x}", &name[..cut], digest))
}
