//! Status words trailing APDU responses.

/// `SW1 SW2` reported by the card on normal processing.
pub const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

/// Determines whether the response starts with the success status word.
///
/// Only the leading two octets are compared; shorter responses never succeed.
pub fn is_success(response: &[u8]) -> bool {
    response.starts_with(&SW_SUCCESS)
}
