//! Value and port-name normalization

use promptdj_core::channels::MAX_WEIGHT;

/// Highest 7-bit CC value
pub const CC_MAX: u8 = 127;

/// Map a 7-bit CC value onto the weight range `[0, 2]`
///
/// Values above 127 (malformed running status) are treated as 127.
pub fn cc_to_weight(value: u8) -> f32 {
    value.min(CC_MAX) as f32 / CC_MAX as f32 * MAX_WEIGHT
}

/// Strip volatile suffixes from a port name
///
/// Backends decorate port names with IDs that change between sessions and
/// reconnects:
/// - ALSA hardware IDs in brackets: `"nanoKONTROL2 [hw:3,0,0]"`
/// - ALSA sequencer client:port: `"nanoKONTROL2 MIDI 1 28:0"`
///
/// The normalized name is used as the stable device id.
pub fn normalize_port_name(name: &str) -> String {
    let mut result = name.trim();

    if let Some(bracket) = result.rfind('[') {
        result = result[..bracket].trim();
    }

    if let Some(last_space) = result.rfind(' ') {
        let suffix = &result[last_space + 1..];
        if let Some((client, port)) = suffix.split_once(':') {
            let is_id = !client.is_empty()
                && !port.is_empty()
                && client.chars().all(|c| c.is_ascii_digit())
                && port.chars().all(|c| c.is_ascii_digit());
            if is_id {
                result = result[..last_space].trim();
            }
        }
    }

    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc_to_weight_endpoints() {
        assert_eq!(cc_to_weight(0), 0.0);
        assert_eq!(cc_to_weight(127), 2.0);
        assert!((cc_to_weight(64) - 1.00787).abs() < 1e-4);
    }

    #[test]
    fn test_cc_to_weight_saturates() {
        assert_eq!(cc_to_weight(200), 2.0);
    }

    #[test]
    fn test_normalize_strips_hardware_id() {
        assert_eq!(normalize_port_name("nanoKONTROL2 [hw:3,0,0]"), "nanoKONTROL2");
    }

    #[test]
    fn test_normalize_strips_sequencer_id() {
        assert_eq!(
            normalize_port_name("nanoKONTROL2:nanoKONTROL2 MIDI 1 28:0"),
            "nanoKONTROL2:nanoKONTROL2 MIDI 1"
        );
    }

    #[test]
    fn test_normalize_keeps_plain_names() {
        assert_eq!(normalize_port_name("  Launch Control XL "), "Launch Control XL");
        assert_eq!(normalize_port_name("Port A:B"), "Port A:B");
    }
}
