//! Byte-distribution entropy

/// Entropy at or above this level (bits per byte) marks packed or
/// encrypted content
pub const HIGH_ENTROPY_THRESHOLD: f32 = 7.2;

/// Shannon entropy of a buffer in bits per byte (0.0 for empty input)
pub fn shannon_entropy(buffer: &[u8]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }

    let mut counts = [0u32; 256];
    for &byte in buffer {
        counts[byte as usize] += 1;
    }

    let len = buffer.len() as f32;
    let mut entropy = 0.0f32;
    for &count in counts.iter() {
        if count == 0 {
            continue;
        }
        let p = count as f32 / len;
        entropy -= p * p.log2();
    }

    entropy
}

pub fn is_high_entropy(entropy: f32) -> bool {
    entropy >= HIGH_ENTROPY_THRESHOLD
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_bytes_have_zero_entropy() {
        assert_eq!(shannon_entropy(&[0u8; 4096]), 0.0);
        assert_eq!(shannon_entropy(&[]), 0.0);
    }

    #[test]
    fn test_uniform_bytes_have_maximal_entropy() {
        let buffer: Vec<u8> = (0..=255u8).cycle().take(64 * 256).collect();
        let entropy = shannon_entropy(&buffer);
        assert!((entropy - 8.0).abs() < 0.01);
        assert!(is_high_entropy(entropy));
    }

    #[test]
    fn test_plain_text_is_not_high_entropy() {
        let text = b"The quick brown fox jumps over the lazy dog. \
                     Plain prose stays well under the packing threshold.";
        let entropy = shannon_entropy(text);
        assert!(entropy > 0.0);
        assert!(!is_high_entropy(entropy));
    }
}
