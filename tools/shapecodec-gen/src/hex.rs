// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use anyhow::{anyhow, bail};

pub fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decode hex text; whitespace between bytes is ignored.
pub fn decode(text: &str) -> anyhow::Result<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("hex input has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let high = nibble(pair[0])?;
            let low = nibble(pair[1])?;
            Ok(high << 4 | low)
        })
        .collect()
}

fn nibble(digit: u8) -> anyhow::Result<u8> {
    char::from(digit)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| anyhow!("'{}' is not a hex digit", char::from(digit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let bytes = [0x00, 0x7f, 0x80, 0xff];
        assert_eq!(encode(&bytes), "007f80ff");
        assert_eq!(decode("007F80ff").expect("decode"), bytes);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(decode("01 02\n03").expect("decode"), vec![1, 2, 3]);
    }

    #[test]
    fn test_bad_input_is_rejected() {
        assert!(decode("abc").is_err());
        assert!(decode("zz").is_err());
    }
}
