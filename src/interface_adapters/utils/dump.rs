/// Renders bytes as `hex | ascii` for debug logs of setup traffic.
pub fn hex_dump(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let ascii: String = bytes
        .iter()
        .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
        .collect();
    format!("{} | {}", hex.join(" "), ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_bytes_are_mixed_then_unprintables_become_dots() {
        assert_eq!(hex_dump(b"OK\n"), "4f 4b 0a | OK.");
        assert_eq!(hex_dump(b""), " | ");
    }
}
