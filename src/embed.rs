// SPDX-License-Identifier: MIT
//! Renders an image as a C byte-array so firmware can link it into flash

use std::io::Write;

/// Errors that can occur while rendering
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a valid C identifier: {0:?}")]
    InvalidSymbol(String),
}

const BYTES_PER_LINE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Name of the generated array
    pub symbol: String,
    /// Linker section, `None` to leave placement to the toolchain
    pub section: Option<String>,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            symbol: "espfs_image".to_string(),
            section: Some(".irom.text".to_string()),
        }
    }
}

fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Stream the C source for `image` into `out`
pub fn write_c_array<W: Write>(
    out: &mut W,
    image: &[u8],
    options: &EmbedOptions,
) -> Result<(), EmbedError> {
    if !is_c_identifier(&options.symbol) {
        return Err(EmbedError::InvalidSymbol(options.symbol.clone()));
    }

    write!(
        out,
        "unsigned char {}[] __attribute__((aligned(4))) ",
        options.symbol
    )?;
    if let Some(section) = &options.section {
        write!(out, "__attribute__((section(\"{}\"))) ", section)?;
    }
    write!(out, "= {{")?;

    for (i, byte) in image.iter().enumerate() {
        if i % BYTES_PER_LINE == 0 {
            writeln!(out)?;
        }
        write!(out, " 0x{:02x},", byte)?;
    }
    write!(out, "\n}};\n")?;

    Ok(())
}

/// C source for `image` as a string
pub fn render_c_array(image: &[u8], options: &EmbedOptions) -> Result<String, EmbedError> {
    let mut out = Vec::with_capacity(image.len() * 6 + 128);
    write_c_array(&mut out, image, options)?;
    // Only ASCII is ever written
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_options() {
        let source = render_c_array(&[0x45, 0x53, 0x66, 0x73], &EmbedOptions::default()).unwrap();
        assert_eq!(
            source,
            "unsigned char espfs_image[] __attribute__((aligned(4))) \
             __attribute__((section(\".irom.text\"))) = {\n 0x45, 0x53, 0x66, 0x73,\n};\n"
        );
    }

    #[test]
    fn test_sixteen_bytes_per_line() {
        let image: Vec<u8> = (0..33).collect();
        let source = render_c_array(&image, &EmbedOptions::default()).unwrap();
        let lines: Vec<&str> = source.lines().collect();

        // declaration, 3 data lines, closing brace
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1].matches("0x").count(), 16);
        assert_eq!(lines[3], " 0x20,");
        assert_eq!(lines[4], "};");
    }

    #[test]
    fn test_without_section() {
        let options = EmbedOptions {
            symbol: "web_fs".to_string(),
            section: None,
        };
        let source = render_c_array(&[], &options).unwrap();
        assert_eq!(
            source,
            "unsigned char web_fs[] __attribute__((aligned(4))) = {\n};\n"
        );
    }

    #[test]
    fn test_invalid_symbol() {
        let options = EmbedOptions {
            symbol: "1bad-name".to_string(),
            section: None,
        };
        assert!(matches!(
            render_c_array(&[1], &options),
            Err(EmbedError::InvalidSymbol(_))
        ));
    }
}
