//! Decode a hex-encoded replication message.
//!
//! Accepts the bincode wire form produced by `NetMessage::to_bytes`, as
//! printed by trace logs or captured from a transport.

use ability_core::NetMessage;
use anyhow::{Context, Result};
use clap::Parser;
use console::style;

#[derive(Debug, Parser)]
pub struct DecodeMessage {
    /// Hex string, optionally prefixed with `0x`; whitespace is ignored
    #[arg(value_name = "HEX")]
    hex: String,

    /// Show raw message bytes (first N bytes)
    #[arg(long, default_value = "64")]
    show_bytes: usize,
}

impl DecodeMessage {
    pub fn execute(self) -> Result<()> {
        let cleaned: String = self.hex.split_whitespace().collect();
        let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
        let bytes = hex::decode(digits).context("Input is not valid hex")?;

        println!("{} {} bytes", style("Size:").bold().cyan(), bytes.len());

        match NetMessage::from_bytes(&bytes) {
            Ok(message) => {
                println!("{} {}", style("Message:").bold().cyan(), message.name());
                println!();
                println!("{}", serde_json::to_string_pretty(&message)?);
                Ok(())
            }
            Err(err) => {
                println!("{} {}", style("Failed to decode:").red().bold(), err);
                println!();
                println!("Raw bytes (first {} bytes):", self.show_bytes);
                display_hex_dump(&bytes, self.show_bytes);
                Err(err).context("Not a replication message")
            }
        }
    }
}

fn display_hex_dump(data: &[u8], max_bytes: usize) {
    let bytes_to_show = data.len().min(max_bytes);

    for (i, chunk) in data[..bytes_to_show].chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|byte| format!("{byte:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&byte| {
                if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                }
            })
            .collect();
        println!("  {:04x}:  {:<48} |{}|", i * 16, hex.join(" "), ascii);
    }
}
