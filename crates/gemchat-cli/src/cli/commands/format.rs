//! Format command handler.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use gemchat_core::format::{classify, format_text};

pub fn run(file: Option<&Path>, explain: bool) -> Result<()> {
    let text = read_input(file)?;

    if explain {
        for line in text.split('\n') {
            println!("{:<12} {line}", classify(line).kind());
        }
        return Ok(());
    }

    println!("{}", format_text(&text));
    Ok(())
}

/// Reads the reply text, normalizing line endings and dropping one trailing newline.
fn read_input(file: Option<&Path>) -> Result<String> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    let text = raw.replace("\r\n", "\n");
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}
