use anyhow::{Context, Result};
use std::path::Path;

fn tokens(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|(idx, line)| {
            line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|tok| !tok.is_empty())
                .map(move |tok| (idx, tok))
        })
}

/// Parse a sample series: one or more values per line, separated by commas
/// or whitespace, ignoring blank and `#` comment lines.
pub fn parse_samples(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, tok) in tokens(text) {
        let val: f64 = tok
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, tok))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a sample series from disk.
pub fn read_samples(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_samples(&text).with_context(|| format!("in {}", path.display()))
}
