use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

/// Parse one voltage sample per line. Blank lines and `#` comments are skipped.
pub fn parse_samples(text: &str) -> Result<Vec<f64>> {
    let samples = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(lineno, line)| {
            line.parse::<f64>()
                .with_context(|| format!("line {} is not a number: {}", lineno, line))
        })
        .collect::<Result<Vec<f64>>>()?;
    if samples.is_empty() {
        bail!("no samples found");
    }
    Ok(samples)
}

/// Read newline-delimited samples from any reader (e.g. stdin).
pub fn read_samples<R: Read>(mut input: R) -> Result<Vec<f64>> {
    let mut buf = String::new();
    input
        .read_to_string(&mut buf)
        .context("reading samples")?;
    parse_samples(&buf)
}

pub fn read_samples_file(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_samples(&text).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let samples = parse_samples("# lead I, mV\n0.1\n\n -0.25 \n1e-3\n").expect("parse");
        assert_eq!(samples, vec![0.1, -0.25, 0.001]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_samples("0.1\n0.2\noops\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_samples("\n# nothing\n").is_err());
        assert!(read_samples("".as_bytes()).is_err());
    }
}
