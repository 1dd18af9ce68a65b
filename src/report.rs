use anyhow::{Context, Result};
use tracing::debug;

use std::{
    fmt::{self, Display},
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    analysis::{Metric, Ranking},
    usd::{Percent, Usd},
};

/// A printable summary of a ratio ranking and a total ranking.
///
/// The report has two sections, each headed by its ranking's title, with one
/// `key: value` line per entry in ranking order. Ratios print as percentages
/// (`50.0%`) and totals as dollars (`$125.5`). The sections are separated by a
/// blank line. An empty ranking prints as just its heading.
///
/// To get the text, use its [`Display`] implementation. To save it, use
/// [`Report::write`].
#[derive(Debug)]
pub struct Report {
    ratio: Ranking,
    total: Ranking,
}

impl Report {
    #[must_use]
    pub fn new(ratio: Ranking, total: Ranking) -> Self {
        Self { ratio, total }
    }

    /// Writes the report to `path`, replacing any existing file, and returns
    /// the path written.
    ///
    /// # Errors
    ///
    /// Returns any errors from creating or writing the file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write!(out, "{self}").with_context(|| format!("writing {}", path.display()))?;
        out.flush()
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), "wrote report");
        Ok(path.to_path_buf())
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, ranking: &Ranking) -> fmt::Result {
    writeln!(f, "{} (ranked descending):", ranking.title())?;
    for (key, value) in ranking.iter() {
        match ranking.metric() {
            Metric::Ratio => writeln!(f, "{key}: {}", Percent(value))?,
            Metric::Total => writeln!(f, "{key}: {}", Usd(value))?,
        }
    }
    Ok(())
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_section(f, &self.ratio)?;
        writeln!(f)?;
        write_section(f, &self.total)
    }
}
