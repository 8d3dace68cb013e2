use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};

/// Destination of a JSON document written by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonOutput {
    Stdout,
    File(PathBuf),
}

impl JsonOutput {
    pub fn write<T>(&self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        match self {
            Self::Stdout => {
                write_pretty(io::stdout().lock(), value).context("Failed to write JSON to stdout")
            }
            Self::File(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                write_pretty(BufWriter::new(file), value)
                    .with_context(|| format!("Failed to write JSON to {}", path.display()))
            }
        }
    }
}

fn write_pretty<W, T>(mut writer: W, value: &T) -> io::Result<()>
where
    W: Write,
    T: serde::Serialize,
{
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;
    let value = serde_json::from_reader(io::BufReader::new(file)).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;
    Ok(value)
}

/// Creates `dir` unless it exists. Fails when the path is a file.
pub fn prepare_output_dir(dir: &Path) -> anyhow::Result<()> {
    if dir.is_file() {
        bail!("Output directory is an existing file: {}", dir.display());
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}

/// Fails when `path` cannot be used as a log file.
pub fn check_log_path(path: &Path) -> anyhow::Result<()> {
    if path.is_dir() {
        bail!("Log file path is an existing directory: {}", path.display());
    }
    Ok(())
}
