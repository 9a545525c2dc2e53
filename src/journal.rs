//! File-backed activity journal: the bot's own record of what it saw, said,
//! and learned. One file per bot per year, timestamped lines, and a
//! backwards-seeking tail so session recaps don't load the whole file.

use std::{
    fs::{self, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use chrono::Local;

use crate::ports::LogSink;

pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Journal for a connected bot: `{dir}/{username}_{year}.log`.
    pub fn open(dir: &Path, username: &str) -> Self {
        let year = Local::now().format("%Y");
        Self {
            path: dir.join(format!("{username}_{year}.log")),
        }
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for Journal {
    fn log(&self, line: &str, to_screen: bool, to_file: bool, timestamp: bool) {
        let line = if timestamp {
            format!("[{}] {line}", Local::now().format("%Y-%m-%d, %H:%M:%S"))
        } else {
            line.to_string()
        };
        if to_screen {
            println!("{line}");
        }
        if to_file {
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .and_then(|mut file| writeln!(file, "{line}"));
            if let Err(e) = result {
                eprintln!("couldn't write to log file: {e}");
            }
        }
    }

    fn tail(&self, n: usize) -> Vec<String> {
        read_last_lines(&self.path, n).unwrap_or_default()
    }
}

/// Read the last `n` lines of a file by scanning backwards in chunks.
fn read_last_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    const CHUNK: u64 = 4096;

    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = fs::File::open(path)?;
    let len = file.metadata()?.len();
    let mut pos = len;
    let mut acc: Vec<u8> = Vec::new();

    while pos > 0 {
        let take = CHUNK.min(pos);
        pos -= take;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; take as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&acc);
        acc = chunk;

        // n complete lines are guaranteed once we hold n+1 newlines: the
        // first accumulated line may still be partial.
        let newlines = acc.iter().filter(|b| **b == b'\n').count();
        if newlines > n {
            break;
        }
    }

    let mut text = String::from_utf8_lossy(&acc).into_owned();
    if pos > 0 {
        if let Some(idx) = text.find('\n') {
            text.drain(..=idx);
        }
    }

    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].to_vec())
}
