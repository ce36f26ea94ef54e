use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::Local;
use crate::ml::losses::LossSnapshot;

/// Append-only text sink for the per-step losses of one training run.
pub struct LossLog {
    path: PathBuf,
    file: File,
}

impl LossLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(Self { path: path.to_path_buf(), file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, epoch: usize, batch: usize, batches: usize, step: u64, losses: &LossSnapshot) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(
            self.file,
            "{} Epoch: [{:2}] [{:4}/{:4}] step {} {}",
            timestamp, epoch, batch, batches, step, losses.summary()
        )
    }

    pub fn note(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "{} {}", timestamp, message)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot() -> LossSnapshot {
        LossSnapshot {
            d_loss_real: 0.5,
            d_loss_fake: 0.25,
            d_loss: 0.75,
            g_adv_loss: 1.0,
            g_r_loss: 0.1,
            g_loss: 1.06,
            real_probability: 0.6,
            fake_probability: 0.3,
        }
    }

    #[test]
    fn test_records_are_appended() -> std::io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("run").join("training_loss.log");

        let mut log = LossLog::open(&path)?;
        log.record(0, 1, 10, 2, &snapshot())?;
        log.flush()?;
        drop(log);

        let mut log = LossLog::open(&path)?;
        log.note("resumed")?;
        log.flush()?;

        let contents = fs::read_to_string(&path)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("g_r_loss: 0.10000000"));
        assert!(lines[1].ends_with("resumed"));
        Ok(())
    }
}
